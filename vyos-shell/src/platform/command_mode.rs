//! Command mode definition.

use regex::bytes::Regex;

use crate::channel::compile_prompt_pattern;

/// A named state of the interactive session.
///
/// Command modes form a tree: each mode except the root has a parent, an
/// enter command issued from the parent and an exit command leading back to it.
#[derive(Debug, Clone)]
pub struct CommandMode {
    /// Name of this mode (e.g., "default", "config").
    pub name: String,

    /// Regex matching the prompt shown while in this mode.
    pub prompt: Regex,

    /// Name of the parent mode (None for the root mode).
    pub parent: Option<String>,

    /// Command to enter this mode from the parent.
    pub enter_command: Option<String>,

    /// Command to leave this mode back to the parent.
    pub exit_command: Option<String>,
}

impl CommandMode {
    /// Create a new command mode. The prompt is anchored to the end of output.
    pub fn new(name: impl Into<String>, prompt: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            prompt: compile_prompt_pattern(prompt)?,
            parent: None,
            enter_command: None,
            exit_command: None,
        })
    }

    /// Set the parent mode.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Set the command that enters this mode.
    pub fn with_enter(mut self, command: impl Into<String>) -> Self {
        self.enter_command = Some(command.into());
        self
    }

    /// Set the command that exits this mode.
    pub fn with_exit(mut self, command: impl Into<String>) -> Self {
        self.exit_command = Some(command.into());
        self
    }

    /// Check if this mode's prompt ends the given output.
    pub fn matches(&self, output: &[u8]) -> bool {
        self.prompt.is_match(output)
    }
}
