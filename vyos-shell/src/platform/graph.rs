//! Immutable command mode tree with path finding.

use indexmap::IndexMap;
use regex::bytes::Regex;

use super::command_mode::CommandMode;
use crate::channel::combine_patterns;
use crate::error::{DriverError, PlatformError, Result};

/// One hop between adjacent command modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Mode the hop starts from.
    pub from: String,

    /// Mode the hop ends in.
    pub to: String,

    /// Command that performs the hop.
    pub command: String,
}

/// The command mode tree of a device.
///
/// Built once and shared read-only between sessions. The current mode of a
/// session is tracked by the session, not here.
#[derive(Debug)]
pub struct ModeGraph {
    modes: IndexMap<String, CommandMode>,
    root: String,
    any_prompt: Regex,
}

impl ModeGraph {
    /// Build and validate a mode tree.
    ///
    /// Requires exactly one root, existing parents and no cycles.
    pub fn new(modes: impl IntoIterator<Item = CommandMode>) -> Result<Self> {
        let modes: IndexMap<String, CommandMode> = modes
            .into_iter()
            .map(|mode| (mode.name.clone(), mode))
            .collect();

        let roots: Vec<&String> = modes
            .values()
            .filter(|m| m.parent.is_none())
            .map(|m| &m.name)
            .collect();
        let root = match roots.as_slice() {
            [root] => (*root).clone(),
            _ => {
                return Err(PlatformError::InvalidDefinition {
                    message: format!("expected exactly one root mode, found {}", roots.len()),
                }
                .into());
            }
        };

        for mode in modes.values() {
            if let Some(parent) = &mode.parent {
                if !modes.contains_key(parent) {
                    return Err(PlatformError::InvalidDefinition {
                        message: format!("mode '{}' has unknown parent '{}'", mode.name, parent),
                    }
                    .into());
                }
            }
        }

        let any_prompt = combine_patterns(modes.values().map(|m| &m.prompt)).map_err(|e| {
            PlatformError::InvalidDefinition {
                message: e.to_string(),
            }
        })?;

        let graph = Self {
            modes,
            root,
            any_prompt,
        };

        // Every chain must reach the root
        for name in graph.modes.keys() {
            graph.ancestors(name)?;
        }

        Ok(graph)
    }

    /// Name of the root (default) mode.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Get a mode by name.
    pub fn get(&self, name: &str) -> Option<&CommandMode> {
        self.modes.get(name)
    }

    /// Regex matching the prompt of any mode.
    pub fn any_prompt(&self) -> &Regex {
        &self.any_prompt
    }

    /// All mode names, parents before children.
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.modes.keys()
    }

    /// Determine the mode from the tail of some output.
    pub fn determine_from_prompt(&self, output: &[u8]) -> Result<&CommandMode> {
        self.modes
            .values()
            .find(|mode| mode.matches(output))
            .ok_or_else(|| {
                let text = String::from_utf8_lossy(output);
                DriverError::UnknownMode {
                    prompt: text.lines().last().unwrap_or_default().to_string(),
                }
                .into()
            })
    }

    /// The chain from `name` up to the root, both included.
    fn ancestors(&self, name: &str) -> Result<Vec<&str>> {
        let mut chain = Vec::new();
        let mut current = self.modes.get(name).ok_or_else(|| DriverError::UnknownMode {
            prompt: name.to_string(),
        })?;

        loop {
            chain.push(current.name.as_str());
            if chain.len() > self.modes.len() {
                return Err(PlatformError::InvalidDefinition {
                    message: format!("cycle in command modes at '{}'", name),
                }
                .into());
            }
            match &current.parent {
                Some(parent) => {
                    current = self.modes.get(parent).ok_or_else(|| {
                        PlatformError::InvalidDefinition {
                            message: format!("unknown parent '{}'", parent),
                        }
                    })?;
                }
                None => return Ok(chain),
            }
        }
    }

    /// Transitions leading from `from` to `to` through their nearest common
    /// ancestor: exit commands going up, then enter commands going down.
    pub fn path(&self, from: &str, to: &str) -> Result<Vec<Transition>> {
        if from == to {
            return Ok(Vec::new());
        }

        let up = self.ancestors(from)?;
        let down = self.ancestors(to)?;

        let common = up
            .iter()
            .find(|name| down.contains(name))
            .copied()
            .ok_or_else(|| DriverError::NoModePath {
                from: from.to_string(),
                to: to.to_string(),
            })?;

        let no_path = || DriverError::NoModePath {
            from: from.to_string(),
            to: to.to_string(),
        };

        let mut transitions = Vec::new();

        for name in up.iter().take_while(|name| **name != common) {
            let mode = &self.modes[*name];
            let parent = mode.parent.clone().ok_or_else(no_path)?;
            transitions.push(Transition {
                from: mode.name.clone(),
                to: parent,
                command: mode.exit_command.clone().ok_or_else(no_path)?,
            });
        }

        let descent: Vec<&str> = down
            .iter()
            .take_while(|name| **name != common)
            .copied()
            .collect();
        for name in descent.into_iter().rev() {
            let mode = &self.modes[name];
            transitions.push(Transition {
                from: mode.parent.clone().ok_or_else(no_path)?,
                to: mode.name.clone(),
                command: mode.enter_command.clone().ok_or_else(no_path)?,
            });
        }

        Ok(transitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_graph() -> ModeGraph {
        let default = CommandMode::new("default", r"\$").unwrap();
        let config = CommandMode::new("config", r"#")
            .unwrap()
            .with_parent("default")
            .with_enter("configure")
            .with_exit("exit");
        let edit = CommandMode::new("edit", r"\(edit\)#")
            .unwrap()
            .with_parent("config")
            .with_enter("edit protocols")
            .with_exit("top");
        let shell = CommandMode::new("shell", r"%")
            .unwrap()
            .with_parent("default")
            .with_enter("sudo su")
            .with_exit("logout");

        ModeGraph::new([default, config, edit, shell]).unwrap()
    }

    fn commands(transitions: &[Transition]) -> Vec<&str> {
        transitions.iter().map(|t| t.command.as_str()).collect()
    }

    #[test]
    fn test_path_down_and_up() {
        let graph = make_test_graph();

        let path = graph.path("default", "edit").unwrap();
        assert_eq!(commands(&path), vec!["configure", "edit protocols"]);
        assert_eq!(path[1].from, "config");
        assert_eq!(path[1].to, "edit");

        let path = graph.path("edit", "default").unwrap();
        assert_eq!(commands(&path), vec!["top", "exit"]);

        assert!(graph.path("config", "config").unwrap().is_empty());
    }

    #[test]
    fn test_path_through_common_ancestor() {
        let graph = make_test_graph();
        let path = graph.path("edit", "shell").unwrap();
        assert_eq!(commands(&path), vec!["top", "exit", "sudo su"]);
    }

    #[test]
    fn test_rejects_two_roots() {
        let a = CommandMode::new("a", r"\$").unwrap();
        let b = CommandMode::new("b", r"#").unwrap();
        assert!(ModeGraph::new([a, b]).is_err());
    }

    #[test]
    fn test_rejects_unknown_parent() {
        let a = CommandMode::new("a", r"\$").unwrap();
        let b = CommandMode::new("b", r"#").unwrap().with_parent("missing");
        assert!(ModeGraph::new([a, b]).is_err());
    }

    #[test]
    fn test_rejects_cycle() {
        let root = CommandMode::new("root", r"\$").unwrap();
        let a = CommandMode::new("a", r"#").unwrap().with_parent("b");
        let b = CommandMode::new("b", r">").unwrap().with_parent("a");
        assert!(ModeGraph::new([root, a, b]).is_err());
    }

    #[test]
    fn test_unknown_mode_path() {
        let graph = make_test_graph();
        assert!(graph.path("default", "nowhere").is_err());
    }
}
