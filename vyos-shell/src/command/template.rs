//! Parameterized command lines with their error patterns.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::bytes::Regex;

use crate::error::{DriverError, Result};

/// Ordered table of output pattern → human readable failure reason.
#[derive(Debug, Clone, Default)]
pub struct ErrorMap {
    entries: IndexMap<String, (Regex, String)>,
}

static DEFAULT_ERROR_MAP: LazyLock<ErrorMap> = LazyLock::new(|| {
    ErrorMap::new()
        .with("error:", "Error happens while executing CLI command")
        .expect("default error pattern is valid")
});

impl ErrorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The entries appended to every command's error map.
    pub fn defaults() -> &'static ErrorMap {
        &DEFAULT_ERROR_MAP
    }

    /// Add an entry, replacing an existing one with the same pattern.
    pub fn with(
        mut self,
        pattern: &str,
        reason: impl Into<String>,
    ) -> std::result::Result<Self, regex::Error> {
        self.insert(pattern, reason)?;
        Ok(self)
    }

    /// Add an entry, replacing an existing one with the same pattern.
    pub fn insert(
        &mut self,
        pattern: &str,
        reason: impl Into<String>,
    ) -> std::result::Result<(), regex::Error> {
        let regex = Regex::new(pattern)?;
        self.entries.insert(pattern.to_string(), (regex, reason.into()));
        Ok(())
    }

    /// This map's entries followed by the entries of `other` it lacks.
    pub fn merged(&self, other: &ErrorMap) -> ErrorMap {
        let mut entries = self.entries.clone();
        for (key, value) in &other.entries {
            entries.entry(key.clone()).or_insert_with(|| value.clone());
        }
        ErrorMap { entries }
    }

    /// Reason of the first entry matching `output`.
    pub fn find(&self, output: &[u8]) -> Option<&str> {
        self.entries
            .values()
            .find(|(pattern, _)| pattern.is_match(output))
            .map(|(_, reason)| reason.as_str())
    }

    /// Patterns in priority order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A command line with `{name}` placeholders and the errors it can report.
#[derive(Debug, Clone)]
pub struct CommandTemplate {
    template: String,
    error_map: ErrorMap,
}

impl CommandTemplate {
    pub fn new(template: impl Into<String>, error_map: ErrorMap) -> Self {
        Self {
            template: template.into(),
            error_map,
        }
    }

    /// The raw template string.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Template-specific error entries.
    pub fn error_map(&self) -> &ErrorMap {
        &self.error_map
    }

    /// Substitute every placeholder. `{{` and `}}` produce literal braces.
    ///
    /// Fails if a placeholder has no value in `params`. Trailing whitespace is
    /// trimmed, so an empty last argument does not leave a dangling space.
    pub fn format(&self, params: &[(&str, &str)]) -> Result<String> {
        let mut out = String::with_capacity(self.template.len());
        let mut chars = self.template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let name: String = chars.by_ref().take_while(|c| *c != '}').collect();
                    let value = params
                        .iter()
                        .find(|(key, _)| *key == name)
                        .map(|(_, value)| *value)
                        .ok_or_else(|| DriverError::MissingParameter {
                            template: self.template.clone(),
                            name: name.clone(),
                        })?;
                    out.push_str(value);
                }
                c => out.push(c),
            }
        }

        out.truncate(out.trim_end().len());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_format() {
        let template = CommandTemplate::new("save {destination_file_path}", ErrorMap::new());
        assert_eq!(
            template
                .format(&[("destination_file_path", "/config/backup.boot")])
                .unwrap(),
            "save /config/backup.boot"
        );
        assert_eq!(
            template.format(&[("destination_file_path", "")]).unwrap(),
            "save"
        );
    }

    #[test]
    fn test_format_missing_parameter() {
        let template = CommandTemplate::new("load {source_file_path}", ErrorMap::new());
        let err = template.format(&[("other", "x")]).unwrap_err();
        match err {
            Error::Driver(DriverError::MissingParameter { name, .. }) => {
                assert_eq!(name, "source_file_path")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_format_escaped_braces() {
        let template = CommandTemplate::new("echo {{{word}}}", ErrorMap::new());
        assert_eq!(template.format(&[("word", "hi")]).unwrap(), "echo {hi}");
    }

    #[test]
    fn test_error_map_merge_order() {
        let custom = ErrorMap::new()
            .with("[Ee]rror saving", "Failed to save configuration file")
            .unwrap();
        let merged = custom.merged(ErrorMap::defaults());

        assert_eq!(
            merged.patterns().collect::<Vec<_>>(),
            vec!["[Ee]rror saving", "error:"]
        );
        assert_eq!(
            merged.find(b"Error saving configuration"),
            Some("Failed to save configuration file")
        );
        assert_eq!(
            merged.find(b"error: permission denied"),
            Some("Error happens while executing CLI command")
        );
        assert_eq!(merged.find(b"Done"), None);
    }
}
