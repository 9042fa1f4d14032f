//! Prompt → response tables for interactive commands.
//!
//! Many device commands stop and ask for input while running:
//! - `load scp://...` may ask to confirm the remote host
//! - the transfer client may ask for the remote password
//! - `save` may ask before overwriting an existing file
//!
//! An [`ActionMap`] answers these prompts as they appear. Entries are checked
//! in insertion order and may fire any number of times.

use indexmap::IndexMap;
use regex::bytes::Regex;

/// One prompt and the line sent back when it appears.
#[derive(Debug, Clone)]
pub struct Action {
    /// Pattern that triggers the response.
    pub pattern: Regex,

    /// The line to send (may be empty to accept a default).
    pub response: String,

    /// Whether the response must be kept out of logs (e.g., passwords).
    pub hidden: bool,
}

impl Action {
    pub fn new(pattern: &str, response: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            response: response.into(),
            hidden: false,
        })
    }

    /// Create an action whose response is not logged.
    pub fn hidden(pattern: &str, response: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            hidden: true,
            ..Self::new(pattern, response)?
        })
    }

    /// The response as it may appear in logs.
    pub fn loggable_response(&self) -> &str {
        if self.hidden { "******" } else { &self.response }
    }
}

/// A matched action and where its match ended in the searched output.
#[derive(Debug, Clone, Copy)]
pub struct ActionMatch<'a> {
    /// Position of the action in the map.
    pub index: usize,

    /// The matched action.
    pub action: &'a Action,

    /// Byte offset just past the match.
    pub end: usize,
}

/// Ordered prompt → response table.
#[derive(Debug, Clone, Default)]
pub struct ActionMap {
    entries: IndexMap<String, Action>,
}

impl ActionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action answering `pattern` with `response`.
    pub fn with_response(
        mut self,
        pattern: &str,
        response: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        self.insert(pattern, Action::new(pattern, response)?);
        Ok(self)
    }

    /// Add an action whose response is not logged.
    pub fn with_hidden_response(
        mut self,
        pattern: &str,
        response: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        self.insert(pattern, Action::hidden(pattern, response)?);
        Ok(self)
    }

    /// Insert an action keyed by its pattern, replacing an existing one.
    pub fn insert(&mut self, pattern: &str, action: Action) {
        self.entries.insert(pattern.to_string(), action);
    }

    /// First action (in insertion order) matching `output`.
    pub fn find(&self, output: &[u8]) -> Option<ActionMatch<'_>> {
        self.entries
            .values()
            .enumerate()
            .find_map(|(index, action)| {
                action.pattern.find(output).map(|m| ActionMatch {
                    index,
                    action,
                    end: m.end(),
                })
            })
    }

    /// Look up an action by its pattern string.
    pub fn get(&self, pattern: &str) -> Option<&Action> {
        self.entries.get(pattern)
    }

    /// Patterns in insertion order.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_respects_order() {
        let map = ActionMap::new()
            .with_hidden_response(r"[Pp]assword:", "secret")
            .unwrap()
            .with_response(r"10\.0\.0\.1[^/]", "")
            .unwrap();

        let m = map.find(b"root@10.0.0.1's password: ").unwrap();
        assert_eq!(m.index, 0);
        assert_eq!(m.action.response, "secret");
        assert_eq!(m.end, b"root@10.0.0.1's password:".len());

        let m = map.find(b"Connecting to 10.0.0.1 (yes/no)?").unwrap();
        assert_eq!(m.index, 1);
    }

    #[test]
    fn test_hidden_response_is_masked() {
        let action = Action::hidden(r"[Pp]assword:", "secret").unwrap();
        assert_eq!(action.loggable_response(), "******");

        let action = Action::new(r"\(yes/no\)", "yes").unwrap();
        assert_eq!(action.loggable_response(), "yes");
    }

    #[test]
    fn test_insert_replaces_same_pattern() {
        let map = ActionMap::new()
            .with_response(r"\[confirm\]", "y")
            .unwrap()
            .with_response(r"\[confirm\]", "")
            .unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(r"\[confirm\]").unwrap().response, "");
    }

    #[test]
    fn test_no_match() {
        let map = ActionMap::new().with_response(r"overwrite\?", "y").unwrap();
        assert!(map.find(b"Saving configuration").is_none());
    }
}
