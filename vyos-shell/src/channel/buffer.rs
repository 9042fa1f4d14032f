//! Pattern buffer with efficient tail-search optimization.
//!
//! Only the last N bytes of the buffer are searched for prompt patterns, rather
//! than the entire output. Action and error patterns are searched from a
//! moving offset instead, so that a prompt already answered is not answered
//! twice.

use bytes::{Bytes, BytesMut};
use regex::bytes::Regex;

/// Buffer for accumulating session output and searching it for patterns.
#[derive(Debug)]
pub struct PatternBuffer {
    /// The accumulated output buffer (ANSI escapes already stripped).
    buffer: BytesMut,

    /// How many bytes from the end to search for prompts.
    search_depth: usize,

    /// Start of the region not yet consumed by an action match.
    consumed: usize,
}

impl PatternBuffer {
    /// Create a new pattern buffer with the specified search depth.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            search_depth,
            consumed: 0,
        }
    }

    /// Extend the buffer with new data, stripping ANSI escape codes.
    pub fn extend(&mut self, data: &[u8]) {
        let cleaned = strip_ansi_escapes::strip(data);
        self.buffer.extend_from_slice(&cleaned);
    }

    /// Search only the tail of the buffer for the pattern.
    pub fn search_tail(&self, pattern: &Regex) -> Option<regex::bytes::Match<'_>> {
        let start = self.buffer.len().saturating_sub(self.search_depth);
        pattern.find(&self.buffer[start..])
    }

    /// Check if the tail contains a pattern match.
    pub fn tail_contains(&self, pattern: &Regex) -> bool {
        self.search_tail(pattern).is_some()
    }

    /// Check whether the pattern matches output received since the last
    /// [`consume_pending`](Self::consume_pending).
    pub fn pending_contains(&self, pattern: &Regex) -> bool {
        pattern.is_match(self.pending())
    }

    /// Output received since the last [`consume_pending`](Self::consume_pending).
    pub fn pending(&self) -> &[u8] {
        &self.buffer[self.consumed..]
    }

    /// Mark the first `len` pending bytes as consumed.
    pub fn consume_pending(&mut self, len: usize) {
        self.consumed = (self.consumed + len).min(self.buffer.len());
    }

    /// Take ownership of the buffer contents and reset.
    pub fn take(&mut self) -> Bytes {
        self.consumed = 0;
        self.buffer.split().freeze()
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the buffer contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ansi_stripping() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"\x1b[32mvyos@vyos:~$\x1b[0m ");
        assert_eq!(buffer.as_slice(), b"vyos@vyos:~$ ");
    }

    #[test]
    fn test_tail_search() {
        let mut buffer = PatternBuffer::new(20);
        buffer.extend(&[b'x'; 100]);
        buffer.extend(b"\nvyos@vyos# ");

        let pattern = Regex::new(r"#\s*$").unwrap();
        assert!(buffer.search_tail(&pattern).is_some());
    }

    #[test]
    fn test_tail_search_not_in_tail() {
        let mut buffer = PatternBuffer::new(10);
        buffer.extend(b"vyos@vyos#");
        buffer.extend(&[b'x'; 100]);

        let pattern = Regex::new(r"vyos#").unwrap();
        assert!(buffer.search_tail(&pattern).is_none());
    }

    #[test]
    fn test_consume_hides_answered_prompt() {
        let mut buffer = PatternBuffer::default();
        let password = Regex::new(r"[Pp]assword:").unwrap();

        buffer.extend(b"root@10.0.0.1's password: ");
        assert!(buffer.pending_contains(&password));

        buffer.consume_pending(buffer.pending().len());
        assert!(!buffer.pending_contains(&password));

        buffer.extend(b"\nPassword: ");
        assert!(buffer.pending_contains(&password));
    }

    #[test]
    fn test_consume_pending_keeps_rest() {
        let mut buffer = PatternBuffer::default();
        buffer.extend(b"(yes/no)? Password: ");
        buffer.consume_pending(b"(yes/no)?".len());
        assert_eq!(buffer.pending(), b" Password: ");

        buffer.consume_pending(1000);
        assert!(buffer.pending().is_empty());
    }

    #[test]
    fn test_take_clears_buffer() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"test data");
        buffer.consume_pending(4);
        assert_eq!(&buffer.take()[..], b"test data");
        assert!(buffer.as_slice().is_empty());
        assert!(buffer.pending().is_empty());
    }
}
