//! Channel layer for pattern matching and PTY operations.
//!
//! This module handles the interactive session abstraction, including
//! pattern-based prompt detection and ANSI stripping.

mod buffer;
#[cfg(test)]
pub(crate) mod mock;
mod patterns;
mod pty;
mod session;

pub use buffer::PatternBuffer;
pub use patterns::{combine_patterns, compile_prompt_pattern, normalize_output};
pub use pty::{PtyChannel, PtyConfig};
pub use session::{CliSession, SessionFactory, read_until_pattern};
