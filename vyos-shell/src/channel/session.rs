//! Session abstraction the command layer drives.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use log::trace;
use regex::bytes::Regex;
use tokio::time::Instant;

use super::buffer::PatternBuffer;
use crate::error::{ChannelError, Result};

/// An interactive connection to the device's command interpreter.
///
/// Implementations are not shared: one flow owns a session for its entire
/// duration through a [`ScopedSession`](crate::handler::ScopedSession).
#[async_trait]
pub trait CliSession: Send {
    /// Send one line of input, followed by a newline.
    async fn send_line(&mut self, line: &str) -> Result<()>;

    /// Wait at most `timeout` for more output.
    ///
    /// Returns `Ok(None)` if nothing arrived in time.
    async fn read_chunk(&mut self, timeout: Duration) -> Result<Option<Bytes>>;

    /// Close the underlying connection.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Opens new sessions for the pool.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Establish and authenticate a new session.
    ///
    /// Errors returned here are session-establishment errors and are eligible
    /// for retry.
    async fn connect(&self) -> Result<Box<dyn CliSession>>;
}

/// Read from the session until `pattern` matches the tail of the output.
///
/// Returns the accumulated output (ANSI stripped).
pub async fn read_until_pattern(
    session: &mut dyn CliSession,
    pattern: &Regex,
    timeout: Duration,
) -> Result<Bytes> {
    let deadline = Instant::now() + timeout;
    let mut buffer = PatternBuffer::default();

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ChannelError::PatternTimeout(timeout).into());
        }

        let chunk = session
            .read_chunk(remaining)
            .await?
            .ok_or(ChannelError::PatternTimeout(timeout))?;
        trace!("read {} bytes waiting for {:?}", chunk.len(), pattern.as_str());

        buffer.extend(&chunk);
        if buffer.tail_contains(pattern) {
            return Ok(buffer.take());
        }
    }
}
