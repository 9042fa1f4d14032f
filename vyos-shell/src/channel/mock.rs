//! Scripted in-memory sessions for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use super::session::{CliSession, SessionFactory};
use crate::error::{ChannelError, Result, TransportError};

pub(crate) const DEFAULT_PROMPT: &str = "vyos@vyos:~$ ";
pub(crate) const CONFIG_PROMPT: &str = "[edit]\r\nvyos@vyos# ";

/// Lines sent to a mock session, shared with the test.
pub(crate) type SentLog = Arc<Mutex<Vec<String>>>;

/// A session that answers each sent line with scripted output chunks.
pub(crate) struct MockSession {
    pending: VecDeque<Bytes>,
    responses: HashMap<String, VecDeque<Vec<Bytes>>>,
    sent: SentLog,
    last: Option<Bytes>,
    delay: Duration,
    closed_after: Option<usize>,
}

impl MockSession {
    /// Create a session that greets with `banner`.
    pub(crate) fn new(banner: &str) -> Self {
        let mut pending = VecDeque::new();
        if !banner.is_empty() {
            pending.push_back(Bytes::copy_from_slice(banner.as_bytes()));
        }
        Self {
            pending,
            responses: HashMap::new(),
            sent: Arc::new(Mutex::new(Vec::new())),
            last: None,
            delay: Duration::ZERO,
            closed_after: None,
        }
    }

    /// Wait `delay` before delivering each output chunk.
    pub(crate) fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Report the channel closed once `lines` lines have been sent.
    pub(crate) fn closed_after(mut self, lines: usize) -> Self {
        self.closed_after = Some(lines);
        self
    }

    /// Script the chunks produced the next time `line` is sent.
    pub(crate) fn on(mut self, line: &str, chunks: &[&str]) -> Self {
        self.responses
            .entry(line.to_string())
            .or_default()
            .push_back(
                chunks
                    .iter()
                    .map(|c| Bytes::copy_from_slice(c.as_bytes()))
                    .collect(),
            );
        self
    }

    /// Handle on the log of sent lines.
    pub(crate) fn sent(&self) -> SentLog {
        self.sent.clone()
    }
}

#[async_trait]
impl CliSession for MockSession {
    async fn send_line(&mut self, line: &str) -> Result<()> {
        let mut sent = self.sent.lock().map_err(|_| TransportError::Disconnected)?;
        if self.closed_after.is_some_and(|limit| sent.len() >= limit) {
            return Err(ChannelError::Closed.into());
        }
        sent.push(line.to_string());
        drop(sent);

        if let Some(chunks) = self
            .responses
            .get_mut(line)
            .and_then(|queue| queue.pop_front())
        {
            self.pending.extend(chunks);
        } else if line.is_empty() {
            // An unscripted empty line redraws the last prompt
            if let Some(last) = self.last.clone() {
                self.pending.push_back(Bytes::from_static(b"\r\n"));
                self.pending.push_back(last);
            }
        }
        Ok(())
    }

    async fn read_chunk(&mut self, _timeout: Duration) -> Result<Option<Bytes>> {
        let chunk = self.pending.pop_front();
        if let Some(chunk) = &chunk {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.last = Some(chunk.clone());
        }
        Ok(chunk)
    }
}

/// Factory handing out scripted sessions, or failing when none are left.
pub(crate) struct MockFactory {
    sessions: Mutex<VecDeque<Option<MockSession>>>,
    attempts: Arc<AtomicUsize>,
}

impl MockFactory {
    pub(crate) fn new() -> Self {
        Self {
            sessions: Mutex::new(VecDeque::new()),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue a connection attempt that fails at the transport level.
    pub(crate) fn fail_once(self) -> Self {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.push_back(None);
        }
        self
    }

    /// Queue a successful connection.
    pub(crate) fn session(self, session: MockSession) -> Self {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.push_back(Some(session));
        }
        self
    }

    /// Number of connect calls so far.
    pub(crate) fn attempts(&self) -> Arc<AtomicUsize> {
        self.attempts.clone()
    }
}

#[async_trait]
impl SessionFactory for MockFactory {
    async fn connect(&self) -> Result<Box<dyn CliSession>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self
            .sessions
            .lock()
            .map_err(|_| TransportError::Disconnected)?
            .pop_front()
            .flatten();

        match next {
            Some(session) => Ok(Box::new(session)),
            None => Err(TransportError::Disconnected.into()),
        }
    }
}
