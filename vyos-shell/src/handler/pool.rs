//! Bounded session pool with scoped acquisition.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::channel::{CliSession, SessionFactory, read_until_pattern};
use crate::error::{ChannelError, DriverError, Error, Result, TransportError};
use crate::platform::{CommandMode, ModeGraph};

/// A session waiting in the pool together with the mode it was left in.
struct IdleSession {
    session: Box<dyn CliSession>,
    mode: String,
}

#[derive(Default)]
struct PoolShared {
    idle: Mutex<Vec<IdleSession>>,
}

impl PoolShared {
    fn take_idle(&self) -> Option<IdleSession> {
        self.idle.lock().ok().and_then(|mut idle| idle.pop())
    }

    fn release(&self, session: Box<dyn CliSession>, mode: String) {
        if let Ok(mut idle) = self.idle.lock() {
            idle.push(IdleSession { session, mode });
        }
    }
}

/// Pool of CLI sessions to one device.
///
/// At most `limit` sessions are in use at a time. Sessions are reused after a
/// [`ScopedSession`] is dropped unless it was marked broken.
pub struct SessionPool {
    factory: Arc<dyn SessionFactory>,
    graph: Arc<ModeGraph>,
    semaphore: Arc<Semaphore>,
    shared: Arc<PoolShared>,
    timeout: Duration,
}

impl SessionPool {
    /// Create a pool allowing `limit` concurrent sessions.
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        graph: Arc<ModeGraph>,
        limit: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            factory,
            graph,
            semaphore: Arc::new(Semaphore::new(limit.max(1))),
            shared: Arc::new(PoolShared::default()),
            timeout,
        }
    }

    /// The mode graph sessions navigate.
    pub fn graph(&self) -> &Arc<ModeGraph> {
        &self.graph
    }

    /// Number of idle sessions kept for reuse.
    pub fn idle_count(&self) -> usize {
        self.shared.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    /// Acquire a session and bring it into `mode`.
    ///
    /// Waits while the concurrency limit is reached.
    pub async fn acquire(&self, mode: &str) -> Result<ScopedSession> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| TransportError::Disconnected)?;

        let (session, current) = match self.take_live_idle().await {
            Some(idle) => idle,
            None => self.open().await?,
        };

        let mut scoped = ScopedSession {
            session: Some(session),
            mode: current,
            graph: self.graph.clone(),
            shared: self.shared.clone(),
            timeout: self.timeout,
            broken: false,
            _permit: permit,
        };
        scoped.enter_mode(mode).await?;
        Ok(scoped)
    }

    /// Pop idle sessions until one still answers with a prompt.
    ///
    /// Sessions that fail the check are closed and dropped, so the caller
    /// falls back to [`open`](Self::open) when the device went away.
    async fn take_live_idle(&self) -> Option<(Box<dyn CliSession>, String)> {
        while let Some(mut idle) = self.shared.take_idle() {
            match self.revive(idle.session.as_mut()).await {
                Ok(mode) => {
                    debug!("reusing idle session in mode '{}'", mode);
                    return Some((idle.session, mode));
                }
                Err(e) => {
                    warn!("discarding stale session left in mode '{}': {}", idle.mode, e);
                    if let Err(e) = idle.session.close().await {
                        debug!("closing stale session: {}", e);
                    }
                }
            }
        }
        None
    }

    /// Send an empty line and detect the mode from the prompt it brings back.
    async fn revive(&self, session: &mut dyn CliSession) -> Result<String> {
        session.send_line("").await?;
        let output = read_until_pattern(session, self.graph.any_prompt(), self.timeout).await?;
        Ok(self.graph.determine_from_prompt(&output)?.name.clone())
    }

    /// Open a new session and detect the mode it starts in.
    async fn open(&self) -> Result<(Box<dyn CliSession>, String)> {
        let mut session = self.factory.connect().await?;

        let output = read_until_pattern(session.as_mut(), self.graph.any_prompt(), self.timeout)
            .await
            .map_err(|e| match e {
                Error::Channel(ChannelError::PatternTimeout(t)) => {
                    TransportError::NoInitialPrompt(t).into()
                }
                Error::Channel(ChannelError::Closed) => TransportError::Disconnected.into(),
                other => other,
            })?;

        let mode = self.graph.determine_from_prompt(&output)?.name.clone();
        info!("CLI session established in mode '{}'", mode);
        Ok((session, mode))
    }

    /// Close every idle session.
    pub async fn close_idle(&self) {
        let idle = match self.shared.idle.lock() {
            Ok(mut idle) => std::mem::take(&mut *idle),
            Err(_) => return,
        };
        for mut entry in idle {
            if let Err(e) = entry.session.close().await {
                warn!("failed to close idle session: {}", e);
            }
        }
    }
}

/// Exclusive use of one pooled session.
///
/// Returned to the pool when dropped, on every exit path. A session marked
/// broken (timeout, failed mode switch) is discarded instead.
pub struct ScopedSession {
    session: Option<Box<dyn CliSession>>,
    mode: String,
    graph: Arc<ModeGraph>,
    shared: Arc<PoolShared>,
    timeout: Duration,
    broken: bool,
    _permit: OwnedSemaphorePermit,
}

impl ScopedSession {
    /// Current command mode name.
    pub fn mode_name(&self) -> &str {
        &self.mode
    }

    /// Current command mode.
    pub fn mode(&self) -> Result<&CommandMode> {
        self.graph.get(&self.mode).ok_or_else(|| {
            DriverError::UnknownMode {
                prompt: self.mode.clone(),
            }
            .into()
        })
    }

    /// Default timeout for commands on this session.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether the session will be discarded instead of reused.
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Do not return this session to the pool.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    /// The underlying session.
    pub fn cli(&mut self) -> Result<&mut (dyn CliSession + 'static)> {
        self.session
            .as_deref_mut()
            .ok_or_else(|| ChannelError::Closed.into())
    }

    /// Move the session into `target`, replaying exit/enter commands.
    ///
    /// Each hop waits for a prompt and checks it belongs to the expected mode.
    pub async fn enter_mode(&mut self, target: &str) -> Result<()> {
        let graph = self.graph.clone();
        let transitions = graph.path(&self.mode, target)?;

        for transition in transitions {
            debug!(
                "mode '{}' -> '{}' via {:?}",
                transition.from, transition.to, transition.command
            );

            let cli = self
                .session
                .as_deref_mut()
                .ok_or(ChannelError::Closed)?;

            if let Err(e) = cli.send_line(&transition.command).await {
                self.broken = true;
                return Err(e);
            }

            let reached = match read_until_pattern(cli, graph.any_prompt(), self.timeout).await {
                Ok(output) => graph
                    .determine_from_prompt(&output)
                    .map(|mode| mode.name.clone()),
                Err(Error::Channel(ChannelError::PatternTimeout(_))) => {
                    Err(DriverError::ModeTransition {
                        from: transition.from.clone(),
                        to: transition.to.clone(),
                    }
                    .into())
                }
                Err(e) => Err(e),
            };

            match reached {
                Ok(name) if name == transition.to => self.mode = name,
                Ok(name) => {
                    warn!(
                        "expected mode '{}' after {:?}, device is in '{}'",
                        transition.to, transition.command, name
                    );
                    self.mode = name;
                    self.broken = true;
                    return Err(DriverError::ModeTransition {
                        from: transition.from,
                        to: transition.to,
                    }
                    .into());
                }
                Err(e) => {
                    self.broken = true;
                    return Err(e);
                }
            }
        }

        Ok(())
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            if self.broken {
                debug!("discarding broken session");
            } else {
                self.shared.release(session, std::mem::take(&mut self.mode));
            }
        }
    }
}
