//! Session acquisition for flows.
//!
//! Flows never open connections themselves: they ask the [`CliHandler`] for a
//! [`ScopedSession`] in the command mode they need and drop it when done.

mod pool;

use std::sync::Arc;

pub use pool::{ScopedSession, SessionPool};

use crate::error::Result;
use crate::platform::vyos::{CONFIG_MODE, DEFAULT_MODE};

/// Hands out sessions in the VyOS command modes.
#[derive(Clone)]
pub struct CliHandler {
    pool: Arc<SessionPool>,
}

impl CliHandler {
    pub fn new(pool: Arc<SessionPool>) -> Self {
        Self { pool }
    }

    /// Session in operational mode.
    pub async fn default_session(&self) -> Result<ScopedSession> {
        self.pool.acquire(DEFAULT_MODE).await
    }

    /// Session in configuration mode.
    pub async fn config_session(&self) -> Result<ScopedSession> {
        self.pool.acquire(CONFIG_MODE).await
    }

    /// Session in an arbitrary mode.
    pub async fn session(&self, mode: &str) -> Result<ScopedSession> {
        self.pool.acquire(mode).await
    }

    pub fn pool(&self) -> &Arc<SessionPool> {
        &self.pool
    }
}
