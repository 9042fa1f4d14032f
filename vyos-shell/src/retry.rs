//! Retry for flows whose session could not be established yet.
//!
//! A freshly deployed VM may refuse SSH for a while after boot. Transport and
//! session setup failures are retried at a fixed interval until a deadline;
//! anything else (a command that ran and failed) is returned at once.

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use crate::error::{Error, Result};

/// Deadline and polling interval for [`retry_on_session_failure`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20 * 60),
            interval: Duration::from_secs(20),
        }
    }
}

/// Run `op`, calling it again while it fails to establish a session.
///
/// Once `policy.timeout` has passed, the last establishment error is returned
/// wrapped in [`Error::RetryExhausted`].
pub async fn retry_on_session_failure<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start = Instant::now();
    let mut attempt = 1u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_session_establishment() => {
                let elapsed = start.elapsed();
                if elapsed + policy.interval > policy.timeout {
                    return Err(Error::RetryExhausted {
                        elapsed,
                        source: Box::new(e),
                    });
                }
                warn!(
                    "session not available (attempt {}): {}; retrying in {:?}",
                    attempt, e, policy.interval
                );
                tokio::time::sleep(policy.interval).await;
                attempt += 1;
            }
            Err(e) => {
                debug!("not retrying: {}", e);
                return Err(e);
            }
        }
    }
}
