//! Deadline-bounded polling.
//!
//! The backend has no push notifications, so convergence is observed by
//! re-evaluating a condition at a fixed interval. Cancellation is checked
//! first on every iteration, then the deadline, then the condition.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::debug;

use super::cancel::CancellationToken;
use crate::error::{RelytError, Result};

/// Overall budget and cadence of one polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSpec {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for PollSpec {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1800),
            interval: Duration::from_secs(5),
        }
    }
}

impl PollSpec {
    pub fn new(timeout: Duration, interval: Duration) -> Result<Self> {
        if timeout.is_zero() || interval.is_zero() {
            return Err(RelytError::Config(
                "poll timeout and interval must both be greater than zero".into(),
            ));
        }
        Ok(Self { timeout, interval })
    }
}

/// `[poll.*]` table in the config file, in seconds. Unset fields fall back
/// to the base spec.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PollSettings {
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub interval_secs: Option<u64>,
}

impl PollSettings {
    pub fn to_spec(self, base: PollSpec) -> Result<PollSpec> {
        PollSpec::new(
            self.timeout_secs.map_or(base.timeout, Duration::from_secs),
            self.interval_secs.map_or(base.interval, Duration::from_secs),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    #[error("interrupted by user")]
    Interrupted,
    #[error("timed out after {timeout:?}")]
    TimedOut { timeout: Duration },
}

/// Evaluate `condition` every `spec.interval` until it returns `Ok`, the
/// deadline passes, or `cancel` is armed.
///
/// `condition` is expected to wrap its own remote call in
/// [`retry`](super::retry()); this loop never retries on its own beyond
/// re-evaluating the condition. Condition errors are logged and discarded.
pub async fn poll_until<T, E, F, Fut>(
    spec: &PollSpec,
    cancel: &CancellationToken,
    mut condition: F,
) -> Result<T, PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let deadline = Instant::now() + spec.timeout;
    let mut iteration: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(PollError::Interrupted);
        }
        if Instant::now() >= deadline {
            return Err(PollError::TimedOut {
                timeout: spec.timeout,
            });
        }
        iteration += 1;
        match condition().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                debug!(iteration, error = %err, "condition not met yet");
            }
        }
        sleep(spec.interval).await;
    }
}
