//! Bounded retry with multiplicative backoff.
//!
//! Every failure is treated as retryable. Callers that need to stop early on
//! a permanent condition (for example "not found" during delete) must turn it
//! into a successful value before it reaches [`retry`].

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tokio::time::sleep;
use tracing::warn;

use crate::error::{RelytError, Result};

/// How many times to try an operation and how long to wait in between.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Sleep before the second attempt.
    #[serde(
        default = "default_initial_delay",
        rename = "initial_delay_ms",
        deserialize_with = "millis::deserialize"
    )]
    pub initial_delay: Duration,
    /// Growth factor applied to the delay after every sleep.
    #[serde(default = "default_backoff_coefficient")]
    pub backoff_coefficient: f64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_backoff_coefficient() -> f64 {
    1.0
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            backoff_coefficient: default_backoff_coefficient(),
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        backoff_coefficient: f64,
    ) -> Result<Self> {
        let policy = Self {
            max_attempts,
            initial_delay,
            backoff_coefficient,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts < 1 {
            return Err(RelytError::Config("retry max_attempts must be at least 1".into()));
        }
        // NaN fails this comparison as well.
        if !(self.backoff_coefficient >= 1.0) {
            return Err(RelytError::Config(format!(
                "retry backoff_coefficient must be >= 1.0, got {}",
                self.backoff_coefficient
            )));
        }
        Ok(())
    }

    /// The sleeps taken between attempts, in order. There are
    /// `max_attempts - 1` of them; each is `ceil(coefficient * previous)`
    /// at millisecond resolution. No ceiling is applied.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let coefficient = self.backoff_coefficient;
        let count = self.max_attempts.saturating_sub(1) as usize;
        std::iter::successors(Some(self.initial_delay), move |prev| {
            Some(grow(*prev, coefficient))
        })
        .take(count)
    }
}

fn grow(delay: Duration, coefficient: f64) -> Duration {
    let next = (coefficient * delay.as_millis() as f64).ceil();
    if next >= u64::MAX as f64 {
        Duration::from_millis(u64::MAX)
    } else {
        Duration::from_millis(next as u64)
    }
}

/// Run `op` until it succeeds or `policy.max_attempts` attempts have failed.
///
/// Returns the first success, or the error of the final attempt. Earlier
/// errors are only logged.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = policy.max_attempts.max(1);
    let mut delays = policy.delays();
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= attempts => {
                warn!(attempt, max_attempts = attempts, error = %err, "retries exhausted");
                return Err(err);
            }
            Err(err) => {
                let delay = delays.next().unwrap_or(policy.initial_delay);
                warn!(
                    attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "attempt failed, backing off"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
