use std::time::Duration;

use thiserror::Error;

use crate::api::ApiError;
use crate::convergence::PollError;

#[derive(Debug, Error)]
pub enum RelytError {
    #[error("Relyt API error: {0}")]
    Api(#[from] ApiError),

    #[error(
        "timed out after {}s waiting for the resource to converge; \
         it may still converge later, retry the operation",
        timeout.as_secs()
    )]
    TimedOut { timeout: Duration },

    #[error("interrupted by user")]
    Interrupted,

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("cannot resolve endpoint: {0}")]
    Placement(String),

    #[error("{kind} is {status}, waiting for {wanted}")]
    NotConverged {
        kind: &'static str,
        status: String,
        wanted: &'static str,
    },

    #[error("unsupported change: {0}")]
    Unsupported(String),

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl From<PollError> for RelytError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::Interrupted => RelytError::Interrupted,
            PollError::TimedOut { timeout } => RelytError::TimedOut { timeout },
        }
    }
}

impl RelytError {
    /// True when the operator aborted the wait, as opposed to the resource failing.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, RelytError::Interrupted)
    }
}

pub type Result<T, E = RelytError> = std::result::Result<T, E>;
