//! Error types for a single call against the Relyt API.
//!
//! [`ApiError`] describes what went wrong with one request/response exchange.
//! The convergence engine treats every variant as transient; deciding that a
//! failure is permanent (or that absence is success) happens at the call site.

use thiserror::Error;

/// Errors that can occur on one round trip to the Relyt API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The HTTP layer answered with something other than 200.
    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    /// The HTTP exchange succeeded but the response envelope carried a
    /// non-success business code.
    #[error("API code {code}: {msg}")]
    Code { code: i64, msg: String },

    /// Transport failure (DNS, refused connection, client timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The body could not be decoded into the expected envelope.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The request body could not be serialized.
    #[error("failed to encode request: {0}")]
    Encode(String),

    /// A successful envelope arrived without the `data` the call needs.
    #[error("response for {0} carried no data")]
    MissingData(&'static str),

    /// The configured host could not be combined with the request path.
    #[error("invalid request url: {0}")]
    InvalidUrl(String),
}
