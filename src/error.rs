//! Error types for the bouncer.

use std::time::Duration;
use thiserror::Error;

/// Error returned by a remote list gateway.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Transport-level failure (connection refused, reset, DNS).
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// Request timed out.
    #[error("Request timed out")]
    Timeout,

    /// Rate limited by the remote API.
    #[error("Rate limited")]
    RateLimited,

    /// Remote side failed (5xx).
    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// Credentials missing, expired or lacking permission.
    #[error("Authentication failed (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    /// The request was understood and refused.
    #[error("Request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// Response body could not be interpreted.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// An asynchronous bulk operation finished in the failed state.
    #[error("Bulk operation {id} failed: {message}")]
    OperationFailed { id: String, message: String },

    /// An asynchronous bulk operation did not finish within the poll budget.
    #[error("Bulk operation {id} still pending after {polls} polls")]
    OperationTimeout { id: String, polls: u32 },
}

impl RemoteError {
    /// Whether retrying the same request later can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Http(_)
            | RemoteError::Timeout
            | RemoteError::RateLimited
            | RemoteError::Server { .. }
            | RemoteError::OperationTimeout { .. } => true,
            RemoteError::Auth { .. }
            | RemoteError::Rejected { .. }
            | RemoteError::InvalidResponse(_)
            | RemoteError::OperationFailed { .. } => false,
        }
    }

    /// Map an unsuccessful HTTP status to an error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 => RemoteError::RateLimited,
            401 | 403 => RemoteError::Auth { status, message },
            500..=599 => RemoteError::Server { status, message },
            _ => RemoteError::Rejected { status, message },
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RemoteError::Timeout
        } else if e.is_decode() {
            RemoteError::InvalidResponse(e.to_string())
        } else {
            RemoteError::Http(e)
        }
    }
}

/// Error that stops the flush loop.
#[derive(Error, Debug)]
pub enum FlushError {
    /// A non-retryable remote failure.
    #[error("fatal remote error: {0}")]
    Fatal(#[source] RemoteError),

    /// Retryable failures kept recurring past the configured retry age.
    #[error("giving up after retrying for {age:?}: {source}")]
    RetryExhausted {
        age: Duration,
        #[source]
        source: RemoteError,
    },
}
