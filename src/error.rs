//! Error types for the Mailosaur client.

use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Error type for all Mailosaur client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller input was rejected before any request was sent.
    #[error("invalid search: {0}")]
    Validation(String),

    /// The API key was refused (HTTP 401 or 403). Never retried.
    #[error("authentication failed ({status}): {body}")]
    Authentication { status: StatusCode, body: String },

    /// Network failure while talking to the service.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a 5xx or 429 status.
    #[error("service unavailable ({status}): {body}")]
    Unavailable { status: StatusCode, body: String },

    /// Any other non-success status.
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// The response body did not have the expected shape.
    #[error("failed to parse response: {0}")]
    Json(#[from] serde_json::Error),

    /// No matching message arrived before the search timeout.
    #[error("no matching message after {attempts} attempt(s) in {elapsed:?}")]
    SearchTimeout { attempts: u32, elapsed: Duration },

    /// The caller cancelled the search.
    #[error("search cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },

    /// Client configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether the polling loop may try again after this error.
    ///
    /// Only transport-level failures are retryable: network errors and
    /// `5xx`/`429` statuses.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Unavailable { .. })
    }

    pub(crate) fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Error::Authentication { status, body }
            }
            StatusCode::TOO_MANY_REQUESTS => Error::Unavailable { status, body },
            s if s.is_server_error() => Error::Unavailable { status, body },
            _ => Error::Status { status, body },
        }
    }
}
