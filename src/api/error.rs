//! API error taxonomy

use super::rate_limiter::DeadlineExceeded;
use super::signing::SigningError;
use thiserror::Error;

/// Errors from a single logical API call
#[derive(Debug, Error)]
pub enum ApiError {
    /// Key material problem; never retried
    #[error(transparent)]
    Signing(#[from] SigningError),

    /// Non-success HTTP status
    #[error("HTTP {status} from {path}: {body}")]
    Status {
        status: u16,
        path: String,
        body: String,
    },

    /// Connection, TLS or timeout failure below HTTP
    #[error("Request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid URL: {0}")]
    Url(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error(transparent)]
    Deadline(#[from] DeadlineExceeded),
}

impl ApiError {
    /// HTTP status, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 429 and 5xx are worth retrying; everything else is final
    pub fn is_transient(&self) -> bool {
        matches!(self.status(), Some(429) | Some(500..=599))
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
