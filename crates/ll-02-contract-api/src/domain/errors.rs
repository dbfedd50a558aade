//! # Domain Errors
//!
//! Error types for the contract API.

use thiserror::Error;

/// Contract API error types.
///
/// Transport failures (nothing reached the backend, or no answer came back)
/// are kept apart from rejections (the backend answered with an error).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Network failure or timeout.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend refused the request.
    #[error("Rejected with status {status}: {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Status text or error body
        message: String,
    },

    /// The backend answered with something unusable.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Error returned by a write submission.
pub type WriteError = ApiError;

impl ApiError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, ApiError::Rejected { .. })
    }

    /// The server answered but does not speak this API.
    pub fn is_unknown_server(&self) -> bool {
        matches!(self, ApiError::Rejected { status: 404 | 405, .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            ApiError::Rejected {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else if e.is_decode() {
            ApiError::InvalidResponse(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}
