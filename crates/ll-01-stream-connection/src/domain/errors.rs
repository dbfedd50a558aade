//! # Domain Errors
//!
//! Error types for the Stream Connection Manager.

use shared_types::TransportError;
use thiserror::Error;

/// Stream connection error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamConnectionError {
    /// Endpoint or identity was empty.
    #[error("Invalid stream target: {0}")]
    InvalidTarget(String),

    /// The underlying transport failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
