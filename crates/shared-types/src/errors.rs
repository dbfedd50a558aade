//! # Error Types
//!
//! Defines error types used across crates.

use thiserror::Error;

/// Malformed push-stream payload.
///
/// Never propagated to callers: the connection manager logs and drops.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Payload is not valid JSON.
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// Payload is JSON but not an object.
    #[error("Event payload is not an object")]
    NotAnObject,

    /// No `kind`/`action` tag, or it is empty / not a string.
    #[error("Event has no kind")]
    MissingKind,

    /// Subject present but not a string.
    #[error("Invalid subject field")]
    InvalidSubject,
}

/// Network-level failure on the stream or on a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection could not be established.
    #[error("Connect failed: {0}")]
    Connect(String),

    /// Established connection failed while reading.
    #[error("Stream error: {0}")]
    Stream(String),

    /// Server answered with a non-success status.
    #[error("Unexpected HTTP status {status}")]
    Status { status: u16 },

    /// Request did not complete in time.
    #[error("Request timed out")]
    Timeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::InvalidJson("expected value".into());
        assert!(err.to_string().contains("expected value"));
    }

    #[test]
    fn test_transport_status_display() {
        let err = TransportError::Status { status: 503 };
        assert!(err.to_string().contains("503"));
    }
}
