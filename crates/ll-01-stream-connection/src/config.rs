//! # Stream Configuration
//!
//! Where to connect and how hard to retry.

use crate::domain::ReconnectPolicy;
use serde::{Deserialize, Serialize};
use shared_types::StreamTarget;
use std::time::Duration;
use thiserror::Error;

/// Invalid stream configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamConfigError {
    #[error("stream endpoint must not be empty")]
    EmptyEndpoint,
    #[error("stream endpoint must start with http:// or https://: {0}")]
    UnsupportedScheme(String),
    #[error("agent identity must not be empty")]
    EmptyIdentity,
    #[error("reconnect base delay must be positive")]
    ZeroBaseDelay,
}

/// Stream connection configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Server base URL, e.g. `http://localhost:8080`.
    pub endpoint: String,

    /// Agent identity (public key) the stream is scoped to.
    pub identity: String,

    /// HTTP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,

    pub reconnect: ReconnectPolicy,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            identity: String::new(),
            connect_timeout_ms: 10_000,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl StreamConfig {
    /// Create a config for testing (short delays).
    pub fn for_testing() -> Self {
        Self {
            endpoint: "http://127.0.0.1:18080".to_string(),
            identity: "test-agent".to_string(),
            connect_timeout_ms: 500,
            reconnect: ReconnectPolicy::for_testing(),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn target(&self) -> StreamTarget {
        StreamTarget::new(self.endpoint.clone(), self.identity.clone())
    }

    pub fn validate(&self) -> Result<(), StreamConfigError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(StreamConfigError::EmptyEndpoint);
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(StreamConfigError::UnsupportedScheme(endpoint.to_string()));
        }
        if self.identity.trim().is_empty() {
            return Err(StreamConfigError::EmptyIdentity);
        }
        if self.reconnect.base_delay_ms == 0 {
            return Err(StreamConfigError::ZeroBaseDelay);
        }
        Ok(())
    }
}
