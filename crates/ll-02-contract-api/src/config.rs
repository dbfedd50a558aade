//! # Contract API Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Invalid API configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiConfigError {
    #[error("server URL must start with http:// or https://: {0:?}")]
    InvalidServerUrl(String),
    #[error("request timeout must be positive")]
    ZeroTimeout,
}

/// Contract API configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Backend base URL.
    pub server_url: String,

    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl ApiConfig {
    /// Create a config for testing (short timeout).
    pub fn for_testing() -> Self {
        Self {
            server_url: "http://127.0.0.1:18080".to_string(),
            request_timeout_ms: 500,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ApiConfigError> {
        let url = self.server_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ApiConfigError::InvalidServerUrl(self.server_url.clone()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ApiConfigError::ZeroTimeout);
        }
        Ok(())
    }
}
