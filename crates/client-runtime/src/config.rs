//! # Session Configuration
//!
//! One file configures every subsystem. Values are layered:
//!
//! 1. Defaults
//! 2. TOML file (`SessionConfig::load`)
//! 3. `LL_*` environment variables (`SessionConfig::apply_env`)
//! 4. Command line flags (in the binary)
//!
//! ## File Format
//!
//! ```toml
//! [stream]
//! endpoint = "http://localhost:8080"
//! identity = "pk-1"
//!
//! [stream.reconnect]
//! max_attempts = 5
//! base_delay_ms = 1000
//!
//! [api]
//! server_url = "http://localhost:8080"
//!
//! [correlator]
//! confirmation_kind = "contract_write"
//!
//! [supervisor]
//! duplicate_policy = "reject"
//! default_timeout_ms = 60000
//! ```

use ll_01_stream_connection::{StreamConfig, StreamConfigError};
use ll_02_contract_api::{ApiConfig, ApiConfigError};
use ll_03_write_correlation::{CorrelatorConfig, CorrelatorConfigError};
use ll_04_operation_supervisor::{SupervisorConfig, SupervisorConfigError};
use ll_telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};
use shared_types::AgentId;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },

    #[error("Invalid stream config: {0}")]
    Stream(#[from] StreamConfigError),

    #[error("Invalid API config: {0}")]
    Api(#[from] ApiConfigError),

    #[error("Invalid correlator config: {0}")]
    Correlator(#[from] CorrelatorConfigError),

    #[error("Invalid supervisor config: {0}")]
    Supervisor(#[from] SupervisorConfigError),
}

/// Session-level behaviour.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Register the agent with the backend on start if it is unknown.
    pub register_agent: bool,

    /// How often the runtime copies its counters into Prometheus.
    pub metrics_interval_ms: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            register_agent: true,
            metrics_interval_ms: 5_000,
        }
    }
}

/// Complete client configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub stream: StreamConfig,
    pub api: ApiConfig,
    pub correlator: CorrelatorConfig,
    pub supervisor: SupervisorConfig,
    pub telemetry: TelemetryConfig,
    pub session: SessionOptions,
}

impl SessionConfig {
    /// Create a config for testing (short timeouts, test identity).
    pub fn for_testing() -> Self {
        Self {
            stream: StreamConfig::for_testing(),
            api: ApiConfig::for_testing(),
            correlator: CorrelatorConfig::for_testing(),
            supervisor: SupervisorConfig::for_testing(),
            telemetry: TelemetryConfig::default(),
            session: SessionOptions::default(),
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string. Missing sections keep their defaults.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `LL_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `LL_SERVER_URL` | `api.server_url` and `stream.endpoint` |
    /// | `LL_STREAM_ENDPOINT` | `stream.endpoint` |
    /// | `LL_AGENT_ID` | `stream.identity` |
    /// | `LL_MAX_RECONNECT_ATTEMPTS` | `stream.reconnect.max_attempts` |
    /// | `LL_RECONNECT_BASE_DELAY_MS` | `stream.reconnect.base_delay_ms` |
    /// | `LL_REQUEST_TIMEOUT_MS` | `api.request_timeout_ms` |
    /// | `LL_OPERATION_TIMEOUT_MS` | `supervisor.default_timeout_ms` (0 disables) |
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("LL_SERVER_URL") {
            self.set_server(url);
        }
        if let Some(endpoint) = lookup("LL_STREAM_ENDPOINT") {
            self.stream.endpoint = endpoint;
        }
        if let Some(identity) = lookup("LL_AGENT_ID") {
            self.stream.identity = identity;
        }
        if let Some(n) = parse_var(&lookup, "LL_MAX_RECONNECT_ATTEMPTS")? {
            self.stream.reconnect.max_attempts = n;
        }
        if let Some(ms) = parse_var(&lookup, "LL_RECONNECT_BASE_DELAY_MS")? {
            self.stream.reconnect.base_delay_ms = ms;
        }
        if let Some(ms) = parse_var(&lookup, "LL_REQUEST_TIMEOUT_MS")? {
            self.api.request_timeout_ms = ms;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "LL_OPERATION_TIMEOUT_MS")? {
            self.supervisor.default_timeout_ms = (ms > 0).then_some(ms);
        }
        Ok(())
    }

    /// Point both the API and the stream at `url`.
    pub fn set_server(&mut self, url: impl Into<String>) {
        let url = url.into();
        self.stream.endpoint = url.clone();
        self.api.server_url = url;
    }

    pub fn agent(&self) -> AgentId {
        AgentId::new(self.stream.identity.clone())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.stream.validate()?;
        self.api.validate()?;
        self.correlator.validate()?;
        self.supervisor.validate()?;
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { var, value }),
    }
}
