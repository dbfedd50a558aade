//! # Ledger-Link Telemetry
//!
//! Structured logging (`tracing-subscriber`) and Prometheus metrics for the
//! client runtime.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ll_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_telemetry(TelemetryConfig::from_env())?;
//!     // ...
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `ledger-link` | Service name in logs |
//! | `LL_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `LL_CONSOLE_OUTPUT` | `true` | Write logs to stderr |
//! | `LL_JSON_LOGS` | `false` | JSON log lines (default on in containers) |

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use metrics::{
    encode_metrics, register_metrics, sync_counter, MetricsHandle, BUS_LISTENERS,
    OPERATIONS_FINISHED, OPERATIONS_PENDING, OPERATIONS_REJECTED_DUPLICATES, REGISTRY,
    STREAM_CONNECTED, STREAM_EVENTS_RECEIVED, STREAM_FRAMES_DROPPED, STREAM_RECONNECT_ATTEMPTS,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and register metrics.
///
/// Returns a guard to hold for the lifetime of the application. Fails if a
/// global subscriber is already installed.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = register_metrics()?;
    logging::init_logging(&config)?;
    Ok(TelemetryGuard {
        service_name: config.service_name,
        _metrics: metrics,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}
