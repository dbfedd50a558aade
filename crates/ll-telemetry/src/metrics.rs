//! Prometheus metrics for Ledger-Link.
//!
//! All metrics follow the naming convention: `ll_<component>_<metric>`
//!
//! The components keep their own atomic counters; [`sync_counter`] copies
//! a running total into the matching Prometheus counter.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // STREAM METRICS (Subsystem 1)
    // =========================================================================

    /// Decoded events handed to the dispatcher
    pub static ref STREAM_EVENTS_RECEIVED: IntCounter = IntCounter::new(
        "ll_stream_events_received_total",
        "Stream events decoded and dispatched"
    ).expect("metric creation failed");

    /// Frames that did not decode to an event
    pub static ref STREAM_FRAMES_DROPPED: IntCounter = IntCounter::new(
        "ll_stream_frames_dropped_total",
        "Malformed stream frames dropped"
    ).expect("metric creation failed");

    /// Failed connection attempts
    pub static ref STREAM_RECONNECT_ATTEMPTS: IntCounter = IntCounter::new(
        "ll_stream_reconnect_attempts_total",
        "Stream connection attempts that failed"
    ).expect("metric creation failed");

    /// 1 while the stream is connected
    pub static ref STREAM_CONNECTED: IntGauge = IntGauge::new(
        "ll_stream_connected",
        "Whether the push stream is connected"
    ).expect("metric creation failed");

    // =========================================================================
    // BUS METRICS
    // =========================================================================

    /// Registered listeners across all kinds
    pub static ref BUS_LISTENERS: IntGauge = IntGauge::new(
        "ll_bus_listeners",
        "Registered stream event listeners"
    ).expect("metric creation failed");

    // =========================================================================
    // OPERATION METRICS (Subsystems 3, 4)
    // =========================================================================

    /// Operations by terminal state
    pub static ref OPERATIONS_FINISHED: IntCounterVec = IntCounterVec::new(
        Opts::new("ll_operations_finished_total", "Operations by terminal state"),
        &["state"]  // state: accepted/rejected/failed/timed_out/cancelled
    ).expect("metric creation failed");

    /// Operations waiting for confirmation
    pub static ref OPERATIONS_PENDING: IntGauge = IntGauge::new(
        "ll_operations_pending",
        "Operations not yet in a terminal state"
    ).expect("metric creation failed");

    /// Starts refused because the subject already had one outstanding
    pub static ref OPERATIONS_REJECTED_DUPLICATES: IntCounter = IntCounter::new(
        "ll_operations_rejected_duplicates_total",
        "Operation starts rejected as duplicates"
    ).expect("metric creation failed");
}

/// Handle proving the metrics are registered.
#[derive(Debug, Clone, Copy)]
pub struct MetricsHandle {
    _private: (),
}

/// Register all metrics with the global registry. Safe to call repeatedly.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Stream
        Box::new(STREAM_EVENTS_RECEIVED.clone()),
        Box::new(STREAM_FRAMES_DROPPED.clone()),
        Box::new(STREAM_RECONNECT_ATTEMPTS.clone()),
        Box::new(STREAM_CONNECTED.clone()),
        // Bus
        Box::new(BUS_LISTENERS.clone()),
        // Operations
        Box::new(OPERATIONS_FINISHED.clone()),
        Box::new(OPERATIONS_PENDING.clone()),
        Box::new(OPERATIONS_REJECTED_DUPLICATES.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle { _private: () })
}

/// Raise `counter` to `total`. Totals never go backwards, so lower values are ignored.
pub fn sync_counter(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
