//! # Ledger-Link Client Runtime
//!
//! Wires the subsystems into a [`Session`]:
//!
//! ```text
//!            ┌──────────────────────┐ frames ┌──────────────────┐
//!  server ──►│ StreamConnection (01)│───────►│ ListenerRegistry │
//!            └──────────────────────┘        └────────┬─────────┘
//!                                                     │ confirmation events
//!            ┌──────────────────────┐ token  ┌────────▼─────────┐
//!  server ◄──│ ContractApi (02)     │◄───────│ Correlator (03)  │
//!            └──────────────────────┘        └────────▲─────────┘
//!                                                     │
//!                                            ┌────────┴─────────┐
//!                                   UI ─────►│ Supervisor (04)  │
//!                                            └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config` - `SessionConfig`: TOML file, `LL_*` environment overrides
//! - `session` - `Session`: start/end lifecycle and the UI-facing calls
//! - `metrics` - Prometheus export of the subsystems' counters

#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod metrics;
pub mod session;

pub use config::{ConfigError, SessionConfig, SessionOptions};
pub use metrics::{record_metrics, spawn_metrics_reporter};
pub use session::{Session, SessionError};
