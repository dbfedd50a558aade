//! # LL-01 Stream Connection Manager
//!
//! Owns the server-push connection of a session and feeds decoded events to
//! the listener registry.
//!
//! **Subsystem ID:** 01
//! **Architecture:** Hexagonal (Ports/Adapters)
//!
//! ## Behaviour
//!
//! | Situation | Result |
//! |-----------|--------|
//! | `connect` to the current target | no-op |
//! | `connect` to another target | old connection closed, then new one opened |
//! | blank frame | skipped |
//! | malformed frame | dropped, logged at debug |
//! | stream error or end of stream | `Disconnected`, bounded reconnect with backoff |
//! | retry budget exhausted | `Disconnected { gave_up: true }`, no more attempts |
//!
//! ## Module Structure
//!
//! ```text
//! ll-01-stream-connection/
//! ├── domain/          # ReconnectPolicy, stats, errors
//! ├── ports/           # StreamTransport trait + MockStreamTransport
//! ├── adapters/        # SseTransport (reqwest + eventsource-stream)
//! ├── application/     # StreamConnectionManager
//! └── config.rs        # StreamConfig
//! ```

#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use adapters::SseTransport;
pub use application::StreamConnectionManager;
pub use config::{StreamConfig, StreamConfigError};
pub use domain::{
    BackoffStrategy, ReconnectPolicy, StreamConnectionError, StreamStats, StreamStatsSnapshot,
};
pub use ports::{FrameStream, MockStreamTransport, StreamTransport};
