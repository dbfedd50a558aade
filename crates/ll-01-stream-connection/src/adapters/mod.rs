//! # Adapters Layer
//!
//! Concrete transports.

pub mod sse;

pub use sse::{SseTransport, STREAM_PATH};
