//! # Ports Layer
//!
//! Outbound transport trait plus a scriptable mock.

pub mod outbound;

pub use outbound::{FrameStream, MockStreamTransport, StreamTransport};
