//! # Integration Tests
//!
//! Flows that cross crate boundaries. Every test runs against
//! `MockStreamTransport` and the mock write/contract APIs, so frames are
//! pushed exactly where and when a test needs them.

pub mod flows;
pub mod session;
