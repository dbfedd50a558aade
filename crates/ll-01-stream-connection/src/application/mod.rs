//! # Application Layer
//!
//! The connection manager service.

pub mod service;

pub use service::StreamConnectionManager;
