//! # Ledger-Link Test Suite
//!
//! Cross-crate tests that drive the full client pipeline with in-memory
//! transports and backends.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── flows.rs      # stream → registry → correlator → supervisor
//!     └── session.rs    # client_runtime::Session lifecycle
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p ll-tests
//!
//! # By category
//! cargo test -p ll-tests integration::flows::
//! cargo test -p ll-tests integration::session::
//! ```

#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(dead_code)]

pub mod integration;
