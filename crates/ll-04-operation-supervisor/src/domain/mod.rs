//! # Domain Layer

pub mod errors;
pub mod policy;
pub mod stats;

pub use errors::SupervisorError;
pub use policy::{DuplicatePolicy, OperationTimeout, StartOptions};
pub use stats::{SupervisorStats, SupervisorStatsSnapshot};
