//! # Domain Layer
//!
//! State machine, confirmation matching, errors and counters.

pub mod confirmation;
pub mod errors;
pub mod state;
pub mod stats;

pub use confirmation::Confirmation;
pub use errors::CorrelationError;
pub use state::{OperationState, Transition};
pub use stats::{CorrelatorStats, CorrelatorStatsSnapshot};
