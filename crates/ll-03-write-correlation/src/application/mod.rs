//! # Application Layer

pub mod correlator;
pub mod operation;

pub use correlator::WriteCorrelator;
pub use operation::{OperationUpdate, TrackedOperation, TransitionHook};
