//! # Ports Layer

pub mod outbound;

pub use outbound::{ContractApi, MockContractApi, MockWriteApi, SubmittedWrite, WriteApi};
