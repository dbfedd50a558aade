//! # Shared Types Crate
//!
//! This crate contains the stream event model, identifiers, correlation
//! tokens and connection states shared by every Ledger-Link crate.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-crate types are defined here.
//! - **Open Event Kinds**: `EventKind` is a string tag, not a closed enum.
//!   Unknown kinds decode fine and are simply not listened for.
//! - **Opaque Tokens**: `CorrelationToken` is compared by content only; the
//!   client never interprets it.

pub mod entities;
pub mod errors;
pub mod wire;

pub use entities::*;
pub use errors::*;
pub use wire::{decode_frame, FrameDecision};
