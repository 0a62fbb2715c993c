//! TETHER Core - Fundamental types and primitives
//!
//! This crate defines the core types shared by every TETHER component:
//! - Identifiers (Address)
//! - Authority events and sequenced event records
//! - The error taxonomy and result alias

pub mod id;
pub mod event;
pub mod error;

pub use id::*;
pub use event::*;
pub use error::*;
