//! TETHER Authority - Ownership and privilege state machine
//!
//! This crate implements one authority instance of a linked chain:
//! - Owner, super-owner flag and linked (upstream) authority state
//! - Owner, combined super-owner and linked-authority guards
//! - Local and relayed transfer / renounce transitions
//! - The relay hook fired on every ownership change
//! - JSON audit export of committed events

pub mod audit;
pub mod authority;
pub mod config;
pub mod guard;
pub mod relay;

pub use audit::*;
pub use authority::*;
pub use config::*;
pub use guard::{Decision, DenyReason, Gate};
pub use relay::*;
