//! TETHER Test Harness - Chain simulation and authority validation
//!
//! This crate provides:
//! - A chain simulator wiring authority instances through relay outboxes
//! - A chaos relay network (loss, duplication, reordering, retries)
//! - A consumer application guarded by the combined super-owner gate
//! - An authority fuzzer checking authorization invariants
//! - End-to-end integration scenarios

pub mod app;
pub mod chain;
pub mod chaos;
pub mod error;
pub mod fuzzer;
pub mod integration;

pub use app::*;
pub use chain::*;
pub use chaos::*;
pub use error::*;
pub use fuzzer::*;
pub use integration::*;

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber honoring `RUST_LOG` (default: info for tether crates).
/// Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tether_authority=info,tether_test=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
