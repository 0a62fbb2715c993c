//! Harness errors

use thiserror::Error;

use tether_core::{Address, TetherError};

/// Errors raised by the simulation harness itself
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Unknown authority instance: {0}")]
    UnknownInstance(Address),

    #[error("Instance index {0} out of range")]
    IndexOutOfRange(usize),

    #[error("Relay traffic did not settle within {0} deliveries")]
    NotQuiescent(usize),

    #[error("Chain depth must be at least 1")]
    EmptyChain,

    #[error(transparent)]
    Authority(#[from] TetherError),
}

/// Result type for harness operations
pub type SimulationResult<T> = Result<T, SimulationError>;
