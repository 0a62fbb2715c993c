//! Error types for TETHER

use thiserror::Error;

use crate::Address;

/// Core TETHER errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TetherError {
    // Authorization errors
    #[error("Unauthorized caller: {caller} is not the current owner")]
    UnauthorizedCaller { caller: Address },

    #[error("Not super owner: {caller} may not change ownership on this instance")]
    NotSuperOwner { caller: Address },

    #[error("Unauthorized remote caller: {caller} is not the linked authority")]
    UnauthorizedRemoteCaller { caller: Address },

    // Argument errors
    #[error("Invalid new owner: the null address cannot own an authority")]
    InvalidNewOwner,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    // Relay errors
    #[error("Relay failed: {0}")]
    Relay(#[from] RelayError),
}

impl TetherError {
    /// Is this an authorization (gate) failure?
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            TetherError::UnauthorizedCaller { .. }
                | TetherError::NotSuperOwner { .. }
                | TetherError::UnauthorizedRemoteCaller { .. }
        )
    }
}

/// Failures reported by a relay hook
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("relay channel closed")]
    Closed,

    #[error("relay rejected notification: {0}")]
    Rejected(String),
}

/// Result type for TETHER operations
pub type TetherResult<T> = Result<T, TetherError>;
