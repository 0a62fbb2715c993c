//! Upgrade registry - a consumer application built on an authority
//!
//! Shows how application code guards its own privileged operations:
//! one `require` call per operation, using `Gate::SuperOwner` for anything
//! that must stay locked once ownership is renounced.

use tether_authority::{Authority, Gate, NoRelay, RelayHook};
use tether_core::{Address, TetherError, TetherResult};
use tracing::info;

/// Registry of the implementation an upgradeable deployment points at
#[derive(Debug)]
pub struct UpgradeRegistry<R: RelayHook = NoRelay> {
    authority: Authority<R>,
    implementation: Address,
    /// Previous implementations, oldest first
    history: Vec<Address>,
    fee: u64,
}

impl<R: RelayHook> UpgradeRegistry<R> {
    pub fn new(authority: Authority<R>, implementation: Address) -> TetherResult<Self> {
        let implementation = implementation
            .non_null()
            .ok_or_else(|| TetherError::InvalidAddress(implementation.to_string()))?;

        Ok(UpgradeRegistry {
            authority,
            implementation,
            history: Vec::new(),
            fee: 0,
        })
    }

    pub fn authority(&self) -> &Authority<R> {
        &self.authority
    }

    pub fn authority_mut(&mut self) -> &mut Authority<R> {
        &mut self.authority
    }

    pub fn implementation(&self) -> Address {
        self.implementation
    }

    pub fn history(&self) -> &[Address] {
        &self.history
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    /// Point the deployment at a new implementation (super-owner only)
    pub fn update_implementation(
        &mut self,
        caller: Address,
        implementation: Address,
    ) -> TetherResult<()> {
        self.authority.require(caller, Gate::SuperOwner)?;
        let implementation = implementation
            .non_null()
            .ok_or_else(|| TetherError::InvalidAddress(implementation.to_string()))?;

        let old = std::mem::replace(&mut self.implementation, implementation);
        self.history.push(old);
        info!(%caller, %old, new = %implementation, "implementation updated");
        Ok(())
    }

    /// Owner-only parameter change
    pub fn set_fee(&mut self, caller: Address, fee: u64) -> TetherResult<()> {
        self.authority.require(caller, Gate::Owner)?;
        self.fee = fee;
        Ok(())
    }
}
