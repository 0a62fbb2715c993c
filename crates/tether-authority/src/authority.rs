//! Authority state machine
//!
//! One [`Authority`] per deployed instance. It holds the owner, the
//! super-owner flag and the linked (upstream) authority, and is the only
//! place those fields change.
//!
//! Local operations (`transfer`, `renounce`) are gated by the combined
//! owner + super-owner guard. Remote operations (`relay_transfer`,
//! `relay_renounce`) are gated by the linked-authority guard and are
//! idempotent, since an upstream instance may re-send a notification.
//! Every ownership change goes through a single primitive that also fires
//! the relay hook; if the hook fails the change is rolled back.

use tether_core::{normalize, Address, AuthorityEvent, EventRecord, TetherError, TetherResult};
use tracing::{debug, info, trace, warn};

use crate::guard::{Decision, Gate, GuardContext};
use crate::relay::{NoRelay, RelayHook};
use crate::AuthorityConfig;

/// Result of a remotely relayed operation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Ownership changed
    Applied,
    /// Already in the requested state; nothing changed
    Unchanged,
}

impl RelayOutcome {
    #[inline]
    pub fn is_applied(self) -> bool {
        self == RelayOutcome::Applied
    }
}

/// Ownership and privilege state of one authority instance
///
/// Committed events are buffered in memory until [`Authority::take_events`]
/// drains them. The buffer is unbounded: long-lived consumers must drain it
/// (e.g. into an [`AuditLog`](crate::AuditLog)) or it grows with every mutation.
#[derive(Debug)]
pub struct Authority<R: RelayHook = NoRelay> {
    owner: Option<Address>,
    super_owner_enabled: bool,
    linked_authority: Option<Address>,
    config: AuthorityConfig,
    relay: R,
    /// Committed events not yet taken by the caller
    events: Vec<EventRecord>,
    next_seq: u64,
}

impl Authority<NoRelay> {
    /// Authority without a relay; ownership changes stay local
    pub fn standalone(
        owner: Address,
        linked_authority: Option<Address>,
        super_owner_enabled: bool,
    ) -> TetherResult<Self> {
        Authority::new(owner, linked_authority, super_owner_enabled, NoRelay)
    }
}

impl<R: RelayHook> Authority<R> {
    /// Create an authority with the default configuration.
    ///
    /// `owner` must not be the null address. A null `linked_authority`
    /// makes this a root instance.
    pub fn new(
        owner: Address,
        linked_authority: Option<Address>,
        super_owner_enabled: bool,
        relay: R,
    ) -> TetherResult<Self> {
        Authority::with_config(
            owner,
            linked_authority,
            super_owner_enabled,
            relay,
            AuthorityConfig::default(),
        )
    }

    pub fn with_config(
        owner: Address,
        linked_authority: Option<Address>,
        super_owner_enabled: bool,
        relay: R,
        config: AuthorityConfig,
    ) -> TetherResult<Self> {
        let owner = owner.non_null().ok_or(TetherError::InvalidNewOwner)?;

        Ok(Authority {
            owner: Some(owner),
            super_owner_enabled,
            linked_authority: normalize(linked_authority),
            config,
            relay,
            events: Vec::new(),
            next_seq: 0,
        })
    }

    // Accessors

    /// Current owner; `None` once renounced
    #[inline]
    pub fn current_owner(&self) -> Option<Address> {
        self.owner
    }

    #[inline]
    pub fn is_super_owner_enabled(&self) -> bool {
        self.super_owner_enabled
    }

    #[inline]
    pub fn linked_authority(&self) -> Option<Address> {
        self.linked_authority
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.linked_authority.is_none()
    }

    #[inline]
    pub fn is_renounced(&self) -> bool {
        self.owner.is_none()
    }

    #[inline]
    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    #[inline]
    pub fn relay(&self) -> &R {
        &self.relay
    }

    /// Committed events not yet taken
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Remove and return committed events
    pub fn take_events(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.events)
    }

    // Guards

    /// Evaluate a gate for `caller`.
    ///
    /// Application code guarding its own privileged operations should call
    /// this with `Gate::SuperOwner`, which includes the owner check.
    pub fn authorize(&self, caller: Address, gate: Gate) -> Decision {
        let decision = self.guard_context().decide(caller, gate);
        if let Decision::Deny { reason, .. } = decision {
            debug!(%caller, %gate, ?reason, "authority gate denied");
        }
        decision
    }

    /// [`Authority::authorize`] as a `Result`
    #[inline]
    pub fn require(&self, caller: Address, gate: Gate) -> TetherResult<()> {
        self.authorize(caller, gate).into_result()
    }

    fn guard_context(&self) -> GuardContext {
        GuardContext {
            owner: self.owner,
            super_owner_enabled: self.super_owner_enabled,
            linked_authority: self.linked_authority,
            root_exempt: self.config.root_exempt_from_super_owner,
        }
    }

    // Owner-gated setters

    pub fn set_super_owner_enabled(&mut self, caller: Address, enabled: bool) -> TetherResult<()> {
        self.require(caller, Gate::Owner)?;

        let old = self.super_owner_enabled;
        self.super_owner_enabled = enabled;
        info!(%caller, old, new = enabled, "super owner status changed");
        self.record(AuthorityEvent::SuperOwnerStatusChanged { old, new: enabled });
        Ok(())
    }

    /// Set or detach (`None` / null address) the linked authority
    pub fn set_linked_authority(
        &mut self,
        caller: Address,
        linked_authority: Option<Address>,
    ) -> TetherResult<()> {
        self.require(caller, Gate::Owner)?;

        let old = self.linked_authority;
        let new = normalize(linked_authority);
        self.linked_authority = new;
        info!(%caller, ?old, ?new, "linked authority changed");
        self.record(AuthorityEvent::LinkedAuthorityChanged { old, new });
        Ok(())
    }

    // Locally initiated transitions

    /// Give up ownership permanently on this instance
    pub fn renounce(&mut self, caller: Address) -> TetherResult<()> {
        self.require(caller, Gate::SuperOwner)?;
        self.execute_ownership_change(None)
    }

    pub fn transfer(&mut self, caller: Address, new_owner: Address) -> TetherResult<()> {
        self.require(caller, Gate::SuperOwner)?;
        let new_owner = new_owner.non_null().ok_or(TetherError::InvalidNewOwner)?;
        self.execute_ownership_change(Some(new_owner))
    }

    // Remotely initiated transitions

    /// Renounce on instruction from the linked authority.
    /// A no-op if already renounced.
    pub fn relay_renounce(&mut self, caller: Address) -> TetherResult<RelayOutcome> {
        self.require(caller, Gate::LinkedAuthority)?;

        if self.owner.is_none() {
            trace!(%caller, "relay renounce: already renounced");
            return Ok(RelayOutcome::Unchanged);
        }
        self.execute_ownership_change(None)?;
        Ok(RelayOutcome::Applied)
    }

    /// Transfer on instruction from the linked authority.
    /// A no-op if `new_owner` already owns this instance.
    pub fn relay_transfer(
        &mut self,
        caller: Address,
        new_owner: Address,
    ) -> TetherResult<RelayOutcome> {
        self.require(caller, Gate::LinkedAuthority)?;
        let new_owner = new_owner.non_null().ok_or(TetherError::InvalidNewOwner)?;

        if self.owner == Some(new_owner) {
            trace!(%caller, %new_owner, "relay transfer: owner unchanged");
            return Ok(RelayOutcome::Unchanged);
        }
        self.execute_ownership_change(Some(new_owner))?;
        Ok(RelayOutcome::Applied)
    }

    /// The only place `owner` is written. Callers have already passed the
    /// appropriate gate.
    fn execute_ownership_change(&mut self, new_owner: Option<Address>) -> TetherResult<()> {
        let old_owner = self.owner;
        self.owner = new_owner;

        if let Err(e) = self.relay.notify_remote_authority(new_owner) {
            self.owner = old_owner;
            warn!(?old_owner, ?new_owner, error = %e, "relay failed, ownership change rolled back");
            return Err(e.into());
        }

        info!(?old_owner, ?new_owner, "ownership changed");
        self.record(AuthorityEvent::OwnershipChanged {
            old: old_owner,
            new: new_owner,
        });
        Ok(())
    }

    fn record(&mut self, event: AuthorityEvent) {
        self.next_seq += 1;
        self.events.push(EventRecord {
            seq: self.next_seq,
            event,
        });
    }
}
