//! Authorization guards
//!
//! Three gates protect an authority instance:
//!
//! - **Owner**: caller is the current, non-null owner.
//! - **SuperOwner**: the owner gate, plus the instance is allowed to change
//!   ownership locally (flag set, or root instance under the exemption).
//! - **LinkedAuthority**: caller is the configured upstream instance.
//!
//! The super-owner check is never evaluated on its own. `Gate::SuperOwner`
//! always runs the owner check first, so a renounced instance (owner `None`)
//! denies every super-owner gated operation whatever the flag says.

use std::fmt;

use serde::{Deserialize, Serialize};
use tether_core::{Address, TetherError, TetherResult};

/// Which guard an operation is protected by
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gate {
    /// Caller must be the current owner
    Owner,
    /// Caller must be the current owner AND hold super-owner rights
    SuperOwner,
    /// Caller must be the linked (upstream) authority
    LinkedAuthority,
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Gate::Owner => "owner",
            Gate::SuperOwner => "super-owner",
            Gate::LinkedAuthority => "linked-authority",
        };
        f.write_str(name)
    }
}

/// Why a gate refused a caller
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DenyReason {
    UnauthorizedCaller,
    NotSuperOwner,
    UnauthorizedRemoteCaller,
}

impl DenyReason {
    pub fn into_error(self, caller: Address) -> TetherError {
        match self {
            DenyReason::UnauthorizedCaller => TetherError::UnauthorizedCaller { caller },
            DenyReason::NotSuperOwner => TetherError::NotSuperOwner { caller },
            DenyReason::UnauthorizedRemoteCaller => {
                TetherError::UnauthorizedRemoteCaller { caller }
            }
        }
    }
}

/// Outcome of a guard evaluation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { caller: Address, reason: DenyReason },
}

impl Decision {
    #[inline]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn reason(&self) -> Option<DenyReason> {
        match self {
            Decision::Allow => None,
            Decision::Deny { reason, .. } => Some(*reason),
        }
    }

    pub fn into_result(self) -> TetherResult<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny { caller, reason } => Err(reason.into_error(caller)),
        }
    }
}

/// Snapshot of the fields the guards read
#[derive(Clone, Copy, Debug)]
pub(crate) struct GuardContext {
    pub owner: Option<Address>,
    pub super_owner_enabled: bool,
    pub linked_authority: Option<Address>,
    pub root_exempt: bool,
}

impl GuardContext {
    pub fn decide(&self, caller: Address, gate: Gate) -> Decision {
        let allowed = match gate {
            Gate::Owner => self.is_owner(caller),
            Gate::SuperOwner => {
                if !self.is_owner(caller) {
                    return deny(caller, DenyReason::UnauthorizedCaller);
                }
                self.has_super_owner_rights()
            }
            Gate::LinkedAuthority => self.is_linked_authority(caller),
        };

        if allowed {
            Decision::Allow
        } else {
            let reason = match gate {
                Gate::Owner => DenyReason::UnauthorizedCaller,
                Gate::SuperOwner => DenyReason::NotSuperOwner,
                Gate::LinkedAuthority => DenyReason::UnauthorizedRemoteCaller,
            };
            deny(caller, reason)
        }
    }

    #[inline]
    fn is_owner(&self, caller: Address) -> bool {
        // owner never holds the null address, so a null caller cannot match
        self.owner == Some(caller)
    }

    #[inline]
    fn has_super_owner_rights(&self) -> bool {
        self.super_owner_enabled || (self.linked_authority.is_none() && self.root_exempt)
    }

    #[inline]
    fn is_linked_authority(&self, caller: Address) -> bool {
        self.linked_authority == Some(caller)
    }
}

#[inline]
fn deny(caller: Address, reason: DenyReason) -> Decision {
    Decision::Deny { caller, reason }
}
