//! Authority configuration

use serde::{Deserialize, Serialize};

/// Policy knobs for an authority instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// A root instance (no linked authority) passes the super-owner gate
    /// without the super-owner flag. The owner identity check still applies.
    pub root_exempt_from_super_owner: bool,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        AuthorityConfig {
            root_exempt_from_super_owner: true,
        }
    }
}

impl AuthorityConfig {
    /// Every instance, root included, needs the flag to change ownership
    pub fn strict() -> Self {
        AuthorityConfig {
            root_exempt_from_super_owner: false,
        }
    }
}
