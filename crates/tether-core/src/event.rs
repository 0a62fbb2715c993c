//! Event definitions
//!
//! Authority events are the audit trail of an authority instance.
//! Every committed mutation produces exactly one event carrying the
//! before and after values. Relay messages are the outbound notifications
//! an instance hands to its transport on ownership change.

use serde::{Deserialize, Serialize};

use crate::Address;

/// A committed change to an authority instance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthorityEvent {
    /// Owner changed; `new = None` means renounced
    OwnershipChanged {
        old: Option<Address>,
        new: Option<Address>,
    },
    SuperOwnerStatusChanged {
        old: bool,
        new: bool,
    },
    /// Linked authority changed; `new = None` means detached (root)
    LinkedAuthorityChanged {
        old: Option<Address>,
        new: Option<Address>,
    },
}

impl AuthorityEvent {
    #[inline]
    pub fn is_ownership_change(&self) -> bool {
        matches!(self, AuthorityEvent::OwnershipChanged { .. })
    }
}

/// Event stamped with its per-instance sequence number
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub seq: u64,
    #[serde(flatten)]
    pub event: AuthorityEvent,
}

/// Outbound ownership notification from one instance to another
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayMessage {
    /// Sending authority instance; the receiver checks it against its link
    pub from: Address,
    /// Receiving authority instance
    pub to: Address,
    /// Sender-local notification sequence
    pub seq: u64,
    /// `None` instructs the receiver to renounce
    pub new_owner: Option<Address>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json_shape() {
        let a = Address::derive(b"alice");
        let record = EventRecord {
            seq: 7,
            event: AuthorityEvent::OwnershipChanged {
                old: Some(a),
                new: None,
            },
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["seq"], 7);
        assert_eq!(value["type"], "ownership_changed");
        assert_eq!(value["old"], a.to_string());
        assert!(value["new"].is_null());
    }

    #[test]
    fn test_renounce_message_json() {
        let msg = RelayMessage {
            from: Address::derive(b"root"),
            to: Address::derive(b"leaf"),
            seq: 1,
            new_owner: None,
        };
        let value = serde_json::to_value(msg).unwrap();
        assert!(value["new_owner"].is_null());
        assert_eq!(value["from"], Address::derive(b"root").to_string());
    }
}
