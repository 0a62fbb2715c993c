#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tether_authority::{Authority, AuthorityConfig, Gate, NoRelay};
use tether_core::{Address, AuthorityEvent};

/// Small address space so callers collide with owner / link often
#[derive(Arbitrary, Debug, Clone, Copy)]
struct Who(u8);

impl Who {
    fn address(self) -> Address {
        match self.0 % 5 {
            0 => Address::ZERO,
            n => Address::derive(&[n]),
        }
    }
}

#[derive(Arbitrary, Debug)]
enum Op {
    SetSuperOwner(Who, bool),
    SetLinked(Who, Option<Who>),
    Renounce(Who),
    Transfer(Who, Who),
    RelayRenounce(Who),
    RelayTransfer(Who, Who),
}

#[derive(Arbitrary, Debug)]
struct Input {
    linked: Option<Who>,
    super_owner: bool,
    strict: bool,
    ops: Vec<Op>,
}

fuzz_target!(|input: Input| {
    let owner = Address::derive(&[1]);
    let config = if input.strict {
        AuthorityConfig::strict()
    } else {
        AuthorityConfig::default()
    };
    let Ok(mut auth) = Authority::with_config(
        owner,
        input.linked.map(Who::address),
        input.super_owner,
        NoRelay,
        config,
    ) else {
        return;
    };

    for op in input.ops {
        let before = auth.current_owner();
        let linked_before = auth.linked_authority();
        let flag_before = auth.is_super_owner_enabled();
        let events_before = auth.events().len();
        let owner_gated = match op {
            Op::SetSuperOwner(c, _) | Op::SetLinked(c, _) => Some(c.address()),
            _ => None,
        };

        let changed_owner = match op {
            Op::SetSuperOwner(c, f) => auth
                .set_super_owner_enabled(c.address(), f)
                .map(|_| false),
            Op::SetLinked(c, l) => auth
                .set_linked_authority(c.address(), l.map(Who::address))
                .map(|_| false),
            Op::Renounce(c) => auth.renounce(c.address()).map(|_| true),
            Op::Transfer(c, n) => auth.transfer(c.address(), n.address()).map(|_| true),
            Op::RelayRenounce(c) => auth.relay_renounce(c.address()).map(|o| o.is_applied()),
            Op::RelayTransfer(c, n) => auth
                .relay_transfer(c.address(), n.address())
                .map(|o| o.is_applied()),
        };

        // The null address is never stored
        assert_ne!(auth.current_owner(), Some(Address::ZERO));
        assert_ne!(auth.linked_authority(), Some(Address::ZERO));

        // Configuration setters are open to the live owner and nobody else
        if let Some(caller) = owner_gated {
            assert_eq!(changed_owner.is_ok(), before == Some(caller));
            if changed_owner.is_err() {
                assert_eq!(auth.linked_authority(), linked_before);
                assert_eq!(auth.is_super_owner_enabled(), flag_before);
            }
        }

        let new_events = &auth.events()[events_before..];
        match changed_owner {
            Ok(true) => {
                assert_eq!(new_events.len(), 1);
                assert_eq!(
                    new_events[0].event,
                    AuthorityEvent::OwnershipChanged {
                        old: before,
                        new: auth.current_owner()
                    }
                );
            }
            Ok(false) => assert_eq!(auth.current_owner(), before),
            Err(_) => {
                assert!(new_events.is_empty());
                assert_eq!(auth.current_owner(), before);
            }
        }

        // Renounced means locked for every owner-side gate
        if auth.is_renounced() {
            for n in 0..5u8 {
                let c = Who(n).address();
                assert!(!auth.authorize(c, Gate::Owner).is_allowed());
                assert!(!auth.authorize(c, Gate::SuperOwner).is_allowed());
            }
        }
    }
});
