//! End-to-end Integration Test Suite
//!
//! Scenarios that run the whole stack:
//! - Root ownership changes relayed down a chain
//! - Renounce followed by a relayed re-assignment
//! - Delivery over lossy and duplicating transports
//! - Application guards after renounce

use tether_core::{Address, AuthorityEvent};

use crate::chain::{ChainConfig, ChainSimulator};
use crate::chaos::{ChaosRelayConfig, ChaosRelayNetwork};
use crate::SimulationResult;

// ============================================================================
// SCENARIO RUNNER
// ============================================================================

/// Outcome of a propagation scenario
#[derive(Clone, Debug)]
pub struct PropagationReport {
    /// Owner of every instance after delivery, root first
    pub owners: Vec<Option<Address>>,
    /// Relay messages handed to instances (duplicates included)
    pub delivered: u64,
    /// Deliveries that were idempotent no-ops
    pub unchanged: u64,
    /// Ownership events recorded across the chain
    pub ownership_events: usize,
}

impl PropagationReport {
    pub fn converged_on(&self, owner: Option<Address>) -> bool {
        self.owners.iter().all(|o| *o == owner)
    }
}

/// Transfer the root of a fresh chain from `from` to `to` and deliver the
/// relays over a chaos network.
pub fn run_root_transfer(
    depth: usize,
    from: Address,
    to: Address,
    chaos: ChaosRelayConfig,
    seed: u64,
) -> SimulationResult<PropagationReport> {
    let mut chain = ChainSimulator::new(
        ChainConfig {
            seed,
            ..ChainConfig::with_depth(depth)
        },
        from,
    )?;
    let mut network = ChaosRelayNetwork::new(chaos, seed);

    chain.root_mut().transfer(from, to)?;
    let report = chain.deliver_all_chaotic(&mut network)?;

    Ok(PropagationReport {
        owners: chain.owners(),
        delivered: report.delivered,
        unchanged: report.unchanged,
        ownership_events: chain
            .audit()
            .entries()
            .iter()
            .filter(|e| matches!(e.record.event, AuthorityEvent::OwnershipChanged { .. }))
            .count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::UpgradeRegistry;
    use tether_authority::{Authority, Gate, NoRelay, RelayOutcome};
    use tether_core::TetherError;

    fn user(label: &str) -> Address {
        Address::derive(label.as_bytes())
    }

    // ========================================================================
    // OWNERSHIP LIFECYCLE
    // ========================================================================

    /// A renounces, the application locks, P re-assigns to B twice.
    #[test]
    fn test_renounce_lock_and_relay_reassign() {
        crate::init_tracing();

        let a = user("a");
        let b = user("b");
        let p = user("p");

        let authority = Authority::new(a, Some(p), true, NoRelay).unwrap();
        let mut app = UpgradeRegistry::new(authority, user("impl-v1")).unwrap();

        // (1) renounce
        app.authority_mut().renounce(a).unwrap();
        assert_eq!(app.authority().current_owner(), None);

        // (2) the super-owner gated application function fails for everyone
        for caller in [a, b, p, Address::ZERO] {
            let err = app.update_implementation(caller, user("impl-v2")).unwrap_err();
            assert!(err.is_authorization(), "{caller}: {err}");
        }

        // (3) relayed transfer from the linked authority
        assert_eq!(
            app.authority_mut().relay_transfer(p, b),
            Ok(RelayOutcome::Applied)
        );
        assert_eq!(app.authority().current_owner(), Some(b));

        // (4) the same relay again is a no-op
        assert_eq!(
            app.authority_mut().relay_transfer(p, b),
            Ok(RelayOutcome::Unchanged)
        );
        assert_eq!(app.authority().current_owner(), Some(b));

        // B now controls the application
        app.update_implementation(b, user("impl-v2")).unwrap();
        assert_eq!(app.implementation(), user("impl-v2"));
    }

    #[test]
    fn test_relay_renounce_twice_on_chain_leaf() {
        let a = user("a");
        let mut chain = ChainSimulator::new(ChainConfig::with_depth(2), a).unwrap();
        let root = chain.address(0).unwrap();

        chain.apply(0, |auth| auth.renounce(a)).unwrap();
        assert_eq!(chain.owners(), vec![None, None]);

        // Upstream re-sends the renounce
        let leaf = chain.authority_mut(1).unwrap();
        assert_eq!(leaf.relay_renounce(root), Ok(RelayOutcome::Unchanged));
        assert_eq!(leaf.relay_renounce(root), Ok(RelayOutcome::Unchanged));
    }

    #[test]
    fn test_leaf_owner_cannot_hijack_via_relay() {
        let a = user("a");
        let mut chain = ChainSimulator::new(ChainConfig::with_depth(3), a).unwrap();

        let leaf = chain.authority_mut(2).unwrap();
        assert_eq!(
            leaf.relay_transfer(a, user("mallory")),
            Err(TetherError::UnauthorizedRemoteCaller { caller: a })
        );
        assert!(!leaf.authorize(a, Gate::LinkedAuthority).is_allowed());
    }

    #[test]
    fn test_strict_root_needs_flag() {
        let a = user("a");
        let config = ChainConfig {
            root_super_owner: false,
            authority: tether_authority::AuthorityConfig::strict(),
            ..ChainConfig::with_depth(2)
        };
        let mut chain = ChainSimulator::new(config, a).unwrap();

        assert!(chain.apply(0, |auth| auth.transfer(a, user("b"))).is_err());
        chain.apply(0, |auth| auth.set_super_owner_enabled(a, true)).unwrap();
        chain.apply(0, |auth| auth.transfer(a, user("b"))).unwrap();
        assert!(chain.is_converged());
    }

    // ========================================================================
    // TRANSPORT CHAOS
    // ========================================================================

    #[test]
    fn test_reliable_propagation() {
        let report = run_root_transfer(6, user("a"), user("b"), ChaosRelayConfig::reliable(), 1)
            .unwrap();
        assert!(report.converged_on(Some(user("b"))));
        assert_eq!(report.delivered, 5);
        assert_eq!(report.unchanged, 0);
        assert_eq!(report.ownership_events, 6);
    }

    #[test]
    fn test_lossy_propagation_converges() {
        for seed in 0..10 {
            let report =
                run_root_transfer(5, user("a"), user("b"), ChaosRelayConfig::lossy(), seed)
                    .unwrap();
            assert!(report.converged_on(Some(user("b"))), "seed {seed}: {report:?}");
            // Duplicates never produce a second change on the same instance
            assert_eq!(report.ownership_events, 5);
            assert_eq!(report.delivered, 4 + report.unchanged);
        }
    }

    #[test]
    fn test_hostile_propagation_converges() {
        for seed in 0..10 {
            let report =
                run_root_transfer(8, user("a"), user("b"), ChaosRelayConfig::hostile(), seed)
                    .unwrap();
            assert!(report.converged_on(Some(user("b"))), "seed {seed}: {report:?}");
            assert_eq!(report.ownership_events, 8);
        }
    }

    #[test]
    fn test_renounce_over_chaos() {
        let a = user("a");
        let mut chain = ChainSimulator::new(ChainConfig::with_depth(4), a).unwrap();
        let mut network = ChaosRelayNetwork::new(ChaosRelayConfig::lossy(), 3);

        chain.root_mut().renounce(a).unwrap();
        chain.deliver_all_chaotic(&mut network).unwrap();

        assert_eq!(chain.owners(), vec![None; 4]);
        println!("Chaos stats: {:?}", network.stats());
    }

    #[test]
    fn test_audit_export_after_propagation() {
        let a = user("a");
        let b = user("b");
        let mut chain = ChainSimulator::new(ChainConfig::with_depth(3), a).unwrap();
        chain.apply(0, |auth| auth.transfer(a, b)).unwrap();

        let text = chain.audit().to_json_lines().unwrap();
        assert_eq!(text.lines().count(), 3);
        for i in 0..3 {
            assert!(text.contains(&chain.address(i).unwrap().to_string()));
        }
    }
}
