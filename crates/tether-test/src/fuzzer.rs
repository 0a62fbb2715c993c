//! Authority Fuzzer - Randomized operation sequences against a chain
//!
//! Tests:
//! - No privileged operation succeeds for a caller the reference model rejects
//! - No privileged operation fails for a caller the reference model admits
//! - Renounced instances admit nobody through owner or super-owner gates
//! - Each ownership change yields one event and one relay per downstream target
//! - Changes propagate to the linked downstream instance

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tether_authority::{AuthorityConfig, Gate};
use tether_core::{Address, AuthorityEvent, TetherError};
use tracing::debug;

use crate::chain::{ChainConfig, ChainSimulator};
use crate::SimulationResult;

/// Fuzzer configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzerConfig {
    /// Chain depth
    pub depth: usize,
    /// Number of operations to run
    pub op_count: usize,
    /// Number of user addresses callers are drawn from
    pub caller_pool: usize,
    /// Probability the caller is the instance's current owner
    pub owner_caller_prob: f64,
    /// Random seed
    pub seed: u64,
    /// Policy shared by every instance
    pub authority: AuthorityConfig,
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        FuzzerConfig {
            depth: 4,
            op_count: 500,
            caller_pool: 6,
            owner_caller_prob: 0.6,
            seed: 42,
            authority: AuthorityConfig::default(),
        }
    }
}

impl FuzzerConfig {
    /// Light fuzzing for quick tests
    pub fn light() -> Self {
        FuzzerConfig {
            depth: 3,
            op_count: 100,
            caller_pool: 4,
            ..FuzzerConfig::default()
        }
    }

    /// Heavy fuzzing for thorough testing
    pub fn heavy() -> Self {
        FuzzerConfig {
            depth: 8,
            op_count: 5000,
            caller_pool: 10,
            owner_caller_prob: 0.5,
            ..FuzzerConfig::default()
        }
    }
}

/// Operation issued by the fuzzer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FuzzOp {
    Transfer { caller: Address, new_owner: Address },
    Renounce { caller: Address },
    SetSuperOwner { caller: Address, enabled: bool },
    SetLinked { caller: Address, linked: Option<Address> },
    /// Relay call from an address that is not an instance
    ForgedRelay { caller: Address, new_owner: Option<Address> },
    /// Ask the combined guard without mutating
    Probe { caller: Address },
}

impl FuzzOp {
    fn caller(&self) -> Address {
        match *self {
            FuzzOp::Transfer { caller, .. }
            | FuzzOp::Renounce { caller }
            | FuzzOp::SetSuperOwner { caller, .. }
            | FuzzOp::SetLinked { caller, .. }
            | FuzzOp::ForgedRelay { caller, .. }
            | FuzzOp::Probe { caller } => caller,
        }
    }

    fn gate(&self) -> Gate {
        match self {
            FuzzOp::Transfer { .. } | FuzzOp::Renounce { .. } | FuzzOp::Probe { .. } => {
                Gate::SuperOwner
            }
            FuzzOp::SetSuperOwner { .. } | FuzzOp::SetLinked { .. } => Gate::Owner,
            FuzzOp::ForgedRelay { .. } => Gate::LinkedAuthority,
        }
    }
}

/// Guard-relevant state of one instance, captured before an operation
#[derive(Clone, Copy, Debug)]
struct Snapshot {
    owner: Option<Address>,
    super_owner_enabled: bool,
    linked_authority: Option<Address>,
}

impl Snapshot {
    /// Reference model of the gates, written independently of the guard code
    fn admits(&self, caller: Address, gate: Gate, config: &AuthorityConfig) -> bool {
        let is_owner = match self.owner {
            Some(owner) => owner == caller,
            None => false,
        };
        match gate {
            Gate::Owner => is_owner,
            Gate::SuperOwner => {
                let root = self.linked_authority.is_none();
                is_owner
                    && (self.super_owner_enabled || (root && config.root_exempt_from_super_owner))
            }
            Gate::LinkedAuthority => match self.linked_authority {
                Some(linked) => linked == caller,
                None => false,
            },
        }
    }
}

/// Fuzzing result
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FuzzResult {
    pub ops_executed: u64,
    pub ops_succeeded: u64,
    pub ownership_changes: u64,
    /// Operation succeeded although the model denies the caller
    pub unauthorized_successes: u32,
    /// Operation failed a gate although the model admits the caller
    pub authorized_failures: u32,
    /// A renounced instance admitted someone
    pub renounced_admissions: u32,
    /// Event or relay counts disagree with committed changes
    pub event_mismatches: u32,
    /// A change did not reach the linked downstream instance
    pub propagation_failures: u32,
}

impl FuzzResult {
    pub fn is_valid(&self) -> bool {
        self.unauthorized_successes == 0
            && self.authorized_failures == 0
            && self.renounced_admissions == 0
            && self.event_mismatches == 0
            && self.propagation_failures == 0
    }
}

/// Authority fuzzer
pub struct AuthorityFuzzer {
    config: FuzzerConfig,
    chain: ChainSimulator,
    callers: Vec<Address>,
    rng: StdRng,
}

impl AuthorityFuzzer {
    /// Create a new fuzzer; every instance starts owned by the first caller
    pub fn new(config: FuzzerConfig) -> SimulationResult<Self> {
        let callers: Vec<Address> = (0..config.caller_pool.max(1))
            .map(|i| Address::derive(format!("tether-user-{}-{i}", config.seed).as_bytes()))
            .collect();

        let chain_config = ChainConfig {
            depth: config.depth,
            seed: config.seed,
            authority: config.authority,
            ..ChainConfig::default()
        };
        let chain = ChainSimulator::new(chain_config, callers[0])?;

        Ok(AuthorityFuzzer {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            chain,
            callers,
        })
    }

    pub fn chain(&self) -> &ChainSimulator {
        &self.chain
    }

    /// Run the fuzzer
    pub fn run(&mut self) -> SimulationResult<FuzzResult> {
        let mut result = FuzzResult::default();

        for _ in 0..self.config.op_count {
            let index = self.rng.gen_range(0..self.chain.len());
            let op = self.generate_op(index)?;
            self.step(index, op, &mut result)?;
        }

        debug!(?result, "fuzz run finished");
        Ok(result)
    }

    fn random_caller(&mut self) -> Address {
        let i = self.rng.gen_range(0..self.callers.len());
        self.callers[i]
    }

    /// Mostly restore the chain wiring, sometimes detach or point at a user
    fn random_link(&mut self, index: usize) -> SimulationResult<Option<Address>> {
        let upstream = match index {
            0 => None,
            i => Some(self.chain.address(i - 1)?),
        };
        Ok(match self.rng.gen_range(0..4) {
            0 | 1 => upstream,
            2 => None,
            _ => Some(self.random_caller()),
        })
    }

    fn generate_op(&mut self, index: usize) -> SimulationResult<FuzzOp> {
        let owner = self.chain.authority(index)?.current_owner();
        let caller = match owner {
            Some(owner) if self.rng.gen::<f64>() < self.config.owner_caller_prob => owner,
            _ => self.random_caller(),
        };
        let target = if self.rng.gen::<f64>() < 0.1 {
            Address::ZERO
        } else {
            self.random_caller()
        };

        let op = match self.rng.gen_range(0..100) {
            0..=39 => FuzzOp::Transfer {
                caller,
                new_owner: target,
            },
            40..=44 => FuzzOp::Renounce { caller },
            45..=64 => FuzzOp::SetSuperOwner {
                caller,
                enabled: self.rng.gen(),
            },
            65..=74 => FuzzOp::SetLinked {
                caller,
                linked: self.random_link(index)?,
            },
            75..=89 => FuzzOp::ForgedRelay {
                caller,
                new_owner: target.non_null(),
            },
            _ => FuzzOp::Probe { caller },
        };
        Ok(op)
    }

    fn step(&mut self, index: usize, op: FuzzOp, result: &mut FuzzResult) -> SimulationResult<()> {
        let authority_config = self.config.authority;
        let snapshot = {
            let auth = self.chain.authority(index)?;
            Snapshot {
                owner: auth.current_owner(),
                super_owner_enabled: auth.is_super_owner_enabled(),
                linked_authority: auth.linked_authority(),
            }
        };
        let expected = snapshot.admits(op.caller(), op.gate(), &authority_config);
        let targets = self.chain.authority(index)?.relay().targets().len() as u64;
        let sent_before = self.chain.queue().sent();

        let auth = self.chain.authority_mut(index)?;
        let events_before = auth.events().len();
        let outcome: Result<(), TetherError> = match op {
            FuzzOp::Transfer { caller, new_owner } => auth.transfer(caller, new_owner),
            FuzzOp::Renounce { caller } => auth.renounce(caller),
            FuzzOp::SetSuperOwner { caller, enabled } => {
                auth.set_super_owner_enabled(caller, enabled)
            }
            FuzzOp::SetLinked { caller, linked } => auth.set_linked_authority(caller, linked),
            FuzzOp::ForgedRelay { caller, new_owner } => match new_owner {
                Some(new_owner) => auth.relay_transfer(caller, new_owner).map(|_| ()),
                None => auth.relay_renounce(caller).map(|_| ()),
            },
            FuzzOp::Probe { caller } => auth.require(caller, Gate::SuperOwner),
        };
        let committed_changes = auth.events()[events_before..]
            .iter()
            .filter(|r| r.event.is_ownership_change())
            .count() as u64;

        result.ops_executed += 1;
        match &outcome {
            Ok(()) => {
                result.ops_succeeded += 1;
                if !expected {
                    result.unauthorized_successes += 1;
                }
            }
            Err(e) if e.is_authorization() => {
                if expected {
                    result.authorized_failures += 1;
                }
            }
            Err(_) => {}
        }

        let sent = self.chain.queue().sent() - sent_before;
        if sent != committed_changes * targets {
            result.event_mismatches += 1;
        }
        result.ownership_changes += committed_changes;

        self.check_renounced(result)?;
        let audit_before = self.chain.audit().len();
        self.chain.deliver_all()?;
        if committed_changes > 0 {
            self.check_propagation(index, audit_before, result)?;
        }
        Ok(())
    }

    /// Every renounced instance must refuse every pool caller and the null address
    fn check_renounced(&self, result: &mut FuzzResult) -> SimulationResult<()> {
        for i in 0..self.chain.len() {
            let auth = self.chain.authority(i)?;
            if !auth.is_renounced() {
                continue;
            }
            let admitted = self
                .callers
                .iter()
                .copied()
                .chain(std::iter::once(Address::ZERO))
                .any(|c| {
                    auth.authorize(c, Gate::SuperOwner).is_allowed()
                        || auth.authorize(c, Gate::Owner).is_allowed()
                });
            if admitted {
                result.renounced_admissions += 1;
            }
        }
        Ok(())
    }

    /// Walk downstream from `origin`: every instance whose predecessor
    /// changed owner in this step must now match that predecessor. The walk
    /// stops at the first instance that did not change, since it relays nothing.
    fn check_propagation(
        &self,
        origin: usize,
        audit_before: usize,
        result: &mut FuzzResult,
    ) -> SimulationResult<()> {
        let changed: Vec<Address> = self.chain.audit().entries()[audit_before..]
            .iter()
            .filter(|e| e.record.event.is_ownership_change())
            .map(|e| e.instance)
            .collect();

        for i in origin + 1..self.chain.len() {
            let upstream_address = self.chain.address(i - 1)?;
            if !changed.contains(&upstream_address) {
                break;
            }
            let downstream = self.chain.authority(i)?;
            if downstream.linked_authority() != Some(upstream_address) {
                break;
            }
            if downstream.current_owner() != self.chain.authority(i - 1)?.current_owner() {
                result.propagation_failures += 1;
                break;
            }
        }
        Ok(())
    }

    /// Ownership history of one instance as recorded in the audit log
    pub fn ownership_history(&self, index: usize) -> SimulationResult<Vec<Option<Address>>> {
        let address = self.chain.address(index)?;
        Ok(self
            .chain
            .audit()
            .for_instance(address)
            .filter_map(|e| match e.record.event {
                AuthorityEvent::OwnershipChanged { new, .. } => Some(new),
                _ => None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuzzer_light() {
        let mut fuzzer = AuthorityFuzzer::new(FuzzerConfig::light()).unwrap();
        let result = fuzzer.run().unwrap();

        println!("Light fuzz result: {:?}", result);
        assert!(result.is_valid());
        assert_eq!(result.ops_executed, 100);
    }

    #[test]
    fn test_fuzzer_default() {
        let mut fuzzer = AuthorityFuzzer::new(FuzzerConfig::default()).unwrap();
        let result = fuzzer.run().unwrap();

        println!("Default fuzz result: {:?}", result);
        assert!(result.is_valid());
        assert!(result.ops_succeeded > 0);
    }

    #[test]
    fn test_fuzzer_strict_policy() {
        let config = FuzzerConfig {
            authority: AuthorityConfig::strict(),
            seed: 7,
            ..FuzzerConfig::default()
        };
        let mut fuzzer = AuthorityFuzzer::new(config).unwrap();
        assert!(fuzzer.run().unwrap().is_valid());
    }

    #[test]
    fn test_fuzzer_seeds() {
        for seed in 0..8 {
            let config = FuzzerConfig {
                seed,
                ..FuzzerConfig::light()
            };
            let mut fuzzer = AuthorityFuzzer::new(config).unwrap();
            let result = fuzzer.run().unwrap();
            assert!(result.is_valid(), "seed {seed}: {result:?}");
        }
    }

    #[test]
    fn test_history_matches_changes() {
        let mut fuzzer = AuthorityFuzzer::new(FuzzerConfig::light()).unwrap();
        let result = fuzzer.run().unwrap();

        let total: usize = (0..fuzzer.chain().len())
            .map(|i| fuzzer.ownership_history(i).unwrap().len())
            .sum();
        // Local changes are counted by the fuzzer, relayed ones are not
        assert!(total as u64 >= result.ownership_changes);

        let root_history = fuzzer.ownership_history(0).unwrap();
        if let Some(last) = root_history.last() {
            assert_eq!(*last, fuzzer.chain().root().current_owner());
        }
    }

    #[test]
    fn test_set_linked_checked_against_model() {
        let mut fuzzer = AuthorityFuzzer::new(FuzzerConfig::light()).unwrap();
        let owner = fuzzer.callers[0];
        let intruder = fuzzer.callers[1];
        let upstream = fuzzer.chain().address(0).unwrap();
        let mut result = FuzzResult::default();

        let op = FuzzOp::SetLinked {
            caller: intruder,
            linked: Some(intruder),
        };
        fuzzer.step(1, op, &mut result).unwrap();
        assert_eq!(result.ops_succeeded, 0);
        assert!(result.is_valid(), "{result:?}");
        assert_eq!(fuzzer.chain().authority(1).unwrap().linked_authority(), Some(upstream));

        let op = FuzzOp::SetLinked {
            caller: owner,
            linked: None,
        };
        fuzzer.step(1, op, &mut result).unwrap();
        assert_eq!(result.ops_succeeded, 1);
        assert!(result.is_valid(), "{result:?}");
        assert!(fuzzer.chain().authority(1).unwrap().is_root());
    }
}
