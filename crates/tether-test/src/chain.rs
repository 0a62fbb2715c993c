//! Chain simulator
//!
//! Builds a linear chain of authority instances. Instance 0 is the root;
//! instance i links to instance i-1. Each instance relays ownership changes
//! to its downstream neighbour through a shared [`RelayQueue`], and the
//! simulator plays the role of the transport: it hands each queued message
//! to its target as `relay_transfer` / `relay_renounce`, with the sending
//! instance's address as the caller.

use serde::{Deserialize, Serialize};
use tether_authority::{Authority, AuditLog, AuthorityConfig, Outbox, RelayOutcome, RelayQueue};
use tether_core::{Address, RelayMessage, TetherError, TetherResult};
use tracing::{debug, trace};

use crate::chaos::ChaosRelayNetwork;
use crate::{SimulationError, SimulationResult};

/// Chain configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Number of instances, root included
    pub depth: usize,
    /// Super-owner flag on the root
    pub root_super_owner: bool,
    /// Super-owner flag on every downstream instance
    pub downstream_super_owner: bool,
    /// Seed for instance address derivation
    pub seed: u64,
    /// Upper bound on deliveries per pump
    pub max_deliveries: usize,
    /// Policy shared by every instance
    pub authority: AuthorityConfig,
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            depth: 3,
            root_super_owner: true,
            downstream_super_owner: false,
            seed: 42,
            max_deliveries: 10_000,
            authority: AuthorityConfig::default(),
        }
    }
}

impl ChainConfig {
    /// Chain of `depth` instances with default settings
    pub fn with_depth(depth: usize) -> Self {
        ChainConfig {
            depth,
            ..ChainConfig::default()
        }
    }
}

/// Counters for one pump of the relay queue
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: u64,
    pub applied: u64,
    pub unchanged: u64,
    pub rejected: u64,
}

impl DeliveryReport {
    fn count(&mut self, outcome: &TetherResult<RelayOutcome>) {
        self.delivered += 1;
        match outcome {
            Ok(RelayOutcome::Applied) => self.applied += 1,
            Ok(RelayOutcome::Unchanged) => self.unchanged += 1,
            Err(_) => self.rejected += 1,
        }
    }
}

/// One simulated deployment
#[derive(Debug)]
pub struct ChainInstance {
    pub address: Address,
    pub authority: Authority<Outbox>,
}

/// Linear chain of relayed authority instances
pub struct ChainSimulator {
    config: ChainConfig,
    instances: Vec<ChainInstance>,
    queue: RelayQueue,
    audit: AuditLog,
}

impl ChainSimulator {
    /// Build a chain whose every instance starts owned by `owner`
    pub fn new(config: ChainConfig, owner: Address) -> SimulationResult<Self> {
        if config.depth == 0 {
            return Err(SimulationError::EmptyChain);
        }

        let queue = RelayQueue::new();
        let addresses: Vec<Address> = (0..config.depth)
            .map(|i| instance_address(config.seed, i))
            .collect();

        let mut instances = Vec::with_capacity(config.depth);
        for (i, &address) in addresses.iter().enumerate() {
            let linked = if i == 0 { None } else { Some(addresses[i - 1]) };
            let downstream: Vec<Address> = addresses.get(i + 1).copied().into_iter().collect();
            let super_owner = if i == 0 {
                config.root_super_owner
            } else {
                config.downstream_super_owner
            };

            let authority = Authority::with_config(
                owner,
                linked,
                super_owner,
                queue.outbox(address, downstream),
                config.authority,
            )?;
            instances.push(ChainInstance { address, authority });
        }

        debug!(depth = config.depth, %owner, "chain built");
        Ok(ChainSimulator {
            config,
            instances,
            queue,
            audit: AuditLog::new(),
        })
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn queue(&self) -> &RelayQueue {
        &self.queue
    }

    pub fn address(&self, index: usize) -> SimulationResult<Address> {
        self.instances
            .get(index)
            .map(|i| i.address)
            .ok_or(SimulationError::IndexOutOfRange(index))
    }

    pub fn index_of(&self, address: Address) -> Option<usize> {
        self.instances.iter().position(|i| i.address == address)
    }

    pub fn authority(&self, index: usize) -> SimulationResult<&Authority<Outbox>> {
        self.instances
            .get(index)
            .map(|i| &i.authority)
            .ok_or(SimulationError::IndexOutOfRange(index))
    }

    pub fn authority_mut(&mut self, index: usize) -> SimulationResult<&mut Authority<Outbox>> {
        self.instances
            .get_mut(index)
            .map(|i| &mut i.authority)
            .ok_or(SimulationError::IndexOutOfRange(index))
    }

    pub fn root(&self) -> &Authority<Outbox> {
        &self.instances[0].authority
    }

    pub fn root_mut(&mut self) -> &mut Authority<Outbox> {
        &mut self.instances[0].authority
    }

    /// Owner of every instance, root first
    pub fn owners(&self) -> Vec<Option<Address>> {
        self.instances.iter().map(|i| i.authority.current_owner()).collect()
    }

    /// All instances agree on the owner
    pub fn is_converged(&self) -> bool {
        let owners = self.owners();
        owners.windows(2).all(|w| w[0] == w[1])
    }

    /// Hand one relay message to its target instance
    pub fn deliver(
        &mut self,
        message: RelayMessage,
    ) -> SimulationResult<TetherResult<RelayOutcome>> {
        let index = self
            .index_of(message.to)
            .ok_or(SimulationError::UnknownInstance(message.to))?;
        let authority = &mut self.instances[index].authority;

        let outcome = match message.new_owner {
            Some(new_owner) => authority.relay_transfer(message.from, new_owner),
            None => authority.relay_renounce(message.from),
        };
        trace!(to = %message.to, seq = message.seq, ?outcome, "relay delivered");
        Ok(outcome)
    }

    /// Deliver queued messages in order until the queue is empty.
    /// Hitting `max_deliveries` leaves undelivered messages queued.
    pub fn deliver_all(&mut self) -> SimulationResult<DeliveryReport> {
        let mut report = DeliveryReport::default();

        while !self.queue.is_empty() {
            if report.delivered as usize >= self.config.max_deliveries {
                return Err(self.not_quiescent());
            }
            let Some(message) = self.queue.pop() else {
                break;
            };
            let outcome = self.deliver(message)?;
            report.count(&outcome);
        }

        self.collect_audit();
        Ok(report)
    }

    /// Deliver through a chaos network until both queue and network drain
    pub fn deliver_all_chaotic(
        &mut self,
        network: &mut ChaosRelayNetwork,
    ) -> SimulationResult<DeliveryReport> {
        let mut report = DeliveryReport::default();

        loop {
            for message in self.queue.drain() {
                network.send(message);
            }

            if network.in_flight() == 0 {
                break;
            }
            if report.delivered as usize >= self.config.max_deliveries {
                return Err(self.not_quiescent());
            }
            let Some(message) = network.next_delivery() else {
                break;
            };
            let outcome = self.deliver(message)?;
            report.count(&outcome);
        }

        self.collect_audit();
        Ok(report)
    }

    fn not_quiescent(&mut self) -> SimulationError {
        self.collect_audit();
        SimulationError::NotQuiescent(self.config.max_deliveries)
    }

    /// Run a local operation on one instance, then pump the relay queue
    pub fn apply<T>(
        &mut self,
        index: usize,
        op: impl FnOnce(&mut Authority<Outbox>) -> Result<T, TetherError>,
    ) -> SimulationResult<T> {
        let authority = self.authority_mut(index)?;
        let value = op(authority)?;
        self.deliver_all()?;
        Ok(value)
    }

    /// Move pending events from every instance into the audit log
    pub fn collect_audit(&mut self) -> &AuditLog {
        for instance in &mut self.instances {
            let events = instance.authority.take_events();
            self.audit.extend(instance.address, events);
        }
        &self.audit
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }
}

/// Deterministic address of instance `index` in a chain seeded with `seed`
pub fn instance_address(seed: u64, index: usize) -> Address {
    Address::derive(format!("tether-instance-{seed}-{index}").as_bytes())
}
