//! Chaos relay network
//!
//! Simulates an unreliable cross-domain transport between authority
//! instances:
//! - Loss (with bounded retransmission)
//! - Duplication
//! - Reordering
//!
//! Duplicated notifications exercise the idempotence of relayed
//! transfer / renounce.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tether_core::RelayMessage;
use tracing::trace;

/// Chaos relay configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChaosRelayConfig {
    /// Per-attempt loss rate (0.0 - 1.0)
    pub loss_rate: f64,
    /// Duplicate probability
    pub duplicate_prob: f64,
    /// Reorder probability
    pub reorder_prob: f64,
    /// Reorder depth (max messages to jump over)
    pub reorder_depth: u32,
    /// Retransmissions before a message is given up
    pub max_retries: u32,
}

impl Default for ChaosRelayConfig {
    fn default() -> Self {
        ChaosRelayConfig {
            loss_rate: 0.05,
            duplicate_prob: 0.05,
            reorder_prob: 0.0,
            reorder_depth: 3,
            max_retries: 32,
        }
    }
}

impl ChaosRelayConfig {
    /// Perfect transport
    pub fn reliable() -> Self {
        ChaosRelayConfig {
            loss_rate: 0.0,
            duplicate_prob: 0.0,
            reorder_prob: 0.0,
            reorder_depth: 0,
            max_retries: 0,
        }
    }

    /// Frequent loss and duplication, retried until delivered
    pub fn lossy() -> Self {
        ChaosRelayConfig {
            loss_rate: 0.3,
            duplicate_prob: 0.2,
            reorder_prob: 0.0,
            reorder_depth: 3,
            max_retries: 64,
        }
    }

    /// Heavy loss, duplication and reordering
    pub fn hostile() -> Self {
        ChaosRelayConfig {
            loss_rate: 0.5,
            duplicate_prob: 0.4,
            reorder_prob: 0.3,
            reorder_depth: 5,
            max_retries: 64,
        }
    }
}

#[derive(Clone, Debug)]
struct InFlight {
    message: RelayMessage,
    attempts: u32,
}

/// Chaos relay statistics
#[derive(Clone, Debug, Default)]
pub struct ChaosRelayStats {
    pub messages_sent: u64,
    pub messages_delivered: u64,
    pub messages_lost: u64,
    pub messages_dropped: u64,
    pub messages_duplicated: u64,
    pub messages_reordered: u64,
}

impl ChaosRelayStats {
    /// Fraction of delivery attempts that were lost
    pub fn loss_rate(&self) -> f64 {
        let attempts = self.messages_delivered + self.messages_lost;
        if attempts == 0 {
            0.0
        } else {
            self.messages_lost as f64 / attempts as f64
        }
    }
}

/// Chaos relay network simulator
pub struct ChaosRelayNetwork {
    config: ChaosRelayConfig,
    rng: StdRng,
    in_flight: VecDeque<InFlight>,
    stats: ChaosRelayStats,
}

impl ChaosRelayNetwork {
    /// Create a new chaos relay network with seed
    pub fn new(config: ChaosRelayConfig, seed: u64) -> Self {
        ChaosRelayNetwork {
            config,
            rng: StdRng::seed_from_u64(seed),
            in_flight: VecDeque::new(),
            stats: ChaosRelayStats::default(),
        }
    }

    /// Hand a message to the network
    pub fn send(&mut self, message: RelayMessage) {
        self.stats.messages_sent += 1;
        let entry = InFlight {
            message,
            attempts: 0,
        };

        if self.config.reorder_prob > 0.0
            && !self.in_flight.is_empty()
            && self.rng.gen::<f64>() < self.config.reorder_prob
        {
            let depth = self.config.reorder_depth.min(self.in_flight.len() as u32);
            let jump = self.rng.gen_range(0..=depth) as usize;
            let pos = self.in_flight.len() - jump;
            self.in_flight.insert(pos, entry.clone());
            self.stats.messages_reordered += 1;
        } else {
            self.in_flight.push_back(entry.clone());
        }

        if self.rng.gen::<f64>() < self.config.duplicate_prob {
            self.in_flight.push_back(entry);
            self.stats.messages_duplicated += 1;
        }
    }

    /// Next message that survives the network, or `None` once drained.
    /// Lost messages are re-queued until their retries run out.
    pub fn next_delivery(&mut self) -> Option<RelayMessage> {
        while let Some(mut entry) = self.in_flight.pop_front() {
            if self.rng.gen::<f64>() < self.config.loss_rate {
                self.stats.messages_lost += 1;
                entry.attempts += 1;
                if entry.attempts > self.config.max_retries {
                    trace!(
                        to = %entry.message.to,
                        seq = entry.message.seq,
                        "relay message dropped"
                    );
                    self.stats.messages_dropped += 1;
                } else {
                    self.in_flight.push_back(entry);
                }
                continue;
            }

            self.stats.messages_delivered += 1;
            return Some(entry.message);
        }
        None
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn stats(&self) -> &ChaosRelayStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::Address;

    fn message(seq: u64) -> RelayMessage {
        RelayMessage {
            from: Address::derive(b"from"),
            to: Address::derive(b"to"),
            seq,
            new_owner: None,
        }
    }

    fn drain(network: &mut ChaosRelayNetwork) -> Vec<RelayMessage> {
        std::iter::from_fn(|| network.next_delivery()).collect()
    }

    #[test]
    fn test_reliable_preserves_order() {
        let mut network = ChaosRelayNetwork::new(ChaosRelayConfig::reliable(), 1);
        for seq in 0..50 {
            network.send(message(seq));
        }

        let delivered = drain(&mut network);
        let seqs: Vec<u64> = delivered.iter().map(|m| m.seq).collect();
        assert_eq!(seqs, (0..50).collect::<Vec<_>>());
        assert_eq!(network.stats().messages_lost, 0);
    }

    #[test]
    fn test_lossy_retries_until_delivered() {
        let mut network = ChaosRelayNetwork::new(ChaosRelayConfig::lossy(), 12345);
        for seq in 0..200 {
            network.send(message(seq));
        }

        let delivered = drain(&mut network);
        let stats = network.stats();
        println!("Lossy stats: {:?}", stats);

        assert!(stats.messages_lost > 0);
        assert_eq!(stats.messages_dropped, 0);
        // Every original arrives at least once
        for seq in 0..200 {
            assert!(delivered.iter().any(|m| m.seq == seq));
        }
        assert_eq!(
            delivered.len() as u64,
            stats.messages_sent + stats.messages_duplicated
        );
    }

    #[test]
    fn test_zero_retries_drops() {
        let config = ChaosRelayConfig {
            loss_rate: 1.0,
            max_retries: 0,
            ..ChaosRelayConfig::reliable()
        };
        let mut network = ChaosRelayNetwork::new(config, 7);
        network.send(message(1));

        assert_eq!(network.next_delivery(), None);
        assert_eq!(network.stats().messages_dropped, 1);
        assert_eq!(network.in_flight(), 0);
    }

    #[test]
    fn test_hostile_reorders_and_duplicates() {
        let mut network = ChaosRelayNetwork::new(ChaosRelayConfig::hostile(), 99);
        for seq in 0..500 {
            network.send(message(seq));
        }
        let _ = drain(&mut network);

        let stats = network.stats();
        println!("Hostile stats: {:?}", stats);
        assert!(stats.messages_reordered > 0);
        assert!(stats.messages_duplicated > 0);
        assert!(stats.loss_rate() > 0.2);
    }
}
