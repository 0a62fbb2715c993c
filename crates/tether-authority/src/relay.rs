//! Relay hook - outbound ownership notifications
//!
//! An authority calls its relay hook exactly once per committed ownership
//! change, inside the same operation. A failing hook aborts the change.
//! Delivery, ordering and retry belong to whatever sits behind the hook.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tether_core::{Address, RelayError, RelayMessage};

/// Extension point invoked on every ownership change
pub trait RelayHook {
    /// Tell the remote side of the chain that the owner is now `new_owner`
    /// (`None` = renounced).
    fn notify_remote_authority(&mut self, new_owner: Option<Address>) -> Result<(), RelayError>;
}

/// No relay configured. Ownership changes stay local.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoRelay;

impl RelayHook for NoRelay {
    #[inline]
    fn notify_remote_authority(&mut self, _new_owner: Option<Address>) -> Result<(), RelayError> {
        Ok(())
    }
}

impl<R: RelayHook + ?Sized> RelayHook for &mut R {
    fn notify_remote_authority(&mut self, new_owner: Option<Address>) -> Result<(), RelayError> {
        (**self).notify_remote_authority(new_owner)
    }
}

impl<R: RelayHook + ?Sized> RelayHook for Box<R> {
    fn notify_remote_authority(&mut self, new_owner: Option<Address>) -> Result<(), RelayError> {
        (**self).notify_remote_authority(new_owner)
    }
}

#[derive(Debug, Default)]
struct QueueInner {
    messages: VecDeque<RelayMessage>,
    closed: bool,
    sent: u64,
}

/// Shared in-memory queue of relay messages
///
/// Cloning yields another handle to the same queue.
#[derive(Clone, Debug, Default)]
pub struct RelayQueue {
    inner: Arc<Mutex<QueueInner>>,
}

impl RelayQueue {
    pub fn new() -> Self {
        RelayQueue::default()
    }

    /// Create a relay hook that sends from `source` to each of `targets`
    pub fn outbox(&self, source: Address, targets: Vec<Address>) -> Outbox {
        Outbox {
            source,
            targets,
            next_seq: 0,
            queue: self.clone(),
        }
    }

    /// Take the oldest pending message
    pub fn pop(&self) -> Option<RelayMessage> {
        self.inner.lock().messages.pop_front()
    }

    /// Take every pending message in send order
    pub fn drain(&self) -> Vec<RelayMessage> {
        self.inner.lock().messages.drain(..).collect()
    }

    /// Pending messages without removing them
    pub fn pending(&self) -> Vec<RelayMessage> {
        self.inner.lock().messages.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().messages.is_empty()
    }

    /// Total messages ever accepted
    pub fn sent(&self) -> u64 {
        self.inner.lock().sent
    }

    /// Refuse further messages; outboxes report `RelayError::Closed`
    pub fn close(&self) {
        self.inner.lock().closed = true;
    }

    pub fn reopen(&self) {
        self.inner.lock().closed = false;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

/// Relay hook writing one message per target into a [`RelayQueue`]
#[derive(Clone, Debug)]
pub struct Outbox {
    source: Address,
    targets: Vec<Address>,
    next_seq: u64,
    queue: RelayQueue,
}

impl Outbox {
    pub fn source(&self) -> Address {
        self.source
    }

    pub fn targets(&self) -> &[Address] {
        &self.targets
    }

    pub fn queue(&self) -> &RelayQueue {
        &self.queue
    }
}

impl RelayHook for Outbox {
    fn notify_remote_authority(&mut self, new_owner: Option<Address>) -> Result<(), RelayError> {
        let mut inner = self.queue.inner.lock();
        if inner.closed {
            return Err(RelayError::Closed);
        }

        self.next_seq += 1;
        for &to in &self.targets {
            inner.messages.push_back(RelayMessage {
                from: self.source,
                to,
                seq: self.next_seq,
                new_owner,
            });
            inner.sent += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_relay_always_succeeds() {
        let mut relay = NoRelay;
        assert!(relay.notify_remote_authority(None).is_ok());
        assert!(relay
            .notify_remote_authority(Some(Address::derive(b"a")))
            .is_ok());
    }

    #[test]
    fn test_outbox_fans_out_to_targets() {
        let queue = RelayQueue::new();
        let src = Address::derive(b"src");
        let t1 = Address::derive(b"t1");
        let t2 = Address::derive(b"t2");
        let owner = Address::derive(b"owner");

        let mut outbox = queue.outbox(src, vec![t1, t2]);
        outbox.notify_remote_authority(Some(owner)).unwrap();

        let msgs = queue.drain();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].to, t1);
        assert_eq!(msgs[1].to, t2);
        assert!(msgs.iter().all(|m| m.from == src && m.seq == 1));
        assert!(msgs.iter().all(|m| m.new_owner == Some(owner)));
        assert_eq!(queue.sent(), 2);
    }

    #[test]
    fn test_outbox_without_targets_is_silent() {
        let queue = RelayQueue::new();
        let mut outbox = queue.outbox(Address::derive(b"leaf"), Vec::new());
        outbox.notify_remote_authority(None).unwrap();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_closed_queue_rejects() {
        let queue = RelayQueue::new();
        let mut outbox = queue.outbox(Address::derive(b"src"), vec![Address::derive(b"t")]);

        queue.close();
        assert_eq!(outbox.notify_remote_authority(None), Err(RelayError::Closed));
        assert!(queue.is_empty());

        queue.reopen();
        assert!(outbox.notify_remote_authority(None).is_ok());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_shared_handles_see_same_queue() {
        let queue = RelayQueue::new();
        let handle = queue.clone();
        let mut a = queue.outbox(Address::derive(b"a"), vec![Address::derive(b"x")]);
        let mut b = handle.outbox(Address::derive(b"b"), vec![Address::derive(b"y")]);

        a.notify_remote_authority(None).unwrap();
        b.notify_remote_authority(None).unwrap();

        assert_eq!(queue.len(), 2);
        assert_eq!(handle.pop().map(|m| m.from), Some(Address::derive(b"a")));
    }
}
