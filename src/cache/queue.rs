//! Deduplicating priority queue of pending load requests.
//!
//! Shared between the consumer thread (push, cancel, drain) and the loader
//! pool (blocking pop). One mutex guards the queue state; a condition
//! variable wakes loaders on push and on stop. This pair and the completion
//! history are the only structures touched by multiple threads, and their
//! locks are never nested.

use crate::cache::types::{Generation, Priority, SlotId};
use crate::key::NodeKey;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Condvar, Mutex};

/// A pending load request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub key: NodeKey,
    pub priority: Priority,
    pub slot: SlotId,
    pub generation: Generation,
}

#[derive(Debug, Clone, Copy)]
struct QueuedMeta {
    priority: Priority,
    seq: u64,
    slot: SlotId,
    generation: Generation,
}

#[derive(Default)]
struct QueueInner {
    /// Requests ordered by (priority, insertion sequence); lower pops first
    order: BTreeMap<(Priority, u64), NodeKey>,
    /// At most one entry per key (dedup invariant)
    by_key: HashMap<NodeKey, QueuedMeta>,
    next_seq: u64,
    stopped: bool,
}

/// Thread-safe deduplicating priority queue.
pub struct RequestQueue {
    inner: Mutex<QueueInner>,
    available: Condvar,
}

impl RequestQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            available: Condvar::new(),
        }
    }

    /// Enqueue a request and wake one loader.
    ///
    /// Callers must ensure the key is not already queued (see
    /// [`RequestQueue::update_priority`] for re-registration).
    pub fn push(&self, key: NodeKey, priority: Priority, slot: SlotId, generation: Generation) {
        let mut inner = self.inner.lock().unwrap();
        debug_assert!(!inner.by_key.contains_key(&key), "duplicate queue entry");

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.insert((priority, seq), key);
        inner.by_key.insert(
            key,
            QueuedMeta {
                priority,
                seq,
                slot,
                generation,
            },
        );
        drop(inner);
        self.available.notify_one();
    }

    /// Raise the urgency of a queued request.
    ///
    /// Keeps the more urgent of the old and new priorities and preserves the
    /// original insertion sequence, so equal-priority ordering stays stable.
    /// Returns false if the key is not queued (never pushed, already claimed
    /// by a loader, or drained).
    pub fn update_priority(&self, key: &NodeKey, priority: Priority) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let Some(meta) = inner.by_key.get(key).copied() else {
            return false;
        };
        if priority < meta.priority {
            inner.order.remove(&(meta.priority, meta.seq));
            inner.order.insert((priority, meta.seq), *key);
            inner.by_key.get_mut(key).unwrap().priority = priority;
        }
        true
    }

    /// Pop the most urgent request, blocking until one is available.
    ///
    /// Returns `None` once the queue has been stopped; loaders treat that as
    /// their exit sentinel.
    pub fn pop(&self) -> Option<Request> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if inner.stopped {
                return None;
            }
            if let Some(((priority, _), key)) = inner.order.pop_first() {
                let meta = inner.by_key.remove(&key).unwrap();
                return Some(Request {
                    key,
                    priority,
                    slot: meta.slot,
                    generation: meta.generation,
                });
            }
            inner = self.available.wait(inner).unwrap();
        }
    }

    /// Cancel a request that no loader has claimed yet.
    ///
    /// Returns true if the request was removed; false means it was already
    /// claimed (or never queued) and will run to completion.
    pub fn remove_if_waiting(&self, key: &NodeKey) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.by_key.remove(key) {
            Some(meta) => {
                inner.order.remove(&(meta.priority, meta.seq));
                true
            }
            None => false,
        }
    }

    /// Whether the key has an unclaimed request in the queue.
    pub fn contains(&self, key: &NodeKey) -> bool {
        self.inner.lock().unwrap().by_key.contains_key(key)
    }

    /// Remove and return every unclaimed request.
    pub fn drain(&self) -> Vec<Request> {
        let mut inner = self.inner.lock().unwrap();
        let order = std::mem::take(&mut inner.order);
        let mut by_key = std::mem::take(&mut inner.by_key);
        order
            .into_iter()
            .map(|((priority, _), key)| {
                let meta = by_key.remove(&key).unwrap();
                Request {
                    key,
                    priority,
                    slot: meta.slot,
                    generation: meta.generation,
                }
            })
            .collect()
    }

    /// Number of unclaimed requests.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().by_key.len()
    }

    /// Whether no unclaimed requests remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Set the stop flag and wake every blocked loader.
    pub fn stop(&self) {
        self.inner.lock().unwrap().stopped = true;
        self.available.notify_all();
    }

    /// Whether the queue has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.inner.lock().unwrap().stopped
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn key(item: u64) -> NodeKey {
        NodeKey::new(0, item)
    }

    #[test]
    fn test_pop_orders_by_priority() {
        let queue = RequestQueue::new();
        queue.push(key(1), 5, 0, 0);
        queue.push(key(2), 1, 1, 0);
        queue.push(key(3), 3, 2, 0);

        assert_eq!(queue.pop().unwrap().key, key(2));
        assert_eq!(queue.pop().unwrap().key, key(3));
        assert_eq!(queue.pop().unwrap().key, key(1));
    }

    #[test]
    fn test_equal_priorities_pop_in_insertion_order() {
        let queue = RequestQueue::new();
        for item in [10, 11, 12] {
            queue.push(key(item), 2, 0, 0);
        }

        assert_eq!(queue.pop().unwrap().key, key(10));
        assert_eq!(queue.pop().unwrap().key, key(11));
        assert_eq!(queue.pop().unwrap().key, key(12));
    }

    #[test]
    fn test_update_priority_moves_request_forward() {
        let queue = RequestQueue::new();
        queue.push(key(1), 5, 0, 0);
        queue.push(key(2), 3, 1, 0);

        assert!(queue.update_priority(&key(1), 1));
        assert_eq!(queue.pop().unwrap().key, key(1));
        assert_eq!(queue.pop().unwrap().key, key(2));
    }

    #[test]
    fn test_update_priority_ignores_less_urgent() {
        let queue = RequestQueue::new();
        queue.push(key(1), 1, 0, 0);
        queue.push(key(2), 2, 1, 0);

        assert!(queue.update_priority(&key(1), 9));
        assert_eq!(queue.pop().unwrap().key, key(1));
    }

    #[test]
    fn test_update_priority_unknown_key() {
        let queue = RequestQueue::new();
        assert!(!queue.update_priority(&key(1), 0));
    }

    #[test]
    fn test_dedup_one_entry_per_key() {
        let queue = RequestQueue::new();
        queue.push(key(1), 5, 0, 0);
        assert!(queue.update_priority(&key(1), 2));
        assert_eq!(queue.len(), 1);

        queue.pop().unwrap();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_remove_if_waiting() {
        let queue = RequestQueue::new();
        queue.push(key(1), 0, 0, 0);
        assert!(queue.contains(&key(1)));

        assert!(queue.remove_if_waiting(&key(1)));
        assert!(!queue.contains(&key(1)));
        assert!(queue.is_empty());

        // Already removed: cancellation fails.
        assert!(!queue.remove_if_waiting(&key(1)));
    }

    #[test]
    fn test_remove_fails_after_claim() {
        let queue = RequestQueue::new();
        queue.push(key(1), 0, 0, 0);
        queue.pop().unwrap();

        assert!(!queue.remove_if_waiting(&key(1)));
    }

    #[test]
    fn test_drain_empties_queue() {
        let queue = RequestQueue::new();
        queue.push(key(1), 2, 0, 7);
        queue.push(key(2), 1, 1, 7);

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].key, key(2)); // priority order
        assert_eq!(drained[0].generation, 7);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_stop_unblocks_poppers() {
        let queue = Arc::new(RequestQueue::new());
        let popper = {
            let queue = queue.clone();
            std::thread::spawn(move || queue.pop())
        };

        std::thread::sleep(Duration::from_millis(50));
        queue.stop();

        assert_eq!(popper.join().unwrap(), None);
        assert!(queue.is_stopped());
    }

    #[test]
    fn test_push_wakes_blocked_popper() {
        let queue = Arc::new(RequestQueue::new());
        let popper = {
            let queue = queue.clone();
            std::thread::spawn(move || queue.pop())
        };

        std::thread::sleep(Duration::from_millis(50));
        queue.push(key(42), 0, 3, 1);

        let request = popper.join().unwrap().unwrap();
        assert_eq!(request.key, key(42));
        assert_eq!(request.slot, 3);
        assert_eq!(request.generation, 1);
    }

    #[test]
    fn test_pop_after_stop_returns_none_even_with_requests() {
        let queue = RequestQueue::new();
        queue.push(key(1), 0, 0, 0);
        queue.stop();

        assert_eq!(queue.pop(), None);
    }
}
