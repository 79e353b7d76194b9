//! Cache index: key-to-slot association and admission/eviction policy.
//!
//! The index maps logical keys to slot ids and lifecycle states. It is
//! mutated exclusively on the consumer thread (every mutator takes
//! `&mut self`), which is what lets the whole structure live without a lock:
//! loader threads never see it, they only append to the completion history.

use crate::cache::types::{EntryState, Generation, Priority, SlotId};
use crate::key::NodeKey;
use std::cmp::Reverse;
use std::collections::HashMap;
use tracing::debug;

/// Bookkeeping for one indexed key.
#[derive(Debug)]
struct IndexEntry {
    state: EntryState,
    /// Owned slot; `None` only in the `Failed` state
    slot: Option<SlotId>,
    priority: Priority,
    generation: Generation,
    /// Pin count; pinned entries are exempt from eviction
    pins: u32,
    /// Logical clock value of the last touch, for recency tiebreaks
    last_touch: u64,
}

/// Maps keys to slots and owns the admission/eviction policy.
///
/// Invariants maintained here:
/// - every `Waiting`/`Loading`/`Resident` entry owns exactly one slot id,
///   and no two entries share one;
/// - the number of slot-holding entries never exceeds the pool size.
pub struct CacheIndex {
    entries: HashMap<NodeKey, IndexEntry>,
    free_slots: Vec<SlotId>,
    slot_count: usize,
    touch_clock: u64,
}

impl CacheIndex {
    /// Create an index over a pool of `slot_count` slots, all initially free.
    pub fn new(slot_count: usize) -> Self {
        Self {
            entries: HashMap::new(),
            free_slots: (0..slot_count).rev().collect(),
            slot_count,
            touch_clock: 0,
        }
    }

    fn next_touch(&mut self) -> u64 {
        self.touch_clock += 1;
        self.touch_clock
    }

    /// Reserve a slot for a new entry.
    ///
    /// Takes a free slot if one remains; otherwise evicts the lowest-priority
    /// unpinned resident entry, breaking priority ties by least-recently-
    /// touched. Returns `None` when nothing is evictable (backpressure).
    pub fn reserve_slot(&mut self) -> Option<SlotId> {
        if let Some(slot) = self.free_slots.pop() {
            return Some(slot);
        }

        // Lowest priority = largest numeric value; among equals, the entry
        // touched longest ago loses.
        let victim = self
            .entries
            .iter()
            .filter(|(_, e)| e.state == EntryState::Resident && e.pins == 0)
            .max_by_key(|(_, e)| (e.priority, Reverse(e.last_touch)))
            .map(|(key, _)| *key)?;

        let entry = self.entries.remove(&victim).unwrap();
        let slot = entry.slot.expect("resident entry without slot");
        debug!(
            "Evicted {} (priority {}) from slot {}",
            victim, entry.priority, slot
        );
        Some(slot)
    }

    /// Return a slot to the free list.
    pub fn release_slot(&mut self, slot: SlotId) {
        debug_assert!(!self.free_slots.contains(&slot), "double slot release");
        self.free_slots.push(slot);
    }

    /// Index `key` as waiting in `slot`.
    pub fn insert_waiting(
        &mut self,
        key: NodeKey,
        slot: SlotId,
        priority: Priority,
        generation: Generation,
    ) {
        let last_touch = self.next_touch();
        self.entries.insert(
            key,
            IndexEntry {
                state: EntryState::Waiting,
                slot: Some(slot),
                priority,
                generation,
                pins: 0,
                last_touch,
            },
        );
    }

    /// Record that a loader thread has claimed the key's request.
    pub fn mark_loading(&mut self, key: &NodeKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            if entry.state == EntryState::Waiting {
                entry.state = EntryState::Loading;
            }
        }
    }

    /// Transition a pending entry to resident. Returns false if the key is
    /// not indexed as waiting/loading.
    pub fn mark_resident(&mut self, key: &NodeKey) -> bool {
        let touch = self.next_touch();
        match self.entries.get_mut(key) {
            Some(entry)
                if entry.state == EntryState::Waiting || entry.state == EntryState::Loading =>
            {
                entry.state = EntryState::Resident;
                entry.last_touch = touch;
                true
            }
            _ => false,
        }
    }

    /// Transition an entry to failed, releasing its slot.
    ///
    /// Returns the released slot id, if the key held one.
    pub fn mark_failed(&mut self, key: &NodeKey) -> Option<SlotId> {
        let entry = self.entries.get_mut(key)?;
        let slot = entry.slot.take();
        entry.state = EntryState::Failed;
        entry.pins = 0;
        if let Some(slot) = slot {
            self.release_slot(slot);
        }
        slot
    }

    /// Remove a key from the index entirely, returning its slot if it held
    /// one. The slot is NOT released; the caller decides its fate.
    pub fn remove(&mut self, key: &NodeKey) -> Option<SlotId> {
        self.entries.remove(key).and_then(|e| e.slot)
    }

    /// Remove and return all waiting/loading entries with their slots.
    ///
    /// Used by the reset path. Slots are not released here.
    pub fn take_pending(&mut self) -> Vec<(NodeKey, SlotId, EntryState)> {
        let pending: Vec<NodeKey> = self
            .entries
            .iter()
            .filter(|(_, e)| {
                matches!(e.state, EntryState::Waiting | EntryState::Loading)
            })
            .map(|(k, _)| *k)
            .collect();

        pending
            .into_iter()
            .map(|key| {
                let entry = self.entries.remove(&key).unwrap();
                let slot = entry.slot.expect("pending entry without slot");
                (key, slot, entry.state)
            })
            .collect()
    }

    /// Whether the key's data currently occupies a slot and is readable.
    pub fn is_resident(&self, key: &NodeKey) -> bool {
        self.state_of(key) == Some(EntryState::Resident)
    }

    /// The key's slot id, if it is resident.
    pub fn slot_of(&self, key: &NodeKey) -> Option<SlotId> {
        self.entries
            .get(key)
            .filter(|e| e.state == EntryState::Resident)
            .and_then(|e| e.slot)
    }

    /// Lifecycle state of a key, or `None` when unindexed.
    pub fn state_of(&self, key: &NodeKey) -> Option<EntryState> {
        self.entries.get(key).map(|e| e.state)
    }

    /// Generation the key's entry was created in.
    pub fn generation_of(&self, key: &NodeKey) -> Option<Generation> {
        self.entries.get(key).map(|e| e.generation)
    }

    /// Refresh the key's recency stamp.
    pub fn touch(&mut self, key: &NodeKey) {
        let touch = self.next_touch();
        if let Some(entry) = self.entries.get_mut(key) {
            entry.last_touch = touch;
        }
    }

    /// Record a more urgent priority for the key (keeps the more urgent of
    /// old and new).
    pub fn update_priority(&mut self, key: &NodeKey, priority: Priority) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.priority = entry.priority.min(priority);
        }
    }

    /// Pin a resident key, exempting it from eviction. Returns false if the
    /// key is not resident.
    pub fn pin(&mut self, key: &NodeKey) -> bool {
        let touch = self.next_touch();
        match self.entries.get_mut(key) {
            Some(entry) if entry.state == EntryState::Resident => {
                entry.pins += 1;
                entry.last_touch = touch;
                true
            }
            _ => false,
        }
    }

    /// Release one pin on a key.
    pub fn unpin(&mut self, key: &NodeKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.pins = entry.pins.saturating_sub(1);
        }
    }

    /// Number of resident entries.
    pub fn resident_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.state == EntryState::Resident)
            .count()
    }

    /// Number of waiting/loading entries.
    pub fn pending_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| matches!(e.state, EntryState::Waiting | EntryState::Loading))
            .count()
    }

    /// Number of slots on the free list.
    pub fn free_slot_count(&self) -> usize {
        self.free_slots.len()
    }

    /// Total slots this index manages.
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }
}
