//! Fixed-size slot pool.
//!
//! The pool owns all cache storage: a fixed number of equally sized buffers
//! allocated once at construction and never resized. Components refer to
//! slots only by integer id; the buffers themselves never change hands.
//!
//! Each slot carries its own lock. Exclusive slot ownership is enforced by
//! the cache index (one entry per slot id), so a slot's writer is always a
//! single loader thread and readers only appear after the slot has become
//! resident. The per-slot lock turns any violation of that protocol into
//! blocking rather than a data race.

use crate::cache::types::{CacheError, SlotId};
use crate::config::format_size;
use std::ops::Deref;
use std::sync::{RwLock, RwLockReadGuard};
use tracing::debug;

/// One fixed-capacity buffer plus the number of bytes last written into it.
struct SlotBuf {
    bytes: Box<[u8]>,
    len: usize,
}

/// Pool of fixed-size memory slots addressed by [`SlotId`].
pub struct SlotPool {
    slots: Vec<RwLock<SlotBuf>>,
    slot_bytes: usize,
}

impl SlotPool {
    /// Allocate a pool of `slot_count` slots of `slot_bytes` each.
    pub fn new(slot_count: usize, slot_bytes: usize) -> Self {
        let slots = (0..slot_count)
            .map(|_| {
                RwLock::new(SlotBuf {
                    bytes: vec![0u8; slot_bytes].into_boxed_slice(),
                    len: 0,
                })
            })
            .collect();

        debug!(
            "Slot pool allocated: {} slots x {}",
            slot_count,
            format_size(slot_bytes)
        );

        Self { slots, slot_bytes }
    }

    /// Number of slots in the pool.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Capacity of a single slot in bytes.
    pub fn slot_bytes(&self) -> usize {
        self.slot_bytes
    }

    /// Total pool size in bytes.
    pub fn total_bytes(&self) -> usize {
        self.slots.len() * self.slot_bytes
    }

    /// Copy `data` into a slot.
    ///
    /// Called by loader threads, each on a slot exclusively reserved for its
    /// request. Fails if the payload exceeds the slot capacity.
    pub fn write(&self, slot: SlotId, data: &[u8]) -> Result<(), CacheError> {
        if data.len() > self.slot_bytes {
            return Err(CacheError::ItemTooLarge {
                len: data.len(),
                capacity: self.slot_bytes,
            });
        }
        let mut buf = self.slots[slot].write().unwrap();
        buf.bytes[..data.len()].copy_from_slice(data);
        buf.len = data.len();
        Ok(())
    }

    /// Borrow a slot's filled bytes for reading.
    ///
    /// The guard keeps the slot readable for its lifetime. Callers must only
    /// read slots whose entry is resident; the index guarantees no loader is
    /// writing to such a slot.
    pub fn read(&self, slot: SlotId) -> SlotData<'_> {
        SlotData {
            guard: self.slots[slot].read().unwrap(),
        }
    }
}

/// Read guard over a slot's filled bytes.
///
/// Derefs to `[u8]` containing exactly the bytes the last load wrote.
pub struct SlotData<'a> {
    guard: RwLockReadGuard<'a, SlotBuf>,
}

impl Deref for SlotData<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.guard.bytes[..self.guard.len]
    }
}
