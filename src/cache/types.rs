//! Core types for the streaming cache.

use crate::config::format_size;
use thiserror::Error;

/// Integer id addressing one fixed-size buffer in the slot pool.
pub type SlotId = usize;

/// Epoch counter invalidating in-flight work after a reset.
pub type Generation = u64;

/// Load urgency. Lower numeric values are more urgent.
///
/// Priorities come from the consumer's visibility/LOD computation; the cache
/// only requires a total order. Ties are served in insertion order.
pub type Priority = i32;

/// Lifecycle state of an indexed entry.
///
/// Entries move `Waiting -> Loading -> Resident`, with `Failed` as a side
/// exit when a fetch errors. Keys absent from the index are unindexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Queued for loading, not yet claimed by a loader thread
    Waiting,
    /// Claimed by a loader thread; fetch in progress
    Loading,
    /// Data occupies a slot and is valid for reading
    Resident,
    /// Last fetch failed; the slot has been released
    Failed,
}

/// Cache-level errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Every slot is resident-and-pinned or mid-load; retry after the next
    /// refresh/eviction cycle
    #[error("All {total} cache slots are in use or pinned")]
    OutOfSlots { total: usize },

    /// A fetched payload does not fit the fixed slot size
    #[error("Payload of {len} bytes exceeds slot capacity of {capacity} bytes")]
    ItemTooLarge { len: usize, capacity: usize },

    /// Invalid cache configuration
    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),
}

/// Streaming cache configuration.
///
/// The pool capacity is expressed as a memory budget and translated to a
/// slot count given the fixed per-slot byte size (`item_bytes` x
/// `items_per_node`).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Size of one item (surfel, vertex, texel block) in bytes
    pub item_bytes: usize,
    /// Items per hierarchy node; slot size = item_bytes * items_per_node
    pub items_per_node: usize,
    /// Memory budget for the slot pool in bytes (default: 256 MB)
    pub memory_budget_bytes: usize,
    /// Number of background loader threads (default: 4)
    pub loader_threads: usize,
}

/// Default slot-pool memory budget: 256 MB.
pub const DEFAULT_MEMORY_BUDGET: usize = 256 * 1024 * 1024;

/// Default loader thread count.
pub const DEFAULT_LOADER_THREADS: usize = 4;

impl CacheConfig {
    /// Create a configuration for nodes of `node_bytes` total size.
    pub fn new(node_bytes: usize) -> Self {
        Self {
            item_bytes: node_bytes,
            items_per_node: 1,
            memory_budget_bytes: DEFAULT_MEMORY_BUDGET,
            loader_threads: DEFAULT_LOADER_THREADS,
        }
    }

    /// Set the per-item size and item count making up one node.
    pub fn with_item_layout(mut self, item_bytes: usize, items_per_node: usize) -> Self {
        self.item_bytes = item_bytes;
        self.items_per_node = items_per_node;
        self
    }

    /// Set the slot pool memory budget in bytes.
    pub fn with_memory_budget(mut self, bytes: usize) -> Self {
        self.memory_budget_bytes = bytes;
        self
    }

    /// Set the number of loader threads.
    pub fn with_loader_threads(mut self, threads: usize) -> Self {
        self.loader_threads = threads;
        self
    }

    /// Bytes per slot.
    pub fn slot_bytes(&self) -> usize {
        self.item_bytes * self.items_per_node
    }

    /// Number of slots the memory budget affords.
    pub fn slot_count(&self) -> usize {
        let slot = self.slot_bytes();
        if slot == 0 {
            0
        } else {
            self.memory_budget_bytes / slot
        }
    }

    /// Check the configuration for inconsistencies.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.slot_bytes() == 0 {
            return Err(CacheError::InvalidConfig(
                "slot size must be non-zero (item_bytes * items_per_node)".into(),
            ));
        }
        if self.slot_count() == 0 {
            return Err(CacheError::InvalidConfig(format!(
                "memory budget of {} holds no slot of {}",
                format_size(self.memory_budget_bytes),
                format_size(self.slot_bytes()),
            )));
        }
        if self.loader_threads == 0 {
            return Err(CacheError::InvalidConfig(
                "at least one loader thread is required".into(),
            ));
        }
        Ok(())
    }
}
