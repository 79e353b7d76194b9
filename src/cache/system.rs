//! Streaming cache facade.
//!
//! Composes the slot pool, cache index, request queue, loader pool and
//! completion history into the public entry point the consumer (render loop,
//! cut-update scheduler) drives. The cache is an explicitly constructed
//! instance owned by the application; several independent caches can coexist.
//!
//! The consumer contract: call [`StreamingCache::refresh`] once per work
//! cycle, read [`StreamingCache::data`] only after residency is confirmed,
//! and call [`StreamingCache::reset`] on global invalidation events.

use crate::cache::history::{CompletionHistory, LoadOutcome};
use crate::cache::index::CacheIndex;
use crate::cache::queue::RequestQueue;
use crate::cache::slots::{SlotData, SlotPool};
use crate::cache::stats::CacheStats;
use crate::cache::types::{CacheConfig, CacheError, EntryState, Generation, Priority};
use crate::cache::workers::LoaderPool;
use crate::config::format_size;
use crate::key::NodeKey;
use crate::store::BackingStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Out-of-core streaming cache.
///
/// Registration, refresh and reset must happen on a single consumer thread;
/// the `&mut self` receivers make that a compile-time property. Loader
/// threads feed results back exclusively through the completion history.
pub struct StreamingCache {
    config: CacheConfig,
    index: CacheIndex,
    slots: Arc<SlotPool>,
    queue: Arc<RequestQueue>,
    history: Arc<CompletionHistory>,
    loaders: LoaderPool,
    generation: Generation,
    stats: CacheStats,
}

impl StreamingCache {
    /// Build a cache and start its loader pool.
    ///
    /// The memory budget is translated into a slot count given the
    /// configured slot size; construction fails on an inconsistent
    /// configuration.
    pub fn new(config: CacheConfig, store: Arc<dyn BackingStore>) -> Result<Self, CacheError> {
        config.validate()?;

        let slot_count = config.slot_count();
        let slots = Arc::new(SlotPool::new(slot_count, config.slot_bytes()));
        let queue = Arc::new(RequestQueue::new());
        let history = Arc::new(CompletionHistory::new());
        let loaders = LoaderPool::start(
            config.loader_threads,
            queue.clone(),
            history.clone(),
            slots.clone(),
            store,
        );

        info!(
            "Streaming cache ready: {} slots x {} ({} total, {} loader threads)",
            slot_count,
            format_size(config.slot_bytes()),
            format_size(slots.total_bytes()),
            config.loader_threads
        );

        Ok(Self {
            index: CacheIndex::new(slot_count),
            config,
            slots,
            queue,
            history,
            loaders,
            generation: 0,
            stats: CacheStats::new(),
        })
    }

    /// Register interest in a key at the given urgency.
    ///
    /// Idempotent: a resident key is touched and left alone; a queued key
    /// has its priority raised to the more urgent of old and new; a key
    /// already claimed by a loader is left to finish. Otherwise a slot is
    /// reserved (evicting the least useful resident if needed) and a load
    /// request is queued.
    ///
    /// # Errors
    ///
    /// [`CacheError::OutOfSlots`] when every slot is pinned or mid-load.
    /// This is transient backpressure; retry after a later
    /// [`StreamingCache::refresh`] cycle has freed capacity.
    pub fn register(&mut self, key: NodeKey, priority: Priority) -> Result<(), CacheError> {
        self.stats.record_registration();

        if self.index.is_resident(&key) {
            self.stats.record_already_resident();
            self.index.touch(&key);
            return Ok(());
        }

        match self.index.state_of(&key) {
            Some(EntryState::Waiting) => {
                if self.queue.update_priority(&key, priority) {
                    self.index.update_priority(&key, priority);
                    self.stats.record_priority_update();
                } else {
                    // A loader claimed it since it was queued.
                    self.index.mark_loading(&key);
                }
                Ok(())
            }
            Some(EntryState::Loading) => Ok(()),
            Some(EntryState::Failed) | None => self.admit(key, priority),
            Some(EntryState::Resident) => unreachable!("handled above"),
        }
    }

    /// Reserve a slot and queue a load for an unindexed (or failed) key.
    fn admit(&mut self, key: NodeKey, priority: Priority) -> Result<(), CacheError> {
        let had_free = self.index.free_slot_count() > 0;
        let Some(slot) = self.index.reserve_slot() else {
            self.stats.record_out_of_slots();
            debug!("Out of slots registering {}", key);
            return Err(CacheError::OutOfSlots {
                total: self.index.slot_count(),
            });
        };
        if !had_free {
            self.stats.record_eviction();
        }

        self.index.insert_waiting(key, slot, priority, self.generation);
        self.queue.push(key, priority, slot, self.generation);
        Ok(())
    }

    /// Borrow a resident key's bytes.
    ///
    /// Returns `None` unless the key is resident. The guard borrows the
    /// cache, so no mutation (and hence no eviction) can happen while it is
    /// held; for stability across work cycles use [`StreamingCache::pin`].
    pub fn data(&self, key: &NodeKey) -> Option<SlotData<'_>> {
        let slot = self.index.slot_of(key)?;
        Some(self.slots.read(slot))
    }

    /// Pin a resident key, exempting it from eviction until unpinned.
    ///
    /// Returns false if the key is not resident. Pins nest.
    pub fn pin(&mut self, key: &NodeKey) -> bool {
        self.index.pin(key)
    }

    /// Release one pin on a key.
    pub fn unpin(&mut self, key: &NodeKey) {
        self.index.unpin(key);
    }

    /// Apply finished background loads to the index.
    ///
    /// The single point where loader results become visible: successful
    /// current-generation loads turn resident, failures release their slot
    /// and mark the entry failed, and stale-generation results are dropped
    /// with their slot returned to the pool.
    pub fn refresh(&mut self) {
        for completion in self.history.drain() {
            if completion.generation != self.generation {
                // Reset quarantined this slot; it is free again now.
                self.index.release_slot(completion.slot);
                self.stats.record_stale_drop();
                debug!(
                    "Dropped stale load of {} (generation {} < {})",
                    completion.key, completion.generation, self.generation
                );
                continue;
            }

            match completion.outcome {
                LoadOutcome::Loaded { bytes } => {
                    if self.index.mark_resident(&completion.key) {
                        self.stats.record_load_completed(bytes);
                    } else {
                        self.index.release_slot(completion.slot);
                    }
                }
                LoadOutcome::Failed(error) => {
                    warn!("Load of {} failed: {}", completion.key, error);
                    self.stats.record_load_failed();
                    if self.index.mark_failed(&completion.key).is_none() {
                        self.index.release_slot(completion.slot);
                    }
                }
            }
        }
    }

    /// Invalidate all pending work.
    ///
    /// Bumps the generation, cancels every unclaimed request (their slots
    /// are freed immediately) and drops claimed entries from the index.
    /// Slots of claimed loads stay quarantined until their now-stale
    /// completion drains through [`StreamingCache::refresh`], so an
    /// in-flight write can never land in a re-assigned slot. Resident
    /// entries survive a reset.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.stats.record_reset();

        let mut cancelled = 0usize;
        for request in self.queue.drain() {
            if self.index.remove(&request.key).is_some() {
                self.index.release_slot(request.slot);
                cancelled += 1;
            }
        }

        let claimed = self.index.take_pending();
        debug!(
            "Reset to generation {}: {} requests cancelled, {} in-flight loads abandoned",
            self.generation,
            cancelled,
            claimed.len()
        );
    }

    /// Stop and join the loader pool.
    ///
    /// Idempotent; runs automatically on drop. The slot pool outlives the
    /// loaders, so no loader can observe freed storage.
    pub fn shutdown(&mut self) {
        self.loaders.stop();
    }

    /// Whether the key's data is resident and readable.
    pub fn is_resident(&self, key: &NodeKey) -> bool {
        self.index.is_resident(key)
    }

    /// Lifecycle state of a key, or `None` when the cache has never admitted
    /// it (or has since evicted it).
    pub fn state_of(&self, key: &NodeKey) -> Option<EntryState> {
        self.index.state_of(key)
    }

    /// Current generation.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Total number of slots.
    pub fn slot_count(&self) -> usize {
        self.index.slot_count()
    }

    /// Number of resident entries.
    pub fn resident_count(&self) -> usize {
        self.index.resident_count()
    }

    /// Number of entries waiting for or undergoing a load.
    pub fn pending_count(&self) -> usize {
        self.index.pending_count()
    }

    /// Number of unclaimed requests in the queue.
    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    /// Statistics snapshot.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// The configuration this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl Drop for StreamingCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}
