//! Background loader pool.
//!
//! A fixed set of threads pulls the most urgent request from the queue,
//! performs the blocking backing-store fetch, writes the payload into the
//! request's slot and appends the result to the completion history. Loaders
//! never touch the cache index.
//!
//! Parallelism comes from running several blocking fetches at once; there is
//! no async scheduling anywhere in this pool.

use crate::cache::history::{Completion, CompletionHistory, LoadOutcome};
use crate::cache::queue::{Request, RequestQueue};
use crate::cache::slots::SlotPool;
use crate::cache::types::CacheError;
use crate::store::{BackingStore, FetchError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Pool of N blocking loader threads.
///
/// Stopping the pool signals the request queue and joins every thread, so
/// by the time [`LoaderPool::stop`] returns no loader can touch the slot
/// pool again. Dropping the pool stops it on any exit path.
pub struct LoaderPool {
    handles: Vec<JoinHandle<()>>,
    queue: Arc<RequestQueue>,
}

impl LoaderPool {
    /// Spawn `thread_count` loader threads.
    pub fn start(
        thread_count: usize,
        queue: Arc<RequestQueue>,
        history: Arc<CompletionHistory>,
        slots: Arc<SlotPool>,
        store: Arc<dyn BackingStore>,
    ) -> Self {
        let handles = (0..thread_count)
            .map(|i| {
                let queue = queue.clone();
                let history = history.clone();
                let slots = slots.clone();
                let store = store.clone();
                thread::Builder::new()
                    .name(format!("loader-{}", i))
                    .spawn(move || {
                        Self::run_loop(queue, history, slots, store);
                    })
                    .expect("Failed to spawn loader thread")
            })
            .collect();

        info!("Loader pool started ({} threads)", thread_count);

        Self { handles, queue }
    }

    /// The loader thread loop: pop, fetch, deposit, repeat until stopped.
    fn run_loop(
        queue: Arc<RequestQueue>,
        history: Arc<CompletionHistory>,
        slots: Arc<SlotPool>,
        store: Arc<dyn BackingStore>,
    ) {
        while let Some(request) = queue.pop() {
            let outcome = Self::load(&request, &slots, &store);
            history.push(Completion {
                key: request.key,
                slot: request.slot,
                generation: request.generation,
                outcome,
            });
        }
        debug!("Loader thread exiting");
    }

    /// Fetch one request's payload into its slot.
    fn load(request: &Request, slots: &SlotPool, store: &Arc<dyn BackingStore>) -> LoadOutcome {
        let data = match store.fetch(&request.key) {
            Ok(data) => data,
            Err(error) => {
                warn!("Fetch failed for {}: {}", request.key, error);
                return LoadOutcome::Failed(error);
            }
        };

        match slots.write(request.slot, &data) {
            Ok(()) => LoadOutcome::Loaded { bytes: data.len() },
            Err(CacheError::ItemTooLarge { len, capacity }) => {
                warn!(
                    "Payload for {} does not fit its slot ({} > {})",
                    request.key, len, capacity
                );
                LoadOutcome::Failed(FetchError::Corrupt {
                    key: request.key,
                    reason: format!("payload of {} bytes exceeds slot size {}", len, capacity),
                })
            }
            Err(error) => LoadOutcome::Failed(FetchError::Corrupt {
                key: request.key,
                reason: error.to_string(),
            }),
        }
    }

    /// Number of loader threads.
    pub fn thread_count(&self) -> usize {
        self.handles.len()
    }

    /// Signal the queue and join every loader thread.
    ///
    /// Idempotent; in-flight fetches run to completion first.
    pub fn stop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        self.queue.stop();
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.join() {
                warn!("Loader thread panicked: {:?}", e);
            }
        }
        info!("Loader pool stopped");
    }
}

impl Drop for LoaderPool {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::NodeKey;
    use crate::store::MemoryStore;
    use std::time::{Duration, Instant};

    fn harness(
        slot_count: usize,
        slot_bytes: usize,
        store: Arc<dyn BackingStore>,
        threads: usize,
    ) -> (
        LoaderPool,
        Arc<RequestQueue>,
        Arc<CompletionHistory>,
        Arc<SlotPool>,
    ) {
        let queue = Arc::new(RequestQueue::new());
        let history = Arc::new(CompletionHistory::new());
        let slots = Arc::new(SlotPool::new(slot_count, slot_bytes));
        let pool = LoaderPool::start(
            threads,
            queue.clone(),
            history.clone(),
            slots.clone(),
            store,
        );
        (pool, queue, history, slots)
    }

    fn wait_for_completions(history: &CompletionHistory, count: usize) -> Vec<Completion> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut all = Vec::new();
        while all.len() < count {
            assert!(Instant::now() < deadline, "timed out waiting for loads");
            all.extend(history.drain());
            thread::sleep(Duration::from_millis(5));
        }
        all
    }

    #[test]
    fn test_loader_completes_request() {
        let store = Arc::new(MemoryStore::new(8));
        let key = NodeKey::new(0, 1);
        store.insert(key, vec![1, 2, 3]);

        let (mut pool, queue, history, slots) = harness(2, 8, store, 1);
        queue.push(key, 0, 1, 0);

        let completions = wait_for_completions(&history, 1);
        assert_eq!(completions[0].key, key);
        assert_eq!(completions[0].slot, 1);
        assert!(matches!(
            completions[0].outcome,
            LoadOutcome::Loaded { bytes: 3 }
        ));
        assert_eq!(&slots.read(1)[..], &[1, 2, 3]);

        pool.stop();
    }

    #[test]
    fn test_loader_reports_oversized_payload() {
        let store = Arc::new(MemoryStore::new(64));
        let (mut pool, queue, history, _slots) = harness(1, 16, store, 1);

        queue.push(NodeKey::new(0, 1), 0, 0, 0);

        let completions = wait_for_completions(&history, 1);
        assert!(matches!(completions[0].outcome, LoadOutcome::Failed(_)));

        pool.stop();
    }

    #[test]
    fn test_pool_processes_many_requests_concurrently() {
        let store = Arc::new(MemoryStore::new(4).with_latency(Duration::from_millis(5)));
        let (mut pool, queue, history, _slots) = harness(16, 8, store, 4);

        for item in 0..16 {
            queue.push(NodeKey::new(0, item), 0, item as usize, 0);
        }

        let completions = wait_for_completions(&history, 16);
        assert_eq!(completions.len(), 16);

        pool.stop();
    }

    #[test]
    fn test_stop_is_idempotent_and_joins() {
        let store = Arc::new(MemoryStore::new(4));
        let (mut pool, _queue, _history, _slots) = harness(1, 8, store, 2);

        assert_eq!(pool.thread_count(), 2);
        pool.stop();
        pool.stop();
        assert_eq!(pool.thread_count(), 0);
    }

    #[test]
    fn test_claimed_request_completes_after_stop_signal() {
        let store = Arc::new(MemoryStore::new(4).with_latency(Duration::from_millis(100)));
        let (mut pool, queue, history, _slots) = harness(1, 8, store, 1);

        queue.push(NodeKey::new(0, 1), 0, 0, 0);
        // Give the loader time to claim the request, then stop.
        thread::sleep(Duration::from_millis(30));
        pool.stop();

        // The in-flight fetch ran to completion before the join returned.
        assert_eq!(history.drain().len(), 1);
    }
}
