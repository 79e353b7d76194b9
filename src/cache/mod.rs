//! Out-of-core streaming cache.
//!
//! Fixed-size memory slots, a consumer-thread-only index with priority
//! eviction, a deduplicating priority queue, a pool of blocking loader
//! threads and a completion hand-off buffer, composed behind the
//! [`StreamingCache`] facade.

mod history;
mod index;
mod queue;
mod slots;
mod stats;
mod system;
mod types;
mod workers;

pub use history::{Completion, CompletionHistory, LoadOutcome};
pub use queue::{Request, RequestQueue};
pub use slots::{SlotData, SlotPool};
pub use stats::CacheStats;
pub use system::StreamingCache;
pub use types::{
    CacheConfig, CacheError, EntryState, Generation, Priority, SlotId, DEFAULT_LOADER_THREADS,
    DEFAULT_MEMORY_BUDGET,
};
pub use workers::LoaderPool;
