//! Completion history: the loader-to-consumer hand-off buffer.
//!
//! Loader threads append completed or failed loads here; only the consumer
//! thread drains it (during refresh) and applies the results to the index.
//! That hand-off is what keeps the index single-threaded.

use crate::cache::types::{Generation, SlotId};
use crate::key::NodeKey;
use crate::store::FetchError;
use std::sync::Mutex;

/// Outcome of one background load.
#[derive(Debug)]
pub enum LoadOutcome {
    /// Fetch succeeded; `bytes` were written into the slot
    Loaded { bytes: usize },
    /// Fetch or slot write failed
    Failed(FetchError),
}

/// A finished load, successful or not.
#[derive(Debug)]
pub struct Completion {
    pub key: NodeKey,
    pub slot: SlotId,
    pub generation: Generation,
    pub outcome: LoadOutcome,
}

/// Thread-safe buffer of finished loads.
pub struct CompletionHistory {
    inner: Mutex<Vec<Completion>>,
}

impl CompletionHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
        }
    }

    /// Append a completion (loader threads).
    pub fn push(&self, completion: Completion) {
        self.inner.lock().unwrap().push(completion);
    }

    /// Take every buffered completion (consumer thread).
    pub fn drain(&self) -> Vec<Completion> {
        std::mem::take(&mut *self.inner.lock().unwrap())
    }

    /// Number of undrained completions.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Whether no completions are buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CompletionHistory {
    fn default() -> Self {
        Self::new()
    }
}
