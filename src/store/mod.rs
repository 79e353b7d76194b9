//! Backing store abstraction.
//!
//! A backing store knows how to decode one on-disk hierarchical format and
//! exposes a single blocking byte-fetch operation. The cache never interprets
//! the bytes it loads; renderers attach whatever store matches their data
//! (LOD node files, texture-tile atlases, network sources).

use crate::key::NodeKey;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fetching from a backing store.
#[derive(Debug, Error)]
pub enum FetchError {
    /// I/O failure reading the underlying storage
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store has no item for the requested key
    #[error("No item for key {key} in backing store")]
    MissingItem { key: NodeKey },

    /// The stored payload failed validation during decode
    #[error("Corrupt payload for key {key}: {reason}")]
    Corrupt { key: NodeKey, reason: String },
}

/// Blocking byte-fetch interface to hierarchical storage.
///
/// Implementations must be safe to call concurrently from multiple loader
/// threads for different keys. Parallelism in the cache comes from running
/// several of these blocking calls at once, not from async I/O.
pub trait BackingStore: Send + Sync {
    /// Fetch the payload for a key.
    ///
    /// Returns the node's bytes, at most one slot in size, or a
    /// [`FetchError`] describing why the key could not be loaded.
    fn fetch(&self, key: &NodeKey) -> Result<Vec<u8>, FetchError>;
}

/// In-memory backing store.
///
/// Serves payloads from a map, optionally sleeping per fetch to model slow
/// storage. Useful for in-core datasets and as a deterministic stand-in for
/// disk readers in tests.
pub struct MemoryStore {
    items: Mutex<HashMap<NodeKey, Vec<u8>>>,
    latency: Option<Duration>,
    payload_bytes: usize,
}

impl MemoryStore {
    /// Create an empty store whose synthesized payloads are `payload_bytes`
    /// long (see [`MemoryStore::insert`] for explicit payloads).
    pub fn new(payload_bytes: usize) -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            latency: None,
            payload_bytes,
        }
    }

    /// Sleep this long on every fetch, modeling slow storage.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Insert an explicit payload for a key.
    pub fn insert(&self, key: NodeKey, data: Vec<u8>) {
        self.items.lock().unwrap().insert(key, data);
    }

    /// Number of explicit payloads in the store.
    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    /// Whether the store holds no explicit payloads.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deterministic filler payload derived from the key.
    fn synthesize(&self, key: &NodeKey) -> Vec<u8> {
        let seed = (key.resource as u64)
            .wrapping_mul(31)
            .wrapping_add(key.item);
        (0..self.payload_bytes)
            .map(|i| (seed.wrapping_add(i as u64) & 0xff) as u8)
            .collect()
    }
}

impl BackingStore for MemoryStore {
    fn fetch(&self, key: &NodeKey) -> Result<Vec<u8>, FetchError> {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        let items = self.items.lock().unwrap();
        Ok(items
            .get(key)
            .cloned()
            .unwrap_or_else(|| self.synthesize(key)))
    }
}
