//! LodStream - Out-of-core streaming cache for level-of-detail renderers
//!
//! This library streams fixed-size nodes of hierarchical datasets (LOD
//! point/mesh nodes, texture tiles) from slow backing storage into a small
//! set of memory slots that a renderer can read directly, while a pool of
//! background loader threads performs the blocking fetches.
//!
//! # High-Level API
//!
//! The [`cache::StreamingCache`] facade composes the slot pool, index,
//! request queue, loader pool and completion history:
//!
//! ```
//! use lodstream::cache::{CacheConfig, StreamingCache};
//! use lodstream::key::NodeKey;
//! use lodstream::store::MemoryStore;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new(64));
//! let config = CacheConfig::new(64).with_memory_budget(64 * 16);
//! let mut cache = StreamingCache::new(config, store).unwrap();
//!
//! cache.register(NodeKey::new(0, 1), 0).unwrap();
//! // ... later, once per frame:
//! cache.refresh();
//! if let Some(data) = cache.data(&NodeKey::new(0, 1)) {
//!     // data derefs to the node's bytes
//!     let _ = &data[..];
//! };
//! ```
//!
//! The consumer thread owns the cache and is the only mutator of the index;
//! loader threads communicate results exclusively through the completion
//! history, drained by [`cache::StreamingCache::refresh`].

pub mod cache;
pub mod config;
pub mod key;
pub mod store;

/// Version of the lodstream library.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
