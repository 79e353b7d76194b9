//! Keys identifying loadable units across datasets.

use std::fmt;

/// Identifier of an independent dataset (a model, a tile atlas, ...).
pub type ResourceId = u32;

/// Identifier of a node or tile within a dataset's hierarchy.
pub type ItemId = u64;

/// Key uniquely identifying a loadable unit.
///
/// A key pairs the dataset it belongs to with the node/tile id inside that
/// dataset. Keys are small, copyable and totally ordered so they can serve
/// as map keys in the cache index and the request queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    /// Dataset this node belongs to
    pub resource: ResourceId,
    /// Node/tile id within the dataset
    pub item: ItemId,
}

impl NodeKey {
    /// Create a new key.
    pub fn new(resource: ResourceId, item: ItemId) -> Self {
        Self { resource, item }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.item)
    }
}
