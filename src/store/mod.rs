#[cfg(feature = "full")]
mod rocks;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::tree::{Hash, Node};

#[cfg(feature = "full")]
pub use rocks::{default_db_opts, RocksStore};

/// Content-addressed persistence for tree nodes: a node is always stored
/// under its own hash, so a given hash resolves to the same node forever.
///
/// Implementations must allow concurrent `get`s interleaved with the single
/// writer's `put`s.
pub trait NodeStore: Send + Sync {
    /// Loads the node stored under `hash`, if any.
    fn get(&self, hash: &Hash) -> Result<Option<Node>>;

    /// Stores `node` under `hash`.
    fn put(&self, hash: &Hash, node: &Node) -> Result<()>;

    /// Loads the node stored under `hash`. A hash that was referenced by the
    /// tree but is absent from the store is an integrity failure.
    fn fetch(&self, hash: &Hash) -> Result<Node> {
        match self.get(hash)? {
            Some(node) => Ok(node),
            None => Err(Error::missing_node(hash)),
        }
    }
}

impl<S: NodeStore + ?Sized> NodeStore for Arc<S> {
    fn get(&self, hash: &Hash) -> Result<Option<Node>> {
        (**self).get(hash)
    }

    fn put(&self, hash: &Hash, node: &Node) -> Result<()> {
        (**self).put(hash, node)
    }
}

impl<S: NodeStore + ?Sized> NodeStore for &S {
    fn get(&self, hash: &Hash) -> Result<Option<Node>> {
        (**self).get(hash)
    }

    fn put(&self, hash: &Hash, node: &Node) -> Result<()> {
        (**self).put(hash, node)
    }
}

/// A `NodeStore` held entirely in memory. Clones share the same nodes.
#[derive(Clone, Default)]
pub struct MemStore {
    nodes: Arc<RwLock<HashMap<Hash, Node>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Default::default()
    }

    /// Number of distinct nodes held.
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Drops the node stored under `hash`. Only useful for simulating data
    /// loss in tests.
    pub fn forget(&self, hash: &Hash) -> Option<Node> {
        self.nodes.write().remove(hash)
    }

    /// Replaces the node stored under `hash` without checking that it matches.
    /// Only useful for simulating corruption in tests.
    pub fn overwrite(&self, hash: &Hash, node: Node) {
        self.nodes.write().insert(*hash, node);
    }
}

impl NodeStore for MemStore {
    fn get(&self, hash: &Hash) -> Result<Option<Node>> {
        Ok(self.nodes.read().get(hash).cloned())
    }

    fn put(&self, hash: &Hash, node: &Node) -> Result<()> {
        let mut nodes = self.nodes.write();
        if !nodes.contains_key(hash) {
            nodes.insert(*hash, node.clone());
        }
        Ok(())
    }
}
