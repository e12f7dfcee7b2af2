use super::hash::{levels, nodes_at_level, Hash};
use super::node::Node;
use super::path::{PathBranch, TreePath};
use crate::error::{Error, Result};
use crate::store::NodeStore;

/// Reads a persisted tree by position: leaves by ordinal and internal node
/// hashes by `(level, index)`, where level 0 holds the leaves.
///
/// Every lookup walks down from the root, picking a side at each branch from
/// the bits of the target index.
pub struct DirectAccessor<'a, S> {
    store: &'a S,
    root: Option<Hash>,
    entry_count: u64,
    levels: u32,
}

impl<'a, S: NodeStore> DirectAccessor<'a, S> {
    pub fn new(store: &'a S, root: Option<Hash>, entry_count: u64) -> Self {
        DirectAccessor {
            store,
            root,
            entry_count,
            levels: levels(entry_count),
        }
    }

    #[inline]
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    #[inline]
    pub fn levels(&self) -> u32 {
        self.levels
    }

    #[inline]
    pub fn root(&self) -> Option<Hash> {
        self.root.filter(|_| self.entry_count > 0)
    }

    /// Returns the encoded leaf at `ordinal`, or `None` if the ordinal is out
    /// of range.
    pub fn get_hashable_entry(&self, ordinal: u64) -> Result<Option<Vec<u8>>> {
        if ordinal >= self.entry_count {
            return Ok(None);
        }

        let hash = self.walk_to(0, ordinal, &mut |_, _| ())?;
        match self.store.fetch(&hash)? {
            Node::Leaf(bytes) => Ok(Some(bytes)),
            Node::Branch { .. } => Err(Error::unexpected_node(format!(
                "expected leaf at level {} for ordinal {}",
                self.levels - 1,
                ordinal
            ))),
        }
    }

    /// Returns the hash of the node at `(level, index)`, or `None` when no
    /// node can exist at that position for this tree's entry count. An absent
    /// position is not an error: the hash engine reads it as "nothing here".
    pub fn get_hash_entry(&self, level: u32, index: u64) -> Result<Option<Hash>> {
        if self.entry_count == 0 || level >= self.levels {
            return Ok(None);
        }
        if index >= nodes_at_level(level, self.entry_count) {
            return Ok(None);
        }

        self.walk_to(level, index, &mut |_, _| ()).map(Some)
    }

    /// Builds the root-to-leaf path for `ordinal`, or `None` if the ordinal is
    /// out of range.
    pub fn build_tree_path(&self, ordinal: u64) -> Result<Option<TreePath>> {
        let root = match self.root() {
            Some(root) if ordinal < self.entry_count => root,
            _ => return Ok(None),
        };

        let mut branches = Vec::with_capacity(self.levels as usize);
        let leaf_hash = self.walk_to(0, ordinal, &mut |hash, node| {
            if let Node::Branch { left, right } = node {
                branches.push(PathBranch {
                    hash: *hash,
                    left: *left,
                    right: *right,
                });
            }
        })?;

        let leaf = match self.store.fetch(&leaf_hash)? {
            Node::Leaf(bytes) => bytes,
            Node::Branch { .. } => {
                return Err(Error::unexpected_node(format!(
                    "expected leaf at level {} for ordinal {}",
                    self.levels - 1,
                    ordinal
                )))
            }
        };

        Ok(Some(TreePath {
            root,
            branches,
            leaf_hash,
            leaf,
        }))
    }

    /// Descends from the root to the node at `(level, index)` and returns its
    /// hash, calling `visit` with each branch passed through. The caller must
    /// have checked that the position exists.
    fn walk_to<F>(&self, level: u32, index: u64, visit: &mut F) -> Result<Hash>
    where
        F: FnMut(&Hash, &Node),
    {
        let mut hash = match self.root() {
            Some(root) => root,
            None => return Err(Error::unexpected_node("tree has no root".into())),
        };

        let steps = self.levels - 1 - level;
        for depth in 0..steps {
            let node = self.store.fetch(&hash)?;
            visit(&hash, &node);

            let go_left = (index >> (steps - 1 - depth)) & 1 == 0;
            hash = match node {
                Node::Branch { left, right } => {
                    if go_left {
                        left
                    } else {
                        match right {
                            Some(right) => right,
                            None => {
                                return Err(Error::unexpected_node(format!(
                                    "branch {} at depth {} has no right child",
                                    hex::encode(hash),
                                    depth
                                )))
                            }
                        }
                    }
                }
                Node::Leaf(_) => {
                    return Err(Error::unexpected_node(format!(
                        "expected branch at depth {}, found leaf {}",
                        depth,
                        hex::encode(hash)
                    )))
                }
            };
        }

        Ok(hash)
    }
}
