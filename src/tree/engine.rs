use std::collections::{BTreeSet, HashMap};

use super::accessor::DirectAccessor;
use super::hash::{levels, nodes_at_level, Hash};
use super::node::Node;
use crate::error::{Error, Result};
use crate::store::NodeStore;

/// A positional view of a tree's hashes which can be rewritten while new
/// hashes are computed.
pub trait HashTree {
    /// Hash at `(level, index)`, or `None` if that position is empty.
    fn get_hash_entry(&self, level: u32, index: u64) -> Result<Option<Hash>>;

    fn set_hash(&mut self, level: u32, index: u64, hash: Hash);

    /// Marks a position as empty, hiding whatever the underlying tree held.
    fn remove_hash(&mut self, level: u32, index: u64);
}

/// The current leaves of a tree, including changes not yet hashed.
pub trait LeafSource {
    fn entry_count(&self) -> u64;

    /// Encoded leaf at `ordinal`, which must be below `entry_count`.
    fn hashable_entry(&self, ordinal: u64) -> Result<Vec<u8>>;
}

/// A node materialized while recomputing hashes. `ordinal` is set for leaves.
pub struct Change<'a> {
    pub ordinal: Option<u64>,
    pub hash: Hash,
    pub node: &'a Node,
}

impl<'a> Change<'a> {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.ordinal.is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Hash(Hash),
    Removed,
}

/// A `HashTree` which prefers an in-memory overlay of new hashes and falls
/// back to a persisted tree for positions the overlay doesn't know.
pub struct OverlayHashTree<'a, S> {
    base: &'a DirectAccessor<'a, S>,
    overlay: HashMap<(u32, u64), Slot>,
}

impl<'a, S: NodeStore> OverlayHashTree<'a, S> {
    pub fn new(base: &'a DirectAccessor<'a, S>) -> Self {
        OverlayHashTree {
            base,
            overlay: HashMap::new(),
        }
    }
}

impl<'a, S: NodeStore> HashTree for OverlayHashTree<'a, S> {
    fn get_hash_entry(&self, level: u32, index: u64) -> Result<Option<Hash>> {
        match self.overlay.get(&(level, index)) {
            Some(Slot::Hash(hash)) => Ok(Some(*hash)),
            Some(Slot::Removed) => Ok(None),
            None => self.base.get_hash_entry(level, index),
        }
    }

    fn set_hash(&mut self, level: u32, index: u64, hash: Hash) {
        self.overlay.insert((level, index), Slot::Hash(hash));
    }

    fn remove_hash(&mut self, level: u32, index: u64) {
        self.overlay.insert((level, index), Slot::Removed);
    }
}

/// Recomputes the hashes along the paths from each changed ordinal to the
/// root, reusing every other hash from `tree`, and returns the new root (or
/// `None` if the tree is now empty).
///
/// `on_change` is called once per newly materialized node, so the caller can
/// persist it. Changed ordinals at or past `leaves.entry_count()` are
/// removals. The result does not depend on the iteration order of `changed`.
pub fn compute_hashes_from_changes<T, L, I, F>(
    tree: &mut T,
    leaves: &L,
    changed: I,
    mut on_change: F,
) -> Result<Option<Hash>>
where
    T: HashTree,
    L: LeafSource,
    I: IntoIterator<Item = u64>,
    F: FnMut(Change) -> Result<()>,
{
    let entry_count = leaves.entry_count();
    let mut changed: BTreeSet<u64> = changed.into_iter().collect();
    if entry_count == 0 {
        return Ok(None);
    }

    let levels = levels(entry_count);
    let mut hashed = 0usize;

    // leaves
    let mut parents = BTreeSet::new();
    for &ordinal in changed.iter() {
        if ordinal < entry_count {
            let node = Node::Leaf(leaves.hashable_entry(ordinal)?);
            let hash = node.hash();
            on_change(Change {
                ordinal: Some(ordinal),
                hash,
                node: &node,
            })?;
            tree.set_hash(0, ordinal, hash);
            hashed += 1;
            log::trace!("set hash 0,{}={}", ordinal, hex::encode(hash));
        } else {
            tree.remove_hash(0, ordinal);
        }
        parents.insert(ordinal / 2);
    }
    changed = parents;

    // branches
    for level in 1..levels {
        let count = nodes_at_level(level, entry_count);
        let mut parents = BTreeSet::new();

        for &index in changed.iter() {
            if index < count {
                let left = match tree.get_hash_entry(level - 1, index * 2)? {
                    Some(left) => left,
                    None => {
                        return Err(Error::unexpected_node(format!(
                            "no left child below {},{}",
                            level, index
                        )))
                    }
                };
                let right = tree.get_hash_entry(level - 1, index * 2 + 1)?;

                let node = Node::branch(left, right);
                let hash = node.hash();
                on_change(Change {
                    ordinal: None,
                    hash,
                    node: &node,
                })?;
                tree.set_hash(level, index, hash);
                hashed += 1;
                log::trace!("set hash {},{}={}", level, index, hex::encode(hash));
            } else {
                tree.remove_hash(level, index);
            }
            parents.insert(index / 2);
        }

        changed = parents;
    }

    let root = tree.get_hash_entry(levels - 1, 0)?;
    log::trace!("hashed {} nodes for {} entries", hashed, entry_count);
    Ok(root)
}
