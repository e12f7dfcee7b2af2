use rayon::iter::plumbing::{bridge_unindexed, Folder, UnindexedConsumer, UnindexedProducer};
use rayon::iter::ParallelIterator;

use super::hash::Hash;
use super::node::Node;
use crate::error::{Error, Result};
use crate::store::NodeStore;

/// A leaf reached by a walk: the hash it is stored under and its encoded
/// entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Leaf {
    pub hash: Hash,
    pub bytes: Vec<u8>,
}

/// A lazy walk over every leaf below a root.
///
/// The walker keeps a stack of nodes still to visit, starting with the root.
/// Advancing pops one node: a branch pushes its children, a leaf is yielded.
/// Walked sequentially, leaves come out in ordinal order.
///
/// A walker can be split in two as long as it has more than one node left to
/// visit, which lets rayon fan a full scan out across threads. Once a walker
/// has resolved its last pending node to a leaf it can't be split further.
/// A store error ends the walk after being yielded once.
pub struct LeafWalker<'a, S> {
    store: &'a S,
    stack: Vec<Hash>,
    pending: Option<Leaf>,
    error: Option<Error>,
}

impl<'a, S: NodeStore> LeafWalker<'a, S> {
    /// Creates a walker over the tree rooted at `root`.
    pub fn new(store: &'a S, root: Hash) -> Self {
        LeafWalker {
            store,
            stack: vec![root],
            pending: None,
            error: None,
        }
    }

    /// Creates a walker which yields nothing.
    pub fn empty(store: &'a S) -> Self {
        LeafWalker {
            store,
            stack: vec![],
            pending: None,
            error: None,
        }
    }

    /// Number of nodes still to visit, not counting their descendants.
    pub fn pending_nodes(&self) -> usize {
        self.stack.len() + self.pending.is_some() as usize
    }

    /// Turns the walker into a rayon parallel iterator.
    pub fn into_par_iter(self) -> ParLeaves<'a, S> {
        ParLeaves { walker: self }
    }

    fn push_children(&mut self, left: Hash, right: Option<Hash>) {
        if let Some(right) = right {
            self.stack.push(right);
        }
        self.stack.push(left);
    }

    // Expands a lone pending branch until there are at least two nodes to
    // hand out, or the walk is down to a single leaf.
    fn expand(&mut self) {
        while self.stack.len() == 1 && self.pending.is_none() && self.error.is_none() {
            let hash = self.stack[0];
            match self.store.fetch(&hash) {
                Ok(Node::Branch { left, right }) => {
                    self.stack.clear();
                    self.push_children(left, right);
                }
                Ok(Node::Leaf(bytes)) => {
                    self.stack.clear();
                    self.pending = Some(Leaf { hash, bytes });
                }
                Err(err) => self.error = Some(err),
            }
        }
    }
}

impl<'a, S: NodeStore> Iterator for LeafWalker<'a, S> {
    type Item = Result<Leaf>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(leaf) = self.pending.take() {
            return Some(Ok(leaf));
        }

        loop {
            if let Some(err) = self.error.take() {
                self.stack.clear();
                return Some(Err(err));
            }

            let hash = self.stack.pop()?;
            match self.store.fetch(&hash) {
                Ok(Node::Branch { left, right }) => self.push_children(left, right),
                Ok(Node::Leaf(bytes)) => return Some(Ok(Leaf { hash, bytes })),
                Err(err) => self.error = Some(err),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.pending.is_some() as usize, None)
    }
}

impl<'a, S: NodeStore> UnindexedProducer for LeafWalker<'a, S> {
    type Item = Result<Leaf>;

    fn split(mut self) -> (Self, Option<Self>) {
        self.expand();
        if self.stack.len() < 2 || self.error.is_some() {
            return (self, None);
        }

        // the end of the stack is visited first, keep that half
        let mid = self.stack.len() / 2;
        let next = self.stack.split_off(mid);
        let rest = std::mem::replace(&mut self.stack, next);
        let other = LeafWalker {
            store: self.store,
            stack: rest,
            pending: None,
            error: None,
        };
        (self, Some(other))
    }

    fn fold_with<F>(self, folder: F) -> F
    where
        F: Folder<Self::Item>,
    {
        folder.consume_iter(self)
    }
}

/// Parallel iterator over the leaves of a tree. Its length is never known up
/// front.
pub struct ParLeaves<'a, S> {
    walker: LeafWalker<'a, S>,
}

impl<'a, S: NodeStore> ParallelIterator for ParLeaves<'a, S> {
    type Item = Result<Leaf>;

    fn drive_unindexed<C>(self, consumer: C) -> C::Result
    where
        C: UnindexedConsumer<Self::Item>,
    {
        bridge_unindexed(self.walker, consumer)
    }
}
