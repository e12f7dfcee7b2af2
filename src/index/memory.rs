use std::collections::HashMap;

use super::{IndexEntry, KeyIndex};
use crate::entry::{decode_leaf, Entry};
use crate::error::{IntegrityError, Result};
use crate::store::NodeStore;
use crate::tree::{Hash, LeafWalker, NULL_HASH};

// Cap on slots reserved up front by `rebuild`; its expected count is untrusted.
const MAX_RESERVE: u64 = 1 << 20;

/// A `KeyIndex` held in a `HashMap`. Opening an existing tree costs one full
/// walk of its leaves.
#[derive(Clone, Debug, Default)]
pub struct MemKeyIndex {
    entries: HashMap<String, IndexEntry>,
}

impl MemKeyIndex {
    pub fn new() -> Self {
        Default::default()
    }

    /// Builds the index for the tree rooted at `root` by walking every leaf
    /// and decoding the entry stored there to read its key.
    pub fn rebuild<V, S>(root: Option<Hash>, entry_count: u64, store: &S) -> Result<Self>
    where
        V: Entry,
        S: NodeStore,
    {
        let mut index = MemKeyIndex::new();
        let root = match root {
            Some(root) if entry_count > 0 => root,
            _ => return Ok(index),
        };

        index.entries.reserve(entry_count.min(MAX_RESERVE) as usize);
        for (ordinal, leaf) in LeafWalker::new(store, root).enumerate() {
            let leaf = leaf?;
            let entry: V = decode_leaf(&leaf.bytes)?;
            let ordinal = ordinal as u64;
            let previous = index.entries.insert(
                entry.key().to_string(),
                IndexEntry {
                    ordinal,
                    hash: leaf.hash,
                },
            );
            if let Some(previous) = previous {
                return Err(IntegrityError::UnexpectedNode(format!(
                    "key '{}' stored at ordinals {} and {}",
                    entry.key(),
                    previous.ordinal,
                    ordinal
                ))
                .into());
            }
        }

        if index.entry_count() != entry_count {
            return Err(IntegrityError::UnexpectedNode(format!(
                "tree holds {} leaves, expected {}",
                index.entry_count(),
                entry_count
            ))
            .into());
        }

        log::debug!("rebuilt key index with {} entries", entry_count);
        Ok(index)
    }
}

impl KeyIndex for MemKeyIndex {
    fn find(&self, key: &str) -> Result<Option<IndexEntry>> {
        Ok(self.entries.get(key).copied())
    }

    fn put(&mut self, key: &str, ordinal: u64) -> Result<()> {
        match self.entries.get_mut(key) {
            Some(entry) => entry.ordinal = ordinal,
            None => {
                self.entries.insert(
                    key.to_string(),
                    IndexEntry {
                        ordinal,
                        hash: NULL_HASH,
                    },
                );
            }
        }
        Ok(())
    }

    fn set(&mut self, key: &str, hash: Hash) -> Result<()> {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.hash = hash;
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<Option<IndexEntry>> {
        Ok(self.entries.remove(key))
    }

    fn entry_count(&self) -> u64 {
        self.entries.len() as u64
    }

    fn copy(&self) -> Self {
        self.clone()
    }
}
