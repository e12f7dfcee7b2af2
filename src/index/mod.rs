mod memory;

pub use memory::MemKeyIndex;

use crate::error::Result;
use crate::tree::Hash;

/// Where a key currently lives in a tree: its ordinal, and the hash of the
/// leaf last written for it (`NULL_HASH` until its first flush).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub ordinal: u64,
    pub hash: Hash,
}

/// Maps business keys to their position within one tree.
///
/// Ordinals are dense: with `n` keys indexed, they are exactly `0..n`. Methods
/// return `Result` so that implementations persisting the index can surface
/// their store's errors.
pub trait KeyIndex: Send + Sync {
    /// Looks up a key.
    fn find(&self, key: &str) -> Result<Option<IndexEntry>>;

    /// Maps `key` to `ordinal`, keeping any known hash.
    fn put(&mut self, key: &str, ordinal: u64) -> Result<()>;

    /// Records the hash last written for an already indexed key. Unknown keys
    /// are ignored.
    fn set(&mut self, key: &str, hash: Hash) -> Result<()>;

    /// Removes a key, returning its former entry.
    fn remove(&mut self, key: &str) -> Result<Option<IndexEntry>>;

    /// Number of indexed keys.
    fn entry_count(&self) -> u64;

    /// Creates a deep, independent copy. Changes to the copy never show
    /// through the original, and vice versa.
    fn copy(&self) -> Self
    where
        Self: Sized;
}
