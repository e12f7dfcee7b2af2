mod partial;

use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::iter::ParallelIterator;
use serde_json::Value;

pub use partial::{PartialNode, PartialTree};

use crate::cache::StoreCache;
use crate::entry::{decode_leaf, Entry};
use crate::error::{Error, IntegrityError, Result};
use crate::index::{KeyIndex, MemKeyIndex};
use crate::store::NodeStore;
use crate::tree::{
    self, compute_hashes_from_changes, DirectAccessor, Hash, LeafSource, LeafWalker,
    OverlayHashTree, NULL_HASH,
};

/// A string-keyed, ordinal-addressed collection of entries committed to by a
/// binary Merkle tree.
///
/// Changes are buffered and only hashed into the tree when `get_hash` is
/// called. Removing an entry moves the last entry into its slot, so ordinals
/// stay dense but are not stable across removals.
///
/// Mutation must be driven by one caller at a time. Reads against a list with
/// no buffered changes may run concurrently.
pub struct MerkleList<V, S, I = MemKeyIndex> {
    store: S,
    cache: Arc<StoreCache<V>>,
    index: I,
    root: Option<Hash>,
    committed_count: u64,
    entry_count: u64,
    pending: BTreeMap<u64, Option<V>>,
}

impl<V: Entry, S: NodeStore> MerkleList<V, S, MemKeyIndex> {
    /// Creates an empty list.
    pub fn new(store: S, cache: Arc<StoreCache<V>>) -> Self {
        MerkleList {
            store,
            cache,
            index: MemKeyIndex::new(),
            root: None,
            committed_count: 0,
            entry_count: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Opens a list previously committed to `root` with `entry_count` entries,
    /// rebuilding its key index with one walk over every leaf. `NULL_HASH`
    /// opens an empty list.
    pub fn open(root: Hash, entry_count: u64, store: S, cache: Arc<StoreCache<V>>) -> Result<Self> {
        let root = committed_root(root, entry_count)?;
        let index = MemKeyIndex::rebuild::<V, S>(root, entry_count, &store)?;
        MerkleList::build(root, entry_count, store, cache, index)
    }
}

impl<V: Entry, S: NodeStore, I: KeyIndex> MerkleList<V, S, I> {
    /// Opens a list previously committed to `root` using an index the caller
    /// already holds for that state.
    pub fn with_index(
        root: Hash,
        entry_count: u64,
        store: S,
        cache: Arc<StoreCache<V>>,
        index: I,
    ) -> Result<Self> {
        let root = committed_root(root, entry_count)?;
        if index.entry_count() != entry_count {
            return Err(Error::KeyError(format!(
                "index holds {} keys, list has {} entries",
                index.entry_count(),
                entry_count
            )));
        }
        MerkleList::build(root, entry_count, store, cache, index)
    }

    fn build(
        root: Option<Hash>,
        entry_count: u64,
        store: S,
        cache: Arc<StoreCache<V>>,
        index: I,
    ) -> Result<Self> {
        Ok(MerkleList {
            store,
            cache,
            index,
            root,
            committed_count: entry_count,
            entry_count,
            pending: BTreeMap::new(),
        })
    }

    /// Number of entries, including buffered changes.
    #[inline]
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Number of entries behind the last computed root.
    #[inline]
    pub fn committed_count(&self) -> u64 {
        self.committed_count
    }

    /// The last computed root, `None` for an empty list. Does not flush.
    #[inline]
    pub fn root(&self) -> Option<Hash> {
        self.root
    }

    /// Returns `true` if there are changes not yet hashed into the tree.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &Arc<StoreCache<V>> {
        &self.cache
    }

    fn accessor(&self) -> DirectAccessor<'_, S> {
        DirectAccessor::new(&self.store, self.root, self.committed_count)
    }

    /// Looks up the entry for `key`, seeing buffered changes.
    pub fn find(&self, key: &str) -> Result<Option<V>> {
        let entry = match self.index.find(key)? {
            Some(entry) => entry,
            None => return Ok(None),
        };

        if let Some(change) = self.pending.get(&entry.ordinal) {
            return Ok(change.clone());
        }

        let ordinal = entry.ordinal;
        let load = || -> Result<Option<V>> {
            match self.load(ordinal)? {
                Some(value) => Ok(Some(value)),
                None => Err(IntegrityError::UnexpectedNode(format!(
                    "key '{}' indexed at ordinal {} beyond {} committed entries",
                    key, ordinal, self.committed_count
                ))
                .into()),
            }
        };
        if entry.hash == NULL_HASH {
            load()
        } else {
            self.cache.get_or_load(&entry.hash, load)
        }
    }

    /// Returns the entry at `ordinal`, seeing buffered changes, or `None` if
    /// the ordinal is out of range.
    pub fn get(&self, ordinal: u64) -> Result<Option<V>> {
        if ordinal >= self.entry_count {
            return Ok(None);
        }
        if let Some(change) = self.pending.get(&ordinal) {
            return Ok(change.clone());
        }
        self.load(ordinal)
    }

    fn load(&self, ordinal: u64) -> Result<Option<V>> {
        match self.accessor().get_hashable_entry(ordinal)? {
            Some(bytes) => decode_leaf(&bytes).map(Some),
            None => Ok(None),
        }
    }

    pub fn item_exists(&self, key: &str) -> Result<bool> {
        Ok(self.index.find(key)?.is_some())
    }

    /// The ordinal `key` currently maps to, if any.
    pub fn find_index(&self, key: &str) -> Result<Option<u64>> {
        Ok(self.index.find(key)?.map(|entry| entry.ordinal))
    }

    /// Writes `value` under `key`: overwrites its current slot if the key is
    /// known, otherwise appends. Returns the ordinal written.
    pub fn update(&mut self, key: &str, value: V) -> Result<u64> {
        if value.key() != key {
            return Err(Error::KeyError(format!(
                "entry keyed '{}' written under '{}'",
                value.key(),
                key
            )));
        }
        let ordinal = self.find_index(key)?;
        self.update_at(ordinal, value)
    }

    /// Writes `value` at `ordinal`, or appends it when `ordinal` is `None`.
    /// Returns the ordinal written.
    ///
    /// Overwriting a slot held by a different key drops that key. A key can
    /// only live at one ordinal.
    pub fn update_at(&mut self, ordinal: Option<u64>, value: V) -> Result<u64> {
        let ordinal = match ordinal {
            None => self.entry_count,
            Some(ordinal) if ordinal > self.entry_count => {
                return Err(Error::IndexOutOfBounds(format!(
                    "ordinal {} beyond {} entries",
                    ordinal, self.entry_count
                )))
            }
            Some(ordinal) => ordinal,
        };

        if let Some(existing) = self.index.find(value.key())? {
            if existing.ordinal != ordinal {
                return Err(Error::KeyError(format!(
                    "key '{}' already at ordinal {}",
                    value.key(),
                    existing.ordinal
                )));
            }
        }

        if ordinal < self.entry_count {
            if let Some(old) = self.get(ordinal)? {
                if old.key() != value.key() {
                    self.index.remove(old.key())?;
                }
            }
        } else {
            self.entry_count += 1;
        }

        self.index.put(value.key(), ordinal)?;
        self.pending.insert(ordinal, Some(value));
        Ok(ordinal)
    }

    /// Removes `key`, moving the last entry into its slot. Returns `false` if
    /// the key is unknown.
    pub fn remove(&mut self, key: &str) -> Result<bool> {
        let entry = match self.index.find(key)? {
            Some(entry) => entry,
            None => return Ok(false),
        };

        let last = self.entry_count - 1;
        if entry.ordinal != last {
            let moved = match self.get(last)? {
                Some(moved) => moved,
                None => {
                    return Err(Error::unexpected_node(format!(
                        "no entry at last ordinal {}",
                        last
                    )))
                }
            };
            self.index.put(moved.key(), entry.ordinal)?;
            self.pending.insert(entry.ordinal, Some(moved));
        }

        self.pending.insert(last, None);
        self.index.remove(key)?;
        self.entry_count = last;
        Ok(true)
    }

    /// Hashes buffered changes into the tree, persisting every new node, and
    /// returns the root. An empty list hashes to `NULL_HASH`.
    pub fn get_hash(&mut self) -> Result<Hash> {
        if self.pending.is_empty() {
            return Ok(self.root.unwrap_or(NULL_HASH));
        }

        let store = &self.store;
        let cache = &self.cache;
        let index = &mut self.index;
        let pending = &self.pending;

        let accessor = DirectAccessor::new(store, self.root, self.committed_count);
        let mut tree = OverlayHashTree::new(&accessor);
        let leaves = BufferedLeaves {
            accessor: &accessor,
            pending,
            entry_count: self.entry_count,
        };

        let root = compute_hashes_from_changes(
            &mut tree,
            &leaves,
            pending.keys().copied(),
            |change| {
                store.put(&change.hash, change.node)?;
                if let Some(ordinal) = change.ordinal {
                    if let Some(Some(value)) = pending.get(&ordinal) {
                        index.set(value.key(), change.hash)?;
                        cache.pin(change.hash, value.clone());
                    }
                }
                Ok(())
            },
        )?;

        log::debug!(
            "flushed {} changes, {} entries, root {}",
            self.pending.len(),
            self.entry_count,
            root.map_or_else(|| "empty".to_string(), |root| hex::encode(root))
        );

        self.root = root;
        self.committed_count = self.entry_count;
        self.pending.clear();
        Ok(root.unwrap_or(NULL_HASH))
    }

    /// Flushes and formats the root as hex, or an empty string for an empty
    /// list.
    pub fn root_hex(&mut self) -> Result<String> {
        let root = self.get_hash()?;
        if root == NULL_HASH {
            Ok(String::new())
        } else {
            Ok(hex::encode(root))
        }
    }

    fn walker(&self) -> LeafWalker<'_, S> {
        match self.accessor().root() {
            Some(root) => LeafWalker::new(&self.store, root),
            None => LeafWalker::empty(&self.store),
        }
    }

    /// Iterates over committed entries in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = Result<V>> + '_ {
        self.walker()
            .map(|leaf| leaf.and_then(|leaf| decode_leaf(&leaf.bytes)))
    }

    /// Calls `f` with every committed entry in ordinal order, stopping at the
    /// first error.
    pub fn for_each<F: FnMut(V)>(&self, mut f: F) -> Result<()> {
        for value in self.iter() {
            f(value?);
        }
        Ok(())
    }

    /// A parallel scan over committed entries, in no particular order.
    pub fn stream(&self) -> impl ParallelIterator<Item = Result<V>> + '_ {
        self.walker()
            .into_par_iter()
            .map(|leaf| leaf.and_then(|leaf| decode_leaf(&leaf.bytes)))
    }

    /// Counts committed leaves by walking the whole tree.
    pub fn count_leaves(&self) -> Result<u64> {
        let mut count = 0;
        for leaf in self.walker() {
            leaf?;
            count += 1;
        }
        Ok(count)
    }

    /// Rehashes every committed node and checks the leaf count.
    pub fn validate(&self) -> Result<()> {
        let root = match self.accessor().root() {
            Some(root) => root,
            None => return Ok(()),
        };

        let leaves = tree::validate(&self.store, &root)?;
        if leaves != self.committed_count {
            return Err(IntegrityError::UnexpectedNode(format!(
                "tree holds {} leaves, expected {}",
                leaves, self.committed_count
            ))
            .into());
        }
        Ok(())
    }

    /// Collects the committed paths to each of `keys` into one partial tree.
    /// Returns `None` if none of the keys are committed.
    ///
    /// Keys whose position has buffered changes are skipped, so this should
    /// be called on a freshly hashed list.
    pub fn get_partial_tree<K, It>(&self, keys: It) -> Result<Option<PartialTree<V>>>
    where
        K: AsRef<str>,
        It: IntoIterator<Item = K>,
    {
        let accessor = self.accessor();
        let root = match accessor.root() {
            Some(root) => root,
            None => return Ok(None),
        };

        let mut tree = PartialTree::new(root);
        for key in keys {
            let key = key.as_ref();
            let ordinal = match self.index.find(key)? {
                Some(entry) => entry.ordinal,
                None => continue,
            };
            let path = match accessor.build_tree_path(ordinal)? {
                Some(path) => path,
                None => continue,
            };

            let value: V = decode_leaf(&path.leaf)?;
            if value.key() != key {
                continue;
            }
            tree.add_path(path, value)?;
        }

        if tree.is_empty() {
            Ok(None)
        } else {
            Ok(Some(tree))
        }
    }

    /// Like `get_partial_tree`, but returns the external map form with each
    /// leaf's value rendered by `leaf_to_json`.
    pub fn get_partial_tree_map<K, It, F>(&self, keys: It, leaf_to_json: F) -> Result<Option<Value>>
    where
        K: AsRef<str>,
        It: IntoIterator<Item = K>,
        F: Fn(&V) -> Value,
    {
        match self.get_partial_tree(keys)? {
            Some(tree) => tree.to_value(leaf_to_json).map(Some),
            None => Ok(None),
        }
    }
}

impl<V: Entry, S: NodeStore + Clone, I: KeyIndex> MerkleList<V, S, I> {
    /// Forks the list. The copy shares the store and cache but has its own
    /// index and buffered changes, so neither side sees the other's writes.
    pub fn copy(&self) -> Self {
        MerkleList {
            store: self.store.clone(),
            cache: self.cache.clone(),
            index: self.index.copy(),
            root: self.root,
            committed_count: self.committed_count,
            entry_count: self.entry_count,
            pending: self.pending.clone(),
        }
    }
}

fn committed_root(root: Hash, entry_count: u64) -> Result<Option<Hash>> {
    match (root == NULL_HASH, entry_count) {
        (true, 0) => Ok(None),
        (false, n) if n > 0 => Ok(Some(root)),
        _ => Err(Error::IndexOutOfBounds(format!(
            "root {} cannot hold {} entries",
            hex::encode(root),
            entry_count
        ))),
    }
}

/// Leaves as they will be once buffered changes are applied.
struct BufferedLeaves<'a, V, S> {
    accessor: &'a DirectAccessor<'a, S>,
    pending: &'a BTreeMap<u64, Option<V>>,
    entry_count: u64,
}

impl<'a, V: Entry, S: NodeStore> LeafSource for BufferedLeaves<'a, V, S> {
    fn entry_count(&self) -> u64 {
        self.entry_count
    }

    fn hashable_entry(&self, ordinal: u64) -> Result<Vec<u8>> {
        if let Some(Some(value)) = self.pending.get(&ordinal) {
            return value.encode(ordinal);
        }
        match self.accessor.get_hashable_entry(ordinal)? {
            Some(bytes) => Ok(bytes),
            None => Err(Error::unexpected_node(format!(
                "no committed leaf at ordinal {}",
                ordinal
            ))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::MemStore;
    use crate::test_utils::{make_entries, make_list, TestEntry};

    type List = MerkleList<TestEntry, MemStore>;

    fn empty() -> List {
        MerkleList::new(MemStore::new(), Arc::new(StoreCache::default()))
    }

    #[test]
    fn empty_list() {
        let mut list = empty();
        assert_eq!(list.get_hash().unwrap(), NULL_HASH);
        assert_eq!(list.root_hex().unwrap(), "");
        assert_eq!(list.entry_count(), 0);
        assert_eq!(list.find("a").unwrap(), None);
        assert_eq!(list.get(0).unwrap(), None);
        assert_eq!(list.iter().count(), 0);
        assert!(list.get_partial_tree(&["a"]).unwrap().is_none());
        list.validate().unwrap();
    }

    #[test]
    fn reads_see_buffered_changes() {
        let mut list = empty();
        list.update("a", TestEntry::new("a", 1)).unwrap();
        assert!(list.is_dirty());
        assert_eq!(list.find("a").unwrap(), Some(TestEntry::new("a", 1)));
        assert_eq!(list.get(0).unwrap(), Some(TestEntry::new("a", 1)));
        assert_eq!(list.committed_count(), 0);

        list.get_hash().unwrap();
        assert!(!list.is_dirty());
        assert_eq!(list.committed_count(), 1);
        assert_eq!(list.find("a").unwrap(), Some(TestEntry::new("a", 1)));
    }

    #[test]
    fn overwrite_keeps_ordinal() {
        let mut list = make_list(5);
        assert_eq!(list.update("key-2", TestEntry::new("key-2", 99)).unwrap(), 2);
        assert_eq!(list.entry_count(), 5);
        list.get_hash().unwrap();
        assert_eq!(list.get(2).unwrap(), Some(TestEntry::new("key-2", 99)));
    }

    #[test]
    fn update_at_bounds() {
        let mut list = make_list(3);
        let err = list.update_at(Some(4), TestEntry::new("x", 0)).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfBounds(_)));

        // the slot right past the end appends
        assert_eq!(list.update_at(Some(3), TestEntry::new("x", 0)).unwrap(), 3);
        assert_eq!(list.entry_count(), 4);
    }

    #[test]
    fn update_at_evicts_previous_key() {
        let mut list = make_list(3);
        list.update_at(Some(1), TestEntry::new("new", 7)).unwrap();
        assert_eq!(list.find("key-1").unwrap(), None);
        assert_eq!(list.find_index("new").unwrap(), Some(1));
        assert_eq!(list.entry_count(), 3);
    }

    #[test]
    fn duplicate_key_rejected() {
        let mut list = make_list(3);
        let err = list.update_at(None, TestEntry::new("key-0", 5)).unwrap_err();
        assert!(matches!(err, Error::KeyError(_)));

        let err = list.update("other", TestEntry::new("key-0", 5)).unwrap_err();
        assert!(matches!(err, Error::KeyError(_)));
    }

    #[test]
    fn remove_last_and_unknown() {
        let mut list = make_list(3);
        assert!(!list.remove("nope").unwrap());
        assert!(list.remove("key-2").unwrap());
        assert_eq!(list.entry_count(), 2);
        assert_eq!(list.get(2).unwrap(), None);

        list.get_hash().unwrap();
        assert_eq!(list.get_hash().unwrap(), make_list(2).get_hash().unwrap());
    }

    #[test]
    fn remove_before_flush() {
        let mut list = empty();
        for entry in make_entries(4) {
            list.update(&entry.key.clone(), entry).unwrap();
        }
        assert!(list.remove("key-1").unwrap());
        assert_eq!(list.find_index("key-3").unwrap(), Some(1));
        list.get_hash().unwrap();

        assert_eq!(list.count_leaves().unwrap(), 3);
        assert_eq!(list.get(1).unwrap(), Some(TestEntry::new("key-3", 3)));
        list.validate().unwrap();
    }

    #[test]
    fn remove_everything() {
        let mut list = make_list(4);
        for i in 0..4 {
            assert!(list.remove(&format!("key-{}", i)).unwrap());
        }
        assert_eq!(list.get_hash().unwrap(), NULL_HASH);
        assert_eq!(list.root(), None);
        assert_eq!(list.iter().count(), 0);
    }

    #[test]
    fn flush_is_idempotent() {
        let mut list = make_list(10);
        let store_size = list.store().len();
        let root = list.get_hash().unwrap();
        assert_eq!(list.get_hash().unwrap(), root);
        assert_eq!(list.store().len(), store_size);
    }

    #[test]
    fn flush_pins_new_leaves() {
        let list = make_list(3);
        assert_eq!(list.cache().len(), 3);
        let before = list.cache().stats().recent_hits();
        list.find("key-1").unwrap();
        assert_eq!(list.cache().stats().recent_hits(), before + 1);
    }

    #[test]
    fn iter_in_order() {
        let list = make_list(20);
        let values: Vec<TestEntry> = list.iter().map(|v| v.unwrap()).collect();
        assert_eq!(values, make_entries(20));

        let mut seen = 0;
        list.for_each(|_| seen += 1).unwrap();
        assert_eq!(seen, 20);
    }

    #[test]
    fn open_rebuilds_index() {
        let mut list = make_list(9);
        let root = list.get_hash().unwrap();

        let mut reopened: List =
            MerkleList::open(root, 9, list.store().clone(), list.cache().clone()).unwrap();
        assert_eq!(reopened.get_hash().unwrap(), root);
        assert_eq!(reopened.find_index("key-7").unwrap(), Some(7));
        assert_eq!(reopened.find("key-7").unwrap(), Some(TestEntry::new("key-7", 7)));
    }

    #[test]
    fn open_rejects_inconsistent_state() {
        let cache = Arc::new(StoreCache::default());
        assert!(List::open(NULL_HASH, 3, MemStore::new(), cache.clone()).is_err());
        assert!(List::open([1; 32], 0, MemStore::new(), cache.clone()).is_err());

        let list = make_list(4);
        let root = list.root().unwrap();
        let err = List::open(root, 5, list.store().clone(), cache).err().unwrap();
        assert!(err.is_integrity());
    }

    #[test]
    fn with_index_checks_count() {
        let list = make_list(2);
        let root = list.root().unwrap();
        let cache = list.cache().clone();
        let index = MemKeyIndex::new();
        assert!(
            MerkleList::with_index(root, 2, list.store().clone(), cache, index).is_err()
        );
    }

    #[test]
    fn missing_leaf_is_integrity_error() {
        let list = make_list(4);
        let path = list.accessor().build_tree_path(2).unwrap().unwrap();
        list.store().forget(&path.leaf_hash);
        list.cache().reset();

        assert!(list.find("key-2").unwrap_err().is_integrity());
        assert!(list.get(2).unwrap_err().is_integrity());
        assert!(list.count_leaves().unwrap_err().is_integrity());
    }
}
