#![allow(dead_code)]

use std::sync::Arc;

use merkle_list::test_utils::TestEntry;
use merkle_list::{Entry, Hash, MemStore, MerkleList, NodeStore, StoreCache};

pub type TestList = MerkleList<TestEntry, MemStore>;

pub fn new_list() -> TestList {
    MerkleList::new(MemStore::new(), Arc::new(StoreCache::default()))
}

/// Builds a fresh list from `entries` in order and returns its root.
pub fn root_of(entries: &[TestEntry]) -> Hash {
    let mut list = new_list();
    for entry in entries {
        list.update_at(None, entry.clone()).expect("update failed");
    }
    list.get_hash().expect("hashing failed")
}

/// Committed entries of `list` in ordinal order.
pub fn contents<S: NodeStore>(list: &MerkleList<TestEntry, S>) -> Vec<TestEntry> {
    list.iter()
        .collect::<merkle_list::Result<Vec<TestEntry>>>()
        .expect("walk failed")
}

/// Asserts the list's root matches a list rebuilt from its own contents, and
/// that every entry is found by key at its ordinal.
pub fn assert_consistent<S: NodeStore>(list: &mut MerkleList<TestEntry, S>) {
    let root = list.get_hash().expect("hashing failed");
    let entries = contents(list);
    assert_eq!(entries.len() as u64, list.entry_count());
    assert_eq!(root, root_of(&entries));

    for (ordinal, entry) in entries.iter().enumerate() {
        assert_eq!(list.find_index(entry.key()).unwrap(), Some(ordinal as u64));
        assert_eq!(list.find(entry.key()).unwrap().as_ref(), Some(entry));
    }
    list.validate().expect("invalid tree");
}
