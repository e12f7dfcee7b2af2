#[cfg(feature = "full")]
mod temp_store;

use std::sync::Arc;

use ed::{Decode, Encode};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::cache::StoreCache;
use crate::entry::Entry;
use crate::error::{IntegrityError, Result};
use crate::list::MerkleList;
use crate::store::MemStore;

#[cfg(feature = "full")]
pub use temp_store::TempStore;

/// A minimal entry: a string key and a numeric value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TestEntry {
    pub key: String,
    pub value: u64,
}

impl TestEntry {
    pub fn new(key: &str, value: u64) -> Self {
        TestEntry {
            key: key.to_string(),
            value,
        }
    }
}

impl Entry for TestEntry {
    fn key(&self) -> &str {
        &self.key
    }

    fn encode(&self, ordinal: u64) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(16 + self.key.len());
        ordinal.encode_into(&mut bytes)?;
        self.value.encode_into(&mut bytes)?;
        bytes.extend_from_slice(self.key.as_bytes());
        Ok(bytes)
    }

    fn decode(mut bytes: &[u8]) -> Result<Self> {
        let _ordinal: u64 = Decode::decode(&mut bytes)?;
        let value: u64 = Decode::decode(&mut bytes)?;
        let key = String::from_utf8(bytes.to_vec())
            .map_err(|err| IntegrityError::Decode(err.to_string()))?;
        Ok(TestEntry { key, value })
    }
}

/// Entries `key-0` to `key-{n-1}`, each valued by its index.
pub fn make_entries(n: u64) -> Vec<TestEntry> {
    (0..n)
        .map(|i| TestEntry::new(&format!("key-{}", i), i))
        .collect()
}

/// Returns `entries` in a random order derived from `seed`.
pub fn shuffled(mut entries: Vec<TestEntry>, seed: u64) -> Vec<TestEntry> {
    let mut rng = SmallRng::seed_from_u64(seed);
    entries.shuffle(&mut rng);
    entries
}

/// A hashed in-memory list holding `make_entries(n)`.
pub fn make_list(n: u64) -> MerkleList<TestEntry, MemStore> {
    let mut list = MerkleList::new(MemStore::new(), Arc::new(StoreCache::default()));
    for entry in make_entries(n) {
        list.update_at(None, entry).expect("update failed");
    }
    list.get_hash().expect("hashing failed");
    list
}
