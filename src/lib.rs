//! A content-addressed Merkle list store.
//!
//! A [`MerkleList`] is a string-keyed, ordinal-addressed collection of
//! entries whose content is committed to by the root of a binary Merkle tree.
//! Tree nodes live in a [`NodeStore`] under their own hash, so every copy of a
//! list, and every historical state, shares unchanged subtrees.

pub mod cache;
pub mod config;
mod entry;
mod error;
pub mod index;
pub mod list;
pub mod proof;
pub mod store;
pub mod tree;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use cache::StoreCache;
pub use config::CacheConfig;
pub use entry::Entry;
pub use error::{Error, IntegrityError, Result};
pub use index::{IndexEntry, KeyIndex, MemKeyIndex};
pub use list::{MerkleList, PartialNode, PartialTree};
pub use proof::{verify_map, ProofNode};
pub use store::{MemStore, NodeStore};
pub use tree::{Hash, Node, HASH_LENGTH, NULL_HASH};

#[cfg(feature = "full")]
pub use store::RocksStore;
