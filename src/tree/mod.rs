//! The binary Merkle tree behind every list: hashing rules, node encoding,
//! positional access, incremental rehashing, and leaf walks.

mod accessor;
mod engine;
mod hash;
mod node;
mod path;
mod validate;
mod walk;

pub use accessor::DirectAccessor;
pub use engine::{compute_hashes_from_changes, Change, HashTree, LeafSource, OverlayHashTree};
pub use hash::{
    branch_hash, leaf_hash, levels, nodes_at_level, to_hex, Hash, Hasher, HASH_LENGTH, NULL_HASH,
};
pub use node::Node;
pub use path::{PathBranch, TreePath};
pub use validate::{validate, MAX_DEPTH};
pub use walk::{Leaf, LeafWalker, ParLeaves};
