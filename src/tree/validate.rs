use super::hash::Hash;
use super::node::Node;
use crate::error::{IntegrityError, Result};
use crate::store::NodeStore;

/// Deepest tree that can be addressed by a `u64` ordinal, root included.
pub const MAX_DEPTH: usize = 64;

/// Walks every node reachable from `root`, recomputing each hash from the
/// node's content and comparing it with the hash it is stored under. Returns
/// the number of leaves checked.
///
/// Failures are reported by depth below the root and by left-to-right
/// position at that depth.
pub fn validate<S: NodeStore>(store: &S, root: &Hash) -> Result<u64> {
    let leaves = validate_node(store, root, 0, 0)?;
    log::debug!("validated tree {} with {} leaves", hex::encode(root), leaves);
    Ok(leaves)
}

fn validate_node<S: NodeStore>(store: &S, hash: &Hash, depth: usize, position: usize) -> Result<u64> {
    if depth > MAX_DEPTH {
        log::warn!("tree below {} is deeper than {}", hex::encode(hash), MAX_DEPTH);
        return Err(IntegrityError::TooDeep(MAX_DEPTH).into());
    }

    let node = store.fetch(hash)?;
    let computed = node.hash();
    if &computed != hash {
        log::warn!(
            "hash mismatch at depth {}, position {}: stored under {}, content hashes to {}",
            depth,
            position,
            hex::encode(hash),
            hex::encode(computed)
        );
        return Err(IntegrityError::HashMismatch {
            level: depth,
            position,
            stored: hex::encode(hash),
            computed: hex::encode(computed),
        }
        .into());
    }

    match node {
        Node::Leaf(_) => Ok(1),
        Node::Branch { left, right } => {
            let mut leaves = validate_node(store, &left, depth + 1, position * 2)?;
            if let Some(right) = right {
                leaves += validate_node(store, &right, depth + 1, position * 2 + 1)?;
            }
            Ok(leaves)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Error;
    use crate::store::MemStore;

    fn small_tree(store: &MemStore) -> (Hash, Vec<Node>) {
        let leaves: Vec<Node> = (0..3u8).map(|i| Node::Leaf(vec![i])).collect();
        for leaf in leaves.iter() {
            store.put(&leaf.hash(), leaf).unwrap();
        }
        let a = Node::branch(leaves[0].hash(), Some(leaves[1].hash()));
        let b = Node::branch(leaves[2].hash(), None);
        let root = Node::branch(a.hash(), Some(b.hash()));
        for node in [&a, &b, &root].iter() {
            store.put(&node.hash(), node).unwrap();
        }
        (root.hash(), leaves)
    }

    #[test]
    fn valid_tree() {
        let store = MemStore::new();
        let (root, _) = small_tree(&store);
        assert_eq!(validate(&store, &root).unwrap(), 3);
    }

    #[test]
    fn tampered_leaf() {
        let store = MemStore::new();
        let (root, leaves) = small_tree(&store);
        store.overwrite(&leaves[2].hash(), Node::Leaf(vec![9]));

        match validate(&store, &root).unwrap_err() {
            Error::Integrity(IntegrityError::HashMismatch {
                level, position, ..
            }) => {
                assert_eq!(level, 2);
                assert_eq!(position, 2);
            }
            err => panic!("unexpected error: {}", err),
        }
    }

    #[test]
    fn missing_leaf() {
        let store = MemStore::new();
        let (root, leaves) = small_tree(&store);
        store.forget(&leaves[0].hash());
        assert!(validate(&store, &root).unwrap_err().is_integrity());
    }
}
