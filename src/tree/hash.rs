use sha2::{Digest, Sha256};

/// The hash algorithm used for both leaf hashes and branch hashes.
pub type Hasher = Sha256;

/// The length of a `Hash` (in bytes).
pub const HASH_LENGTH: usize = 32;

/// A zero-filled `Hash`. Stands for the root of an empty tree.
pub const NULL_HASH: Hash = [0; HASH_LENGTH];

/// A cryptographic hash digest.
pub type Hash = [u8; HASH_LENGTH];

/// Hashes the encoded bytes of a leaf entry.
pub fn leaf_hash(bytes: &[u8]) -> Hash {
    let mut hasher = Hasher::new();
    hasher.update(bytes);

    let res = hasher.finalize();
    let mut hash: Hash = Default::default();
    hash.copy_from_slice(&res[..]);
    hash
}

/// Hashes a branch from the hash of its left child and the hash of its right
/// child (if any). A missing right child contributes no bytes.
pub fn branch_hash(left: &Hash, right: Option<&Hash>) -> Hash {
    let mut hasher = Hasher::new();
    hasher.update(left);
    if let Some(right) = right {
        hasher.update(right);
    }

    let res = hasher.finalize();
    let mut hash: Hash = Default::default();
    hash.copy_from_slice(&res[..]);
    hash
}

/// Number of levels in a tree holding `entry_count` leaves, counting the leaf
/// level and the root level.
///
/// Every node on a network has to agree on this mapping bit for bit, since it
/// decides where each leaf sits and therefore the root hash. A single leaf
/// still sits under one branch.
pub fn levels(entry_count: u64) -> u32 {
    match entry_count {
        0 => 0,
        1 => 2,
        n => 65 - (n - 1).leading_zeros(),
    }
}

/// Number of nodes at `level` (0 being the leaves) of a tree holding
/// `entry_count` leaves.
pub fn nodes_at_level(level: u32, entry_count: u64) -> u64 {
    if entry_count == 0 {
        return 0;
    }
    if level >= 64 {
        return 1;
    }
    ((entry_count - 1) >> level) + 1
}

/// Formats a hash as lowercase hex.
pub fn to_hex(hash: &Hash) -> String {
    hex::encode(hash)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn levels_small_counts() {
        assert_eq!(levels(0), 0);
        assert_eq!(levels(1), 2);
        assert_eq!(levels(2), 2);
        assert_eq!(levels(3), 3);
        assert_eq!(levels(4), 3);
        assert_eq!(levels(5), 4);
        assert_eq!(levels(8), 4);
        assert_eq!(levels(9), 5);
        assert_eq!(levels(1024), 11);
        assert_eq!(levels(1025), 12);
    }

    #[test]
    fn levels_cover_entry_count() {
        for n in 2..5000u64 {
            let l = levels(n);
            assert!(1u64 << (l - 1) >= n, "too few levels for {}", n);
            assert!(1u64 << (l - 2) < n, "too many levels for {}", n);
        }
    }

    #[test]
    fn levels_extremes() {
        assert_eq!(levels(u64::MAX), 65);
        assert_eq!(levels(1 << 63), 64);
        assert_eq!(levels((1 << 63) + 1), 65);
    }

    #[test]
    fn nodes_per_level() {
        assert_eq!(nodes_at_level(0, 0), 0);
        assert_eq!(nodes_at_level(0, 5), 5);
        assert_eq!(nodes_at_level(1, 5), 3);
        assert_eq!(nodes_at_level(2, 5), 2);
        assert_eq!(nodes_at_level(3, 5), 1);
        assert_eq!(nodes_at_level(1, 2), 1);
        assert_eq!(nodes_at_level(1, 1), 1);
        assert_eq!(nodes_at_level(70, 9), 1);
    }

    #[test]
    fn branch_without_right() {
        let left = leaf_hash(b"foo");
        assert_eq!(branch_hash(&left, None), leaf_hash(&left));

        let right = leaf_hash(b"bar");
        let mut joined = left.to_vec();
        joined.extend_from_slice(&right);
        assert_eq!(branch_hash(&left, Some(&right)), leaf_hash(&joined));
    }

    #[test]
    fn known_digest() {
        assert_eq!(
            to_hex(&leaf_hash(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
