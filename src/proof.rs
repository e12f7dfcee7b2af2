//! The external, self-describing form of a partial tree and its verifier.
//!
//! Each node is a map holding its `hash`, and either `left`, `right` and
//! `binary` for a branch or `value` and `binary` for a leaf. `binary` is the
//! exact byte string hashed to produce `hash`. A node holding only `hash` is
//! a pruned subtree, trusted as stated. A leaf's `value` is only trusted
//! once it is checked against the entry decoded from its `binary`. Hashes
//! and binaries are URL-safe unpadded base64.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::base64::{Base64, UrlSafe};
use serde_with::formats::Unpadded;
use serde_with::serde_as;

use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::tree::{branch_hash, leaf_hash, Hash, MAX_DEPTH};

#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProofNode {
    #[serde_as(as = "Base64<UrlSafe, Unpadded>")]
    pub hash: Hash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<Box<ProofNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<Box<ProofNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde_as(as = "Option<Base64<UrlSafe, Unpadded>>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<Vec<u8>>,
}

impl ProofNode {
    /// A pruned subtree known only by its hash.
    pub fn pruned(hash: Hash) -> Self {
        ProofNode {
            hash,
            left: None,
            right: None,
            value: None,
            binary: None,
        }
    }

    /// Recomputes this node's hash from its content, bottom-up, and returns
    /// the entries it proves in left-to-right order once every level matches.
    ///
    /// A leaf's `binary` is decoded as a `V` and must satisfy `leaf_matches`
    /// against the leaf's `value`. Leaves must all sit at the same depth, below
    /// the root, and no pruned subtree may sit deeper than them.
    pub fn verify<V, F>(&self, leaf_matches: F) -> Result<Vec<V>>
    where
        V: Entry,
        F: Fn(&V, &Value) -> bool,
    {
        let mut walk = Walk {
            leaf_matches,
            leaf_depth: None,
            pruned_depth: 0,
            entries: vec![],
        };
        let hash = walk.node(self, 0)?;
        check_hash(&self.hash, hash)?;

        match walk.leaf_depth {
            None => Err(Error::ProofError("proof holds no leaves".to_string())),
            Some(depth) if walk.pruned_depth > depth => Err(Error::ProofError(format!(
                "pruned subtree at depth {} below leaves at depth {}",
                walk.pruned_depth, depth
            ))),
            Some(_) => Ok(walk.entries),
        }
    }
}

struct Walk<V, F> {
    leaf_matches: F,
    leaf_depth: Option<usize>,
    pruned_depth: usize,
    entries: Vec<V>,
}

impl<V, F> Walk<V, F>
where
    V: Entry,
    F: Fn(&V, &Value) -> bool,
{
    fn node(&mut self, node: &ProofNode, depth: usize) -> Result<Hash> {
        if depth > MAX_DEPTH {
            return Err(Error::ProofError(format!(
                "proof deeper than {} levels",
                MAX_DEPTH
            )));
        }

        match (&node.left, &node.right, &node.value) {
            (Some(_), _, Some(_)) | (None, Some(_), Some(_)) => Err(Error::ProofError(format!(
                "node {} holds both children and a value",
                hex::encode(node.hash)
            ))),
            (None, Some(_), None) => Err(Error::ProofError(format!(
                "branch {} has a right child but no left child",
                hex::encode(node.hash)
            ))),
            (Some(left), right, None) => self.branch(node, left, right.as_deref(), depth),
            (None, None, Some(value)) => self.leaf(node, value, depth),
            (None, None, None) => {
                if node.binary.is_some() {
                    return Err(Error::ProofError(format!(
                        "leaf {} has no value",
                        hex::encode(node.hash)
                    )));
                }
                self.pruned_depth = self.pruned_depth.max(depth);
                Ok(node.hash)
            }
        }
    }

    fn branch(
        &mut self,
        node: &ProofNode,
        left: &ProofNode,
        right: Option<&ProofNode>,
        depth: usize,
    ) -> Result<Hash> {
        let left = self.node(left, depth + 1)?;
        let right = match right {
            Some(right) => Some(self.node(right, depth + 1)?),
            None => None,
        };

        let mut expected = left.to_vec();
        if let Some(right) = &right {
            expected.extend_from_slice(right);
        }
        if let Some(binary) = &node.binary {
            if binary != &expected {
                return Err(Error::ProofError(format!(
                    "branch {} does not hash its children",
                    hex::encode(node.hash)
                )));
            }
        }

        check_hash(&node.hash, branch_hash(&left, right.as_ref()))
    }

    fn leaf(&mut self, node: &ProofNode, value: &Value, depth: usize) -> Result<Hash> {
        let binary = match &node.binary {
            Some(binary) => binary,
            None => {
                return Err(Error::ProofError(format!(
                    "leaf {} has a value but no binary",
                    hex::encode(node.hash)
                )))
            }
        };
        if depth == 0 {
            return Err(Error::ProofError("leaf at the root".to_string()));
        }
        match self.leaf_depth {
            Some(leaf_depth) if leaf_depth != depth => {
                return Err(Error::ProofError(format!(
                    "leaf {} at depth {}, others at depth {}",
                    hex::encode(node.hash),
                    depth,
                    leaf_depth
                )))
            }
            _ => self.leaf_depth = Some(depth),
        }

        let hash = check_hash(&node.hash, leaf_hash(binary))?;
        let entry = V::decode(binary).map_err(|err| {
            Error::ProofError(format!(
                "leaf {} does not decode: {}",
                hex::encode(node.hash),
                err
            ))
        })?;
        if !(self.leaf_matches)(&entry, value) {
            return Err(Error::ProofError(format!(
                "leaf {} value does not match its binary",
                hex::encode(node.hash)
            )));
        }
        self.entries.push(entry);
        Ok(hash)
    }
}

fn check_hash(stated: &Hash, computed: Hash) -> Result<Hash> {
    if stated != &computed {
        return Err(Error::ProofHashMismatch(
            hex::encode(stated),
            hex::encode(computed),
        ));
    }
    Ok(computed)
}

/// Verifies a partial tree in its external form against a trusted root and
/// returns the entries it proves, in ordinal order. `leaf_matches` ties each
/// leaf's JSON `value` to the entry decoded from its `binary`.
pub fn verify_map<V, F>(map: &Value, expected_root: &Hash, leaf_matches: F) -> Result<Vec<V>>
where
    V: Entry,
    F: Fn(&V, &Value) -> bool,
{
    let node = ProofNode::deserialize(map)?;
    if &node.hash != expected_root {
        return Err(Error::ProofHashMismatch(
            hex::encode(expected_root),
            hex::encode(node.hash),
        ));
    }
    node.verify(leaf_matches)
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::test_utils::TestEntry;

    fn same_value(entry: &TestEntry, value: &Value) -> bool {
        value == &json!(entry.value)
    }

    fn leaf(ordinal: u64, key: &str) -> ProofNode {
        let entry = TestEntry::new(key, ordinal);
        let bytes = entry.encode(ordinal).unwrap();
        ProofNode {
            hash: leaf_hash(&bytes),
            left: None,
            right: None,
            value: Some(json!(entry.value)),
            binary: Some(bytes),
        }
    }

    fn branch(left: ProofNode, right: Option<ProofNode>) -> ProofNode {
        let hash = branch_hash(&left.hash, right.as_ref().map(|r| &r.hash));
        let mut binary = left.hash.to_vec();
        if let Some(right) = &right {
            binary.extend_from_slice(&right.hash);
        }
        ProofNode {
            hash,
            left: Some(Box::new(left)),
            right: right.map(Box::new),
            value: None,
            binary: Some(binary),
        }
    }

    fn hash_of(ordinal: u64, key: &str) -> Hash {
        leaf(ordinal, key).hash
    }

    fn verify(node: &ProofNode) -> Result<Vec<TestEntry>> {
        let map = serde_json::to_value(node).unwrap();
        verify_map(&map, &node.hash, same_value)
    }

    #[test]
    fn verify_with_pruned_sibling() {
        let root = branch(
            branch(leaf(0, "a"), Some(ProofNode::pruned(hash_of(1, "b")))),
            Some(ProofNode::pruned([7; 32])),
        );
        assert_eq!(verify(&root).unwrap(), vec![TestEntry::new("a", 0)]);
    }

    #[test]
    fn external_form_fields() {
        let root = branch(leaf(0, "a"), None);
        let map = serde_json::to_value(&root).unwrap();

        assert!(map.get("value").is_none());
        assert!(map.get("right").is_none());
        let hash = map["hash"].as_str().unwrap();
        assert_eq!(hash.len(), 43);
        assert!(!hash.contains('='));
        assert_eq!(map["left"]["value"], json!(0));

        let parsed: ProofNode = serde_json::from_value(map).unwrap();
        assert_eq!(parsed, root);
    }

    #[test]
    fn tampered_leaf_fails() {
        let mut a = leaf(0, "a");
        a.binary = Some(TestEntry::new("x", 0).encode(0).unwrap());
        let root = branch(a, None);
        match verify(&root).unwrap_err() {
            Error::ProofHashMismatch(stated, computed) => {
                assert_eq!(stated, hex::encode(hash_of(0, "a")));
                assert_eq!(computed, hex::encode(hash_of(0, "x")));
            }
            err => panic!("unexpected error: {}", err),
        }
    }

    #[test]
    fn wrong_root_fails() {
        let root = branch(leaf(0, "a"), Some(leaf(1, "b")));
        let map = serde_json::to_value(&root).unwrap();
        assert!(matches!(
            verify_map(&map, &[0; 32], same_value).unwrap_err(),
            Error::ProofHashMismatch(_, _)
        ));
    }

    #[test]
    fn malformed_map_fails() {
        assert!(verify_map(&json!({ "hash": "not base64!" }), &[0; 32], same_value).is_err());
        assert!(verify_map(&json!([1, 2, 3]), &[0; 32], same_value).is_err());
    }

    #[test]
    fn value_without_binary_fails() {
        let mut root = branch(leaf(0, "a"), Some(ProofNode::pruned(hash_of(1, "b"))));
        root.right = Some(Box::new(ProofNode {
            value: Some(json!(1)),
            ..ProofNode::pruned(hash_of(1, "b"))
        }));
        assert!(matches!(verify(&root).unwrap_err(), Error::ProofError(_)));
    }

    #[test]
    fn value_not_matching_binary_fails() {
        let mut a = leaf(0, "a");
        a.value = Some(json!(1000));
        let root = branch(a, Some(leaf(1, "b")));
        assert!(matches!(verify(&root).unwrap_err(), Error::ProofError(_)));
    }

    #[test]
    fn branch_posing_as_leaf_fails() {
        let inner = branch(leaf(0, "a"), Some(leaf(1, "b")));
        let forged = ProofNode {
            value: Some(json!(5)),
            binary: inner.binary.clone(),
            ..ProofNode::pruned(inner.hash)
        };

        let root = branch(forged, None);
        assert!(matches!(verify(&root).unwrap_err(), Error::ProofError(_)));
    }

    #[test]
    fn value_beside_children_fails() {
        let mut root = branch(leaf(0, "a"), Some(leaf(1, "b")));
        root.value = Some(json!(0));
        assert!(matches!(verify(&root).unwrap_err(), Error::ProofError(_)));
    }

    #[test]
    fn uneven_leaves_fail() {
        let root = branch(branch(leaf(0, "a"), None), Some(leaf(1, "b")));
        assert!(matches!(verify(&root).unwrap_err(), Error::ProofError(_)));
    }

    #[test]
    fn pruned_only_proves_nothing() {
        let root = branch(ProofNode::pruned(hash_of(0, "a")), None);
        assert!(matches!(verify(&root).unwrap_err(), Error::ProofError(_)));
    }
}
