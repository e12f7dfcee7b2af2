use std::collections::HashMap;
use std::fmt;

use colored::Colorize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::proof::ProofNode;
use crate::tree::{branch_hash, leaf_hash, Hash, TreePath};

/// A node held by a `PartialTree`.
#[derive(Clone, Debug, PartialEq)]
pub enum PartialNode<V> {
    Branch { left: Hash, right: Option<Hash> },
    Leaf { value: V, bytes: Vec<u8> },
}

impl<V> PartialNode<V> {
    /// The exact bytes hashed to produce this node's hash.
    pub fn binary(&self) -> Vec<u8> {
        match self {
            PartialNode::Branch { left, right } => {
                let mut bytes = left.to_vec();
                if let Some(right) = right {
                    bytes.extend_from_slice(right);
                }
                bytes
            }
            PartialNode::Leaf { bytes, .. } => bytes.clone(),
        }
    }
}

/// The nodes needed to prove a set of entries are part of the tree with a
/// given root: the merged root-to-leaf paths of every entry. Children off
/// those paths are known only by hash.
pub struct PartialTree<V> {
    root: Hash,
    nodes: HashMap<Hash, PartialNode<V>>,
}

impl<V> PartialTree<V> {
    pub fn new(root: Hash) -> Self {
        PartialTree {
            root,
            nodes: HashMap::new(),
        }
    }

    #[inline]
    pub fn root(&self) -> Hash {
        self.root
    }

    /// Number of materialized nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, hash: &Hash) -> Option<&PartialNode<V>> {
        self.nodes.get(hash)
    }

    /// Values of the leaves held, in no particular order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.nodes.values().filter_map(|node| match node {
            PartialNode::Leaf { value, .. } => Some(value),
            PartialNode::Branch { .. } => None,
        })
    }

    /// Merges the path to one leaf into the tree. Nodes shared with paths
    /// already added are kept once.
    pub fn add_path(&mut self, path: TreePath, value: V) -> Result<()> {
        if path.root != self.root {
            return Err(Error::ProofError(format!(
                "path from root {} added to tree with root {}",
                hex::encode(path.root),
                hex::encode(self.root)
            )));
        }

        for branch in path.branches {
            self.nodes
                .entry(branch.hash)
                .or_insert(PartialNode::Branch {
                    left: branch.left,
                    right: branch.right,
                });
        }
        self.nodes
            .entry(path.leaf_hash)
            .or_insert(PartialNode::Leaf {
                value,
                bytes: path.leaf,
            });
        Ok(())
    }

    /// Recomputes every held node's hash bottom-up and checks it against the
    /// hash it is held under, up to the root.
    pub fn verify(&self) -> Result<Hash> {
        self.verify_node(&self.root)
    }

    fn verify_node(&self, hash: &Hash) -> Result<Hash> {
        let computed = match self.nodes.get(hash) {
            None => return Ok(*hash),
            Some(PartialNode::Leaf { bytes, .. }) => leaf_hash(bytes),
            Some(PartialNode::Branch { left, right }) => {
                let left = self.verify_node(left)?;
                let right = match right {
                    Some(right) => Some(self.verify_node(right)?),
                    None => None,
                };
                branch_hash(&left, right.as_ref())
            }
        };

        if &computed != hash {
            return Err(Error::ProofHashMismatch(
                hex::encode(hash),
                hex::encode(computed),
            ));
        }
        Ok(computed)
    }

    /// Builds the external form, rendering leaf values with `leaf_to_json`.
    pub fn to_proof<F>(&self, leaf_to_json: F) -> ProofNode
    where
        F: Fn(&V) -> Value,
    {
        self.proof_node(&self.root, &leaf_to_json)
    }

    fn proof_node<F>(&self, hash: &Hash, leaf_to_json: &F) -> ProofNode
    where
        F: Fn(&V) -> Value,
    {
        let node = match self.nodes.get(hash) {
            Some(node) => node,
            None => return ProofNode::pruned(*hash),
        };

        let mut proof = ProofNode::pruned(*hash);
        proof.binary = Some(node.binary());
        match node {
            PartialNode::Branch { left, right } => {
                proof.left = Some(Box::new(self.proof_node(left, leaf_to_json)));
                proof.right = right.map(|right| Box::new(self.proof_node(&right, leaf_to_json)));
            }
            PartialNode::Leaf { value, .. } => proof.value = Some(leaf_to_json(value)),
        }
        proof
    }

    /// The external form as a JSON value.
    pub fn to_value<F>(&self, leaf_to_json: F) -> Result<Value>
    where
        F: Fn(&V) -> Value,
    {
        Ok(serde_json::to_value(self.to_proof(leaf_to_json))?)
    }
}

impl<V: fmt::Debug> fmt::Debug for PartialTree<V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fn traverse<V: fmt::Debug>(
            f: &mut fmt::Formatter,
            tree: &PartialTree<V>,
            hash: &Hash,
            depth: usize,
            left: bool,
        ) -> fmt::Result {
            let node = tree.nodes.get(hash);

            if let Some(PartialNode::Branch { left, .. }) = node {
                traverse(f, tree, left, depth + 1, true)?;
            }

            for _ in 1..depth {
                write!(f, "{}", "    ".dimmed())?;
            }
            let prefix = if depth == 0 {
                ""
            } else if left {
                " ┌-"
            } else {
                " └-"
            };
            let short = hex::encode(&hash[..4]);
            let label = match node {
                Some(PartialNode::Branch { .. }) => short.normal().to_string(),
                Some(PartialNode::Leaf { value, .. }) => {
                    format!("{} {:?}", short, value).on_bright_black().to_string()
                }
                None => short.blue().to_string(),
            };
            writeln!(f, "{}{}", prefix.dimmed(), label)?;

            if let Some(PartialNode::Branch {
                right: Some(right), ..
            }) = node
            {
                traverse(f, tree, right, depth + 1, false)?;
            }
            Ok(())
        }

        traverse(f, self, &self.root, 0, false)
    }
}
