use std::io::{Read, Write};

use ed::{Decode, Encode, Terminated};

use super::hash::{branch_hash, leaf_hash, Hash, HASH_LENGTH};

const BRANCH_TAG: u8 = 0x01;
const LEAF_TAG: u8 = 0x02;

/// A stored tree node. Nodes refer to their children by hash, so a node is
/// identified by the hash of its hashable bytes (see `Node::binary`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// An internal node. `right` is absent when the level below has an odd
    /// number of nodes and this branch wraps the last one alone.
    Branch { left: Hash, right: Option<Hash> },

    /// An encoded entry, as produced by `Entry::encode`.
    Leaf(Vec<u8>),
}

impl Node {
    /// Creates a branch node.
    #[inline]
    pub fn branch(left: Hash, right: Option<Hash>) -> Self {
        Node::Branch { left, right }
    }

    /// Computes the hash which identifies this node in a store.
    pub fn hash(&self) -> Hash {
        match self {
            Node::Branch { left, right } => branch_hash(left, right.as_ref()),
            Node::Leaf(bytes) => leaf_hash(bytes),
        }
    }

    /// Returns the exact byte string digested by `hash`.
    pub fn binary(&self) -> Vec<u8> {
        match self {
            Node::Branch { left, right } => {
                let mut bytes = Vec::with_capacity(HASH_LENGTH * 2);
                bytes.extend_from_slice(left);
                if let Some(right) = right {
                    bytes.extend_from_slice(right);
                }
                bytes
            }
            Node::Leaf(bytes) => bytes.clone(),
        }
    }

    /// Returns the hash of the child on the given side, if any. Leaves have no
    /// children.
    pub fn child(&self, left: bool) -> Option<&Hash> {
        match self {
            Node::Branch { left: l, .. } if left => Some(l),
            Node::Branch { right, .. } => right.as_ref(),
            Node::Leaf(_) => None,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }
}

impl Encode for Node {
    fn encode_into<W: Write>(&self, dest: &mut W) -> ed::Result<()> {
        match self {
            Node::Branch { left, right } => {
                dest.write_all(&[BRANCH_TAG])?;
                dest.write_all(left)?;
                match right {
                    Some(right) => {
                        dest.write_all(&[1])?;
                        dest.write_all(right)?;
                    }
                    None => dest.write_all(&[0])?,
                }
            }
            Node::Leaf(bytes) => {
                dest.write_all(&[LEAF_TAG])?;
                (bytes.len() as u32).encode_into(dest)?;
                dest.write_all(bytes)?;
            }
        }
        Ok(())
    }

    fn encoding_length(&self) -> ed::Result<usize> {
        Ok(match self {
            Node::Branch { right: Some(_), .. } => 2 + HASH_LENGTH * 2,
            Node::Branch { right: None, .. } => 2 + HASH_LENGTH,
            Node::Leaf(bytes) => 5 + bytes.len(),
        })
    }
}

impl Decode for Node {
    fn decode<R: Read>(mut input: R) -> ed::Result<Self> {
        let tag: u8 = Decode::decode(&mut input)?;

        Ok(match tag {
            BRANCH_TAG => {
                let mut left = [0; HASH_LENGTH];
                input.read_exact(&mut left)?;

                let has_right: u8 = Decode::decode(&mut input)?;
                let right = match has_right {
                    0 => None,
                    1 => {
                        let mut right = [0; HASH_LENGTH];
                        input.read_exact(&mut right)?;
                        Some(right)
                    }
                    byte => return Err(ed::Error::UnexpectedByte(byte)),
                };

                Node::Branch { left, right }
            }
            LEAF_TAG => {
                let len: u32 = Decode::decode(&mut input)?;
                let mut bytes = vec![0; len as usize];
                input.read_exact(bytes.as_mut_slice())?;
                Node::Leaf(bytes)
            }
            byte => return Err(ed::Error::UnexpectedByte(byte)),
        })
    }
}

impl Terminated for Node {}
