use super::hash::Hash;

/// One branch visited on the way from the root to a leaf.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathBranch {
    pub hash: Hash,
    pub left: Hash,
    pub right: Option<Hash>,
}

/// The ordered root-to-leaf path to a single ordinal: every branch visited,
/// followed by the leaf itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreePath {
    pub root: Hash,
    pub branches: Vec<PathBranch>,
    pub leaf_hash: Hash,
    pub leaf: Vec<u8>,
}

impl TreePath {
    /// Number of branches between the root and the leaf, the root included.
    pub fn depth(&self) -> usize {
        self.branches.len()
    }
}
