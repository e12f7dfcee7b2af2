pub use thiserror::Error;

/// Errors meaning the stored tree can no longer be trusted. Callers driving
/// block processing must halt on these rather than skip the affected entry.
#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("Missing node {0}")]
    MissingNode(String),
    #[error("Unexpected node: {0}")]
    UnexpectedNode(String),
    #[error("Hash mismatch at level {level}, position {position}\n\tStored: {stored}\n\tComputed: {computed}")]
    HashMismatch {
        level: usize,
        position: usize,
        stored: String,
        computed: String,
    },
    #[error("Tree deeper than {0} levels")]
    TooDeep(usize),
    #[error("Decode Error: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Storage integrity failure: {0}")]
    Integrity(#[from] IntegrityError),
    #[error("Index OoB Error: {0}")]
    IndexOutOfBounds(String),
    #[error("Key Error: {0}")]
    KeyError(String),
    #[error("Proof Error: {0}")]
    ProofError(String),
    #[error("Proof did not match expected hash\n\tExpected: {0}\n\tActual: {1}")]
    ProofHashMismatch(String, String),
    #[error(transparent)]
    Encoding(#[from] ed::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "full")]
    #[error(transparent)]
    RocksDB(#[from] rocksdb::Error),
}

impl Error {
    /// Returns `true` for the corrupt-state class of errors.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Error::Integrity(_))
    }

    pub(crate) fn missing_node(hash: &crate::Hash) -> Self {
        IntegrityError::MissingNode(hex::encode(hash)).into()
    }

    pub(crate) fn unexpected_node(msg: String) -> Self {
        IntegrityError::UnexpectedNode(msg).into()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
