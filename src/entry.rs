use crate::error::{Error, IntegrityError, Result};

/// A decoded business record stored as one leaf of a list.
///
/// `encode` and `decode` must be pure, and `key` must not change for the
/// lifetime of the entry. The ordinal is part of the encoding, so the same
/// entry hashes differently at different positions.
pub trait Entry: Clone + Send + Sync + Sized {
    /// The business key (address, namespace, contract, ...).
    fn key(&self) -> &str;

    /// Encodes the entry as it sits at `ordinal`.
    fn encode(&self, ordinal: u64) -> Result<Vec<u8>>;

    /// Decodes an entry from the bytes produced by `encode`.
    fn decode(bytes: &[u8]) -> Result<Self>;
}

/// Decodes a leaf read back from a store. Bytes that were hashed into the tree
/// but no longer decode mean the stored state is corrupt.
pub(crate) fn decode_leaf<V: Entry>(bytes: &[u8]) -> Result<V> {
    V::decode(bytes).map_err(|err| match err {
        Error::Integrity(_) => err,
        other => IntegrityError::Decode(other.to_string()).into(),
    })
}
