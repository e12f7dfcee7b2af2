/// Default number of decoded entries kept by a `StoreCache`'s LRU layer.
pub const DEFAULT_LRU_CAPACITY: usize = 10_000;

/// Default number of entries pinned for the most recent block.
pub const DEFAULT_RECENT_CAPACITY: usize = 4_096;

/// Sizing for a `StoreCache`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    /// Entries kept in the LRU layer. Zero is treated as one.
    pub lru_capacity: usize,
    /// Entries pinned for the most recent block before further pins spill
    /// into the LRU layer.
    pub recent_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            lru_capacity: DEFAULT_LRU_CAPACITY,
            recent_capacity: DEFAULT_RECENT_CAPACITY,
        }
    }
}
