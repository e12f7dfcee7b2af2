use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::{Mutex, RwLock};

use crate::config::CacheConfig;
use crate::error::Result;
use crate::tree::Hash;

/// A cache of decoded entries keyed by the hash of their leaf.
///
/// Content addressing makes `hash -> entry` a pure mapping, so one cache can
/// safely be shared by every list (and every copy of a list) in a process,
/// typically behind an `Arc`.
///
/// Lookups check two layers in turn:
/// 1. the recent layer, holding entries pinned for the block being built
///    and cleared at block boundaries
/// 2. an LRU of everything else loaded or written
pub struct StoreCache<V> {
    lru: Mutex<LruCache<Hash, V>>,
    recent: RwLock<HashMap<Hash, V>>,
    recent_capacity: usize,
    stats: CacheStats,
}

/// Hit and miss counters, for monitoring cache effectiveness.
#[derive(Debug, Default)]
pub struct CacheStats {
    recent_hits: AtomicU64,
    lru_hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    pub fn recent_hits(&self) -> u64 {
        self.recent_hits.load(Ordering::Relaxed)
    }

    pub fn lru_hits(&self) -> u64 {
        self.lru_hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

impl<V: Clone> StoreCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.lru_capacity).unwrap_or(NonZeroUsize::MIN);
        StoreCache {
            lru: Mutex::new(LruCache::new(capacity)),
            recent: RwLock::new(HashMap::with_capacity(config.recent_capacity)),
            recent_capacity: config.recent_capacity,
            stats: CacheStats::default(),
        }
    }

    /// Looks up `hash` without loading anything on a miss.
    pub fn get(&self, hash: &Hash) -> Option<V> {
        if let Some(value) = self.recent.read().get(hash) {
            self.stats.recent_hits.fetch_add(1, Ordering::Relaxed);
            return Some(value.clone());
        }
        if let Some(value) = self.lru.lock().get(hash) {
            self.stats.lru_hits.fetch_add(1, Ordering::Relaxed);
            return Some(value.clone());
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Looks up `hash`, falling back to `load` on a miss. A loaded value is
    /// cached before being returned; a failed or empty load caches nothing.
    pub fn get_or_load<F>(&self, hash: &Hash, load: F) -> Result<Option<V>>
    where
        F: FnOnce() -> Result<Option<V>>,
    {
        if let Some(value) = self.get(hash) {
            return Ok(Some(value));
        }

        let value = load()?;
        if let Some(value) = &value {
            self.insert(*hash, value.clone());
        }
        Ok(value)
    }

    /// Caches a value in the LRU layer.
    pub fn insert(&self, hash: Hash, value: V) {
        self.lru.lock().put(hash, value);
    }

    /// Keeps a value resident until the next `clear_recent`. Once the recent
    /// layer is full, further values go to the LRU layer instead.
    pub fn pin(&self, hash: Hash, value: V) {
        let mut recent = self.recent.write();
        if recent.len() < self.recent_capacity || recent.contains_key(&hash) {
            recent.insert(hash, value);
        } else {
            drop(recent);
            self.insert(hash, value);
        }
    }

    /// Ends a block: unpins everything, demoting it to the LRU layer.
    pub fn clear_recent(&self) {
        let pinned: Vec<(Hash, V)> = self.recent.write().drain().collect();
        let demoted = pinned.len();
        let mut lru = self.lru.lock();
        for (hash, value) in pinned {
            lru.put(hash, value);
        }
        log::debug!("cleared {} recent cache entries", demoted);
    }

    /// Drops every cached value, e.g. when a different chain is loaded.
    pub fn reset(&self) {
        self.recent.write().clear();
        self.lru.lock().clear();
        log::debug!("reset store cache");
    }

    /// Number of cached values across both layers.
    pub fn len(&self) -> usize {
        self.recent.read().len() + self.lru.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl<V: Clone> Default for StoreCache<V> {
    fn default() -> Self {
        StoreCache::new(CacheConfig::default())
    }
}
