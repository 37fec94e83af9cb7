//! Client-local near caches
//!
//! A near cache sits in front of a remote cache connection and answers reads
//! locally. It is kept coherent by invalidation: the owning
//! [`RemoteCache`](crate::RemoteCache) evicts keys on its own writes and on
//! grid change notifications for writes made by other clients.

use dashmap::DashMap;
use std::sync::Arc;

/// Local read cache in front of one remote cache.
pub trait NearCache: Send + Sync {
    /// Cached value, if any
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Cache a value read from the grid
    fn put(&self, key: Vec<u8>, value: Vec<u8>);

    /// Drop one key
    fn invalidate(&self, key: &[u8]);

    /// Drop everything
    fn clear(&self);

    /// Number of cached entries
    fn len(&self) -> usize;

    /// Whether nothing is cached
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Creates the near cache for a named remote cache.
pub trait NearCacheFactory: Send + Sync {
    /// Build a near cache for `cache_name`
    fn create_near_cache(&self, cache_name: &str) -> Arc<dyn NearCache>;
}

impl<F> NearCacheFactory for F
where
    F: Fn(&str) -> Arc<dyn NearCache> + Send + Sync,
{
    fn create_near_cache(&self, cache_name: &str) -> Arc<dyn NearCache> {
        self(cache_name)
    }
}

/// Bounded near cache.
///
/// Once `max_entries` is reached, inserting a new key evicts an arbitrary
/// existing one.
#[derive(Debug)]
pub struct DefaultNearCache {
    entries: DashMap<Vec<u8>, Vec<u8>>,
    max_entries: usize,
}

impl DefaultNearCache {
    /// Create a near cache holding at most `max_entries` values
    pub fn new(max_entries: usize) -> Self {
        DefaultNearCache {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Capacity
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

impl NearCache for DefaultNearCache {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn put(&self, key: Vec<u8>, value: Vec<u8>) {
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            // Pick the victim before removing: holding an iterator shard
            // guard while removing would deadlock.
            let victim = self.entries.iter().next().map(|e| e.key().clone());
            if let Some(victim) = victim {
                self.entries.remove(&victim);
            }
        }
        self.entries.insert(key, value);
    }

    fn invalidate(&self, key: &[u8]) {
        self.entries.remove(key);
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Factory for [`DefaultNearCache`]
#[derive(Debug, Clone, Copy)]
pub struct DefaultNearCacheFactory {
    max_entries: usize,
}

impl DefaultNearCacheFactory {
    /// Near caches created will hold at most `max_entries` values
    pub fn new(max_entries: usize) -> Self {
        DefaultNearCacheFactory { max_entries }
    }
}

impl NearCacheFactory for DefaultNearCacheFactory {
    fn create_near_cache(&self, _cache_name: &str) -> Arc<dyn NearCache> {
        Arc::new(DefaultNearCache::new(self.max_entries))
    }
}
