//! Remote cache container and near-cache factory registrations
//!
//! Several factories may be registered for one cache name. Instantiation
//! always uses the most recently registered one still open. Each registration
//! is identified by its own id, so closing an older handle never removes a
//! newer factory for the same name.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

use crate::error::{CacheError, Result};
use crate::grid::RemoteGrid;
use crate::near_cache::NearCacheFactory;
use crate::remote_cache::RemoteCache;

type Factories = Mutex<FxHashMap<String, Vec<(u64, Arc<dyn NearCacheFactory>)>>>;

/// Entry point for obtaining [`RemoteCache`] handles from a grid.
pub struct RemoteCacheContainer {
    grid: Arc<dyn RemoteGrid>,
    factories: Arc<Factories>,
    next_registration: AtomicU64,
}

impl RemoteCacheContainer {
    /// Create a container over `grid`
    pub fn new(grid: Arc<dyn RemoteGrid>) -> Self {
        RemoteCacheContainer {
            grid,
            factories: Arc::new(Mutex::new(FxHashMap::default())),
            next_registration: AtomicU64::new(0),
        }
    }

    /// Underlying grid
    pub fn grid(&self) -> &Arc<dyn RemoteGrid> {
        &self.grid
    }

    /// Record `factory` for caches named `cache_name`.
    ///
    /// The returned handle must be closed to remove the factory.
    ///
    /// # Errors
    ///
    /// `InvalidCacheName` if the name is empty.
    pub fn register_near_cache_factory(
        &self,
        cache_name: &str,
        factory: Arc<dyn NearCacheFactory>,
    ) -> Result<NearCacheRegistration> {
        if cache_name.trim().is_empty() {
            return Err(CacheError::InvalidCacheName(cache_name.to_string()));
        }
        let id = self.next_registration.fetch_add(1, Ordering::Relaxed);
        self.factories
            .lock()
            .entry(cache_name.to_string())
            .or_default()
            .push((id, factory));
        info!(
            target: "beanstore::cache",
            cache = cache_name,
            registration = id,
            "Registered near cache factory"
        );
        Ok(NearCacheRegistration {
            factories: Arc::downgrade(&self.factories),
            cache_name: cache_name.to_string(),
            id,
            closed: AtomicBool::new(false),
        })
    }

    /// Number of open factory registrations for `cache_name`
    pub fn near_cache_factories(&self, cache_name: &str) -> usize {
        self.factories.lock().get(cache_name).map_or(0, Vec::len)
    }

    /// Instantiate a handle for `cache_name`, fronted by a near cache when
    /// a factory is registered for that name.
    pub fn get_cache(&self, cache_name: &str) -> Result<RemoteCache> {
        if cache_name.trim().is_empty() {
            return Err(CacheError::InvalidCacheName(cache_name.to_string()));
        }
        let factory = self
            .factories
            .lock()
            .get(cache_name)
            .and_then(|registered| registered.last())
            .map(|(_, factory)| Arc::clone(factory));

        let cache = match factory {
            Some(factory) => RemoteCache::with_near_cache(
                cache_name,
                Arc::clone(&self.grid),
                factory.create_near_cache(cache_name),
            ),
            None => RemoteCache::new(cache_name, Arc::clone(&self.grid)),
        };
        debug!(
            target: "beanstore::cache",
            cache = cache_name,
            near_cache = cache.near_cache().is_some(),
            "Instantiated remote cache"
        );
        Ok(cache)
    }
}

impl std::fmt::Debug for RemoteCacheContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCacheContainer")
            .field("caches_with_factories", &self.factories.lock().len())
            .finish()
    }
}

/// Handle for one near-cache factory registration.
///
/// `close` is idempotent and only ever removes this registration.
#[derive(Debug)]
pub struct NearCacheRegistration {
    factories: Weak<Factories>,
    cache_name: String,
    id: u64,
    closed: AtomicBool,
}

impl NearCacheRegistration {
    /// Cache name the factory was registered for
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// Whether `close` has run
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Remove the factory. Returns true only for the call that removed it.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        // Container already gone: nothing left to remove from.
        let Some(factories) = self.factories.upgrade() else {
            return false;
        };
        let mut factories = factories.lock();
        let removed = match factories.get_mut(&self.cache_name) {
            Some(registered) => {
                let before = registered.len();
                registered.retain(|(id, _)| *id != self.id);
                let removed = registered.len() != before;
                if registered.is_empty() {
                    factories.remove(&self.cache_name);
                }
                removed
            }
            None => false,
        };
        if removed {
            info!(
                target: "beanstore::cache",
                cache = %self.cache_name,
                registration = self.id,
                "Removed near cache factory"
            );
        }
        removed
    }
}
