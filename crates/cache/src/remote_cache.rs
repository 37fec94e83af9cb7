//! Client handle for one named remote cache

use std::sync::Arc;
use tracing::trace;

use beanstore_core::MemberId;

use crate::error::Result;
use crate::grid::{GridListener, ListenerId, RemoteGrid, WriteOp};
use crate::near_cache::NearCache;
use crate::topology::Topology;

/// Evicts near-cache entries on grid change notifications.
struct Invalidator {
    cache_name: String,
    near: Arc<dyn NearCache>,
}

impl GridListener for Invalidator {
    fn on_entry_changed(&self, cache: &str, key: &[u8]) {
        if cache == self.cache_name {
            self.near.invalidate(key);
        }
    }

    fn on_topology_changed(&self, _topology: &Topology) {
        // Ownership moved; locally cached copies may belong to a stale owner.
        self.near.clear();
    }
}

/// A connection to one named cache, optionally fronted by a near cache.
pub struct RemoteCache {
    name: String,
    grid: Arc<dyn RemoteGrid>,
    near: Option<Arc<dyn NearCache>>,
    listener: Option<ListenerId>,
}

impl RemoteCache {
    /// Connect without a near cache
    pub fn new(name: impl Into<String>, grid: Arc<dyn RemoteGrid>) -> Self {
        RemoteCache {
            name: name.into(),
            grid,
            near: None,
            listener: None,
        }
    }

    /// Connect with a near cache kept coherent through grid notifications
    pub fn with_near_cache(
        name: impl Into<String>,
        grid: Arc<dyn RemoteGrid>,
        near: Arc<dyn NearCache>,
    ) -> Self {
        let name = name.into();
        let listener = grid.add_listener(Arc::new(Invalidator {
            cache_name: name.clone(),
            near: Arc::clone(&near),
        }));
        RemoteCache {
            name,
            grid,
            near: Some(near),
            listener: Some(listener),
        }
    }

    /// Cache name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Near cache, if one was configured
    pub fn near_cache(&self) -> Option<&Arc<dyn NearCache>> {
        self.near.as_ref()
    }

    /// Underlying grid
    pub fn grid(&self) -> &Arc<dyn RemoteGrid> {
        &self.grid
    }

    /// Read through the near cache
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(near) = &self.near {
            if let Some(hit) = near.get(key) {
                trace!(target: "beanstore::cache", cache = %self.name, "Near cache hit");
                return Ok(Some(hit));
            }
        }
        let value = self.grid.get(&self.name, key)?;
        if let (Some(near), Some(value)) = (&self.near, &value) {
            near.put(key.to_vec(), value.clone());
        }
        Ok(value)
    }

    /// Write to the grid
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<Option<Vec<u8>>> {
        if let Some(near) = &self.near {
            near.invalidate(&key);
        }
        self.grid.put(&self.name, key, value)
    }

    /// Delete from the grid
    pub fn remove(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(near) = &self.near {
            near.invalidate(key);
        }
        self.grid.remove(&self.name, key)
    }

    /// Whether the grid holds `key`
    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        if let Some(near) = &self.near {
            if near.get(key).is_some() {
                return Ok(true);
            }
        }
        self.grid.contains(&self.name, key)
    }

    /// Apply a set of writes atomically
    pub fn apply(&self, ops: Vec<WriteOp>) -> Result<()> {
        if let Some(near) = &self.near {
            for op in &ops {
                near.invalidate(op.key());
            }
        }
        self.grid.apply(&self.name, ops)
    }

    /// Current topology view
    pub fn topology(&self) -> Topology {
        self.grid.topology()
    }

    /// Member this client talks through
    pub fn local_member(&self) -> MemberId {
        self.grid.local_member()
    }
}

impl Drop for RemoteCache {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            self.grid.remove_listener(listener);
        }
    }
}

impl std::fmt::Debug for RemoteCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCache")
            .field("name", &self.name)
            .field("near_cache", &self.near.is_some())
            .finish()
    }
}
