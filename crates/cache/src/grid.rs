//! Remote data grid collaborator
//!
//! The grid's wire protocol is outside this crate. [`RemoteGrid`] is the
//! contract the rest of the system programs against: keyed get/put/remove per
//! named cache, atomic multi-write application, the current topology, and
//! change notifications.
//!
//! [`InMemoryGrid`] is the in-process implementation used by single-node
//! deployments and tests. It supports fault injection through
//! [`InMemoryGrid::set_reachable`].

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use beanstore_core::MemberId;

use crate::error::{CacheError, Result};
use crate::topology::Topology;

/// Handle returned by [`RemoteGrid::add_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A buffered write applied by [`RemoteGrid::apply`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Store a value
    Put(Vec<u8>, Vec<u8>),
    /// Delete a key
    Remove(Vec<u8>),
}

impl WriteOp {
    /// Key the write touches
    pub fn key(&self) -> &[u8] {
        match self {
            WriteOp::Put(key, _) | WriteOp::Remove(key) => key,
        }
    }
}

/// Receives grid notifications.
///
/// Callbacks run on the writer's thread after the write is visible and must
/// not call back into the grid listener registry.
pub trait GridListener: Send + Sync {
    /// An entry in `cache` was written or removed
    fn on_entry_changed(&self, _cache: &str, _key: &[u8]) {}

    /// A new topology view was installed
    fn on_topology_changed(&self, _topology: &Topology) {}
}

/// Remote data grid contract.
pub trait RemoteGrid: Send + Sync {
    /// Read a value
    fn get(&self, cache: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Store a value, returning the previous one
    fn put(&self, cache: &str, key: Vec<u8>, value: Vec<u8>) -> Result<Option<Vec<u8>>>;

    /// Delete a value, returning it
    fn remove(&self, cache: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Whether a key is present
    fn contains(&self, cache: &str, key: &[u8]) -> Result<bool>;

    /// Apply every write or none of them
    fn apply(&self, cache: &str, ops: Vec<WriteOp>) -> Result<()>;

    /// Current topology view
    fn topology(&self) -> Topology;

    /// The member this client is connected through
    fn local_member(&self) -> MemberId;

    /// Subscribe to notifications
    fn add_listener(&self, listener: Arc<dyn GridListener>) -> ListenerId;

    /// Unsubscribe; returns false if the id was unknown
    fn remove_listener(&self, id: ListenerId) -> bool;
}

type Store = FxHashMap<String, FxHashMap<Vec<u8>, Vec<u8>>>;

/// State shared by every member client of one in-process grid
struct Shared {
    store: RwLock<Store>,
    topology: RwLock<Topology>,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn GridListener>)>>,
    next_listener: AtomicU64,
    /// Remote reads served (observational)
    reads: AtomicU64,
    /// Remote writes applied (observational)
    writes: AtomicU64,
}

/// In-process grid.
///
/// Each value is one member's client. Clients created with
/// [`join`](InMemoryGrid::join) share storage, topology and listeners, but
/// are made unreachable independently.
pub struct InMemoryGrid {
    local: MemberId,
    shared: Arc<Shared>,
    reachable: AtomicBool,
}

impl InMemoryGrid {
    /// Create a grid whose only member is `local`
    pub fn new(local: impl Into<MemberId>) -> Self {
        let local = local.into();
        InMemoryGrid {
            shared: Arc::new(Shared {
                store: RwLock::new(FxHashMap::default()),
                topology: RwLock::new(Topology::local(local.clone())),
                listeners: RwLock::new(Vec::new()),
                next_listener: AtomicU64::new(0),
                reads: AtomicU64::new(0),
                writes: AtomicU64::new(0),
            }),
            local,
            reachable: AtomicBool::new(true),
        }
    }

    /// Client for another member of the same grid.
    ///
    /// Membership is not changed; install a view with
    /// [`set_topology`](Self::set_topology).
    pub fn join(&self, member: impl Into<MemberId>) -> Self {
        InMemoryGrid {
            local: member.into(),
            shared: Arc::clone(&self.shared),
            reachable: AtomicBool::new(true),
        }
    }

    /// Create a grid with an initial topology
    pub fn with_topology(local: impl Into<MemberId>, topology: Topology) -> Self {
        let grid = Self::new(local);
        *grid.shared.topology.write() = topology;
        grid
    }

    /// Install a new view and notify listeners
    pub fn set_topology(&self, topology: Topology) {
        info!(
            target: "beanstore::cache",
            view_id = topology.view_id(),
            members = topology.members().len(),
            "Installing topology view"
        );
        *self.shared.topology.write() = topology.clone();
        for listener in self.listener_snapshot() {
            listener.on_topology_changed(&topology);
        }
    }

    /// Make every subsequent call fail with `Unreachable` (or succeed again)
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Number of reads that reached the grid
    pub fn remote_reads(&self) -> u64 {
        self.shared.reads.load(Ordering::Relaxed)
    }

    /// Number of writes applied
    pub fn remote_writes(&self) -> u64 {
        self.shared.writes.load(Ordering::Relaxed)
    }

    /// Number of entries in `cache`
    pub fn len(&self, cache: &str) -> usize {
        self.shared.store.read().get(cache).map_or(0, |entries| entries.len())
    }

    fn check_reachable(&self) -> Result<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CacheError::Unreachable {
                member: self.local.clone(),
            })
        }
    }

    fn listener_snapshot(&self) -> Vec<Arc<dyn GridListener>> {
        self.shared
            .listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect()
    }

    fn notify_changed(&self, cache: &str, keys: &[&[u8]]) {
        let listeners = self.listener_snapshot();
        for key in keys {
            for listener in &listeners {
                listener.on_entry_changed(cache, key);
            }
        }
    }
}

impl RemoteGrid for InMemoryGrid {
    fn get(&self, cache: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.check_reachable()?;
        self.shared.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .shared
            .store
            .read()
            .get(cache)
            .and_then(|entries| entries.get(key).cloned()))
    }

    fn put(&self, cache: &str, key: Vec<u8>, value: Vec<u8>) -> Result<Option<Vec<u8>>> {
        self.check_reachable()?;
        let previous = {
            let mut store = self.shared.store.write();
            store
                .entry(cache.to_string())
                .or_default()
                .insert(key.clone(), value)
        };
        self.shared.writes.fetch_add(1, Ordering::Relaxed);
        self.notify_changed(cache, &[key.as_slice()]);
        Ok(previous)
    }

    fn remove(&self, cache: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.check_reachable()?;
        let previous = self
            .shared
            .store
            .write()
            .get_mut(cache)
            .and_then(|entries| entries.remove(key));
        if previous.is_some() {
            self.shared.writes.fetch_add(1, Ordering::Relaxed);
            self.notify_changed(cache, &[key]);
        }
        Ok(previous)
    }

    fn contains(&self, cache: &str, key: &[u8]) -> Result<bool> {
        self.check_reachable()?;
        Ok(self
            .shared
            .store
            .read()
            .get(cache)
            .is_some_and(|entries| entries.contains_key(key)))
    }

    fn apply(&self, cache: &str, ops: Vec<WriteOp>) -> Result<()> {
        self.check_reachable()?;
        if ops.is_empty() {
            return Ok(());
        }
        {
            let mut store = self.shared.store.write();
            let entries = store.entry(cache.to_string()).or_default();
            for op in &ops {
                match op {
                    WriteOp::Put(key, value) => {
                        entries.insert(key.clone(), value.clone());
                    }
                    WriteOp::Remove(key) => {
                        entries.remove(key);
                    }
                }
            }
        }
        self.shared.writes.fetch_add(ops.len() as u64, Ordering::Relaxed);
        debug!(target: "beanstore::cache", cache, writes = ops.len(), "Applied batch");
        let keys: Vec<&[u8]> = ops.iter().map(WriteOp::key).collect();
        self.notify_changed(cache, &keys);
        Ok(())
    }

    fn topology(&self) -> Topology {
        self.shared.topology.read().clone()
    }

    fn local_member(&self) -> MemberId {
        self.local.clone()
    }

    fn add_listener(&self, listener: Arc<dyn GridListener>) -> ListenerId {
        let id = ListenerId(self.shared.next_listener.fetch_add(1, Ordering::Relaxed));
        self.shared.listeners.write().push((id, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.shared.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }
}

impl std::fmt::Debug for InMemoryGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryGrid")
            .field("local", &self.local)
            .field("view_id", &self.shared.topology.read().view_id())
            .field("reachable", &self.reachable.load(Ordering::Relaxed))
            .finish()
    }
}
