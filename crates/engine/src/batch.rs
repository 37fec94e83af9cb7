//! Batching of remote cache writes
//!
//! A [`Batch`] buffers puts and removes and applies them to the remote cache
//! in one `apply` call on [`Batch::close`]. Reads inside the batch see its own
//! buffered writes. Nothing is visible to other readers until the batch
//! closes; a discarded (or dropped) batch leaves the cache untouched.
//!
//! Closing and discarding are idempotent. Writes after either fail with
//! `CacheError::BatchClosed`.

use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use beanstore_cache::{CacheError, RemoteCache, WriteOp};

use crate::error::Result;

/// Creates batches scoping a unit of work.
pub trait Batcher: Send + Sync {
    /// Start a new batch
    fn create_batch(&self) -> Batch;
}

/// [`Batcher`] over one remote cache.
#[derive(Debug, Clone)]
pub struct CacheBatcher {
    cache: Arc<RemoteCache>,
}

impl CacheBatcher {
    /// Batches writing to `cache`
    pub fn new(cache: Arc<RemoteCache>) -> Self {
        CacheBatcher { cache }
    }
}

impl Batcher for CacheBatcher {
    fn create_batch(&self) -> Batch {
        Batch::new(Arc::clone(&self.cache))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchState {
    Open,
    Committed,
    RolledBack,
}

/// Buffered writes against one remote cache.
pub struct Batch {
    cache: Arc<RemoteCache>,
    /// `None` marks a buffered removal
    writes: FxHashMap<Vec<u8>, Option<Vec<u8>>>,
    state: BatchState,
}

impl Batch {
    /// Open an empty batch
    pub fn new(cache: Arc<RemoteCache>) -> Self {
        Batch {
            cache,
            writes: FxHashMap::default(),
            state: BatchState::Open,
        }
    }

    /// Whether the batch still accepts writes
    pub fn is_open(&self) -> bool {
        self.state == BatchState::Open
    }

    /// Number of distinct keys written
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// True if nothing was written
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Buffered write for `key`: `Some(None)` is a pending removal
    pub fn buffered(&self, key: &[u8]) -> Option<Option<&[u8]>> {
        self.writes.get(key).map(|w| w.as_deref())
    }

    /// Read `key`, preferring this batch's own writes
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.writes.get(key) {
            Some(write) => Ok(write.clone()),
            None => Ok(self.cache.get(key)?),
        }
    }

    /// Whether `key` exists as seen from inside the batch
    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        match self.writes.get(key) {
            Some(write) => Ok(write.is_some()),
            None => Ok(self.cache.contains(key)?),
        }
    }

    /// Buffer a put
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.check_open("put")?;
        self.writes.insert(key, Some(value));
        Ok(())
    }

    /// Buffer a removal
    pub fn remove(&mut self, key: Vec<u8>) -> Result<()> {
        self.check_open("remove")?;
        self.writes.insert(key, None);
        Ok(())
    }

    /// Apply every buffered write. Closing a finished batch does nothing.
    ///
    /// # Errors
    ///
    /// If the cache rejects the writes the batch is rolled back and the error
    /// returned; none of the writes are visible.
    pub fn close(&mut self) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }
        let ops: Vec<WriteOp> = self
            .writes
            .drain()
            .map(|(key, value)| match value {
                Some(value) => WriteOp::Put(key, value),
                None => WriteOp::Remove(key),
            })
            .collect();
        let count = ops.len();
        match self.cache.apply(ops) {
            Ok(()) => {
                self.state = BatchState::Committed;
                debug!(target: "beanstore::manager", cache = self.cache.name(), writes = count, "Batch committed");
                Ok(())
            }
            Err(e) => {
                self.state = BatchState::RolledBack;
                debug!(target: "beanstore::manager", cache = self.cache.name(), error = %e, "Batch commit failed");
                Err(e.into())
            }
        }
    }

    /// Drop every buffered write. Discarding a finished batch does nothing.
    pub fn discard(&mut self) {
        if self.is_open() {
            trace!(target: "beanstore::manager", writes = self.writes.len(), "Batch discarded");
            self.writes.clear();
            self.state = BatchState::RolledBack;
        }
    }

    fn check_open(&self, operation: &'static str) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CacheError::BatchClosed(operation).into())
        }
    }
}

impl Drop for Batch {
    fn drop(&mut self) {
        self.discard();
    }
}

impl std::fmt::Debug for Batch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch")
            .field("cache", &self.cache.name())
            .field("writes", &self.writes.len())
            .field("state", &self.state)
            .finish()
    }
}
