//! Manager operations scoped to one batch

use std::sync::Arc;
use tracing::debug;

use beanstore_core::Timestamp;

use super::{BeanState, ManagerInner, Reservation};
use crate::batch::Batch;
use crate::bean::Bean;
use crate::error::{Error, Result};
use crate::identifier::BeanKey;

/// Handle passed to [`DistributedBeanManager::batch`](super::DistributedBeanManager::batch).
///
/// Creations and removals are buffered and become visible to other callers
/// only when the scope commits. Lookups inside the scope see them. Identifiers
/// created in the scope stay reserved until it commits or rolls back.
pub struct BatchScope<'m, I: BeanKey, T> {
    inner: &'m ManagerInner<I, T>,
    batch: Batch,
    created: Vec<Arc<Bean<I, T>>>,
    removed: Vec<Arc<Bean<I, T>>>,
    reservations: Vec<Reservation<'m, I>>,
}

impl<'m, I: BeanKey, T: BeanState> BatchScope<'m, I, T> {
    pub(super) fn new(inner: &'m ManagerInner<I, T>) -> Self {
        BatchScope {
            inner,
            batch: Batch::new(inner.cache()),
            created: Vec::new(),
            removed: Vec::new(),
            reservations: Vec::new(),
        }
    }

    /// Create a bean as part of the batch
    pub fn create_bean(&mut self, id: I, group_id: I, instance: T) -> Result<Arc<Bean<I, T>>> {
        let key = id.key_bytes();
        let reservation = self.inner.reserve(&id)?;
        if self.batch.contains(&key)? {
            return Err(Error::DuplicateIdentifier(id.to_string()));
        }
        let bean = Arc::new(self.inner.new_bean(id, group_id, instance, Timestamp::now()));
        self.batch.put(key, self.inner.encode_new(&bean)?)?;
        self.created.push(Arc::clone(&bean));
        self.reservations.push(reservation);
        Ok(bean)
    }

    /// Look up a bean, seeing this batch's own creations and removals
    pub fn find_bean(&self, id: &I) -> Result<Option<Arc<Bean<I, T>>>> {
        if let Some(bean) = self.pending(id) {
            return Ok(Some(bean));
        }
        if self.is_removed(id) {
            return Ok(None);
        }
        self.inner.find(id)
    }

    /// Whether a bean exists as seen from inside the batch
    pub fn contains_bean(&self, id: &I) -> Result<bool> {
        if self.pending(id).is_some() {
            return Ok(true);
        }
        if self.is_removed(id) {
            return Ok(false);
        }
        self.inner.contains(id)
    }

    /// Remove a bean as part of the batch. Returns false if it does not
    /// exist (or was already removed in this batch).
    pub fn remove_bean(&mut self, id: &I) -> Result<bool> {
        if let Some(position) = self.created.iter().position(|bean| bean.id() == id) {
            let bean = self.created.swap_remove(position);
            bean.invalidate();
            self.batch.remove(id.key_bytes())?;
            self.reservations.retain(|reservation| reservation.id() != id);
            return Ok(true);
        }
        if self.is_removed(id) {
            return Ok(false);
        }
        match self.inner.find(id)? {
            Some(bean) => {
                self.batch.remove(id.key_bytes())?;
                self.removed.push(bean);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Number of keys written so far
    pub fn pending_writes(&self) -> usize {
        self.batch.len()
    }

    fn pending(&self, id: &I) -> Option<Arc<Bean<I, T>>> {
        self.created.iter().find(|bean| bean.id() == id).cloned()
    }

    fn is_removed(&self, id: &I) -> bool {
        self.removed.iter().any(|bean| bean.id() == id)
    }

    /// Commit on `Ok`, roll back on `Err` (or if the commit fails)
    pub(super) fn finish<R>(mut self, result: Result<R>) -> Result<R> {
        let outcome = result.and_then(|value| self.batch.close().map(|()| value));
        match outcome {
            Ok(value) => {
                self.publish();
                Ok(value)
            }
            Err(e) => {
                self.batch.discard();
                for bean in &self.created {
                    bean.invalidate();
                }
                debug!(
                    target: "beanstore::manager",
                    created = self.created.len(),
                    removed = self.removed.len(),
                    error = %e,
                    "Batch rolled back"
                );
                Err(e)
            }
        }
    }

    /// Apply committed removals and creations to the local indexes
    fn publish(&self) {
        for bean in &self.removed {
            if bean.invalidate() {
                self.inner.unlink(bean);
                self.inner.forget(bean.id());
                self.inner.metrics.record_removed();
            }
        }
        for bean in &self.created {
            let indexed = self.inner.insert(Arc::clone(bean));
            if Arc::ptr_eq(&indexed, bean) {
                self.inner.metrics.record_created();
            }
        }
    }
}

impl<I: BeanKey, T> std::fmt::Debug for BatchScope<'_, I, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchScope")
            .field("batch", &self.batch)
            .field("created", &self.created.len())
            .field("removed", &self.removed.len())
            .finish()
    }
}
