//! Distributed bean manager
//!
//! [`DistributedBeanManager`] keeps bean state in a remote cache and hands
//! out shared [`Bean`] handles for it. Each member holds at most one live
//! handle per identifier; handles are dropped from the local index when they
//! close, expire, or are removed.
//!
//! ## Persistence
//!
//! State is written back to the remote cache when a bean goes idle (its last
//! holder releases it) and when an idle bean is closed (passivation). Beans
//! created inside a [`BatchScope`] are written only when the scope commits.
//! A write-back that fails leaves the bean dirty; sweeps retry it.
//!
//! ## Creation
//!
//! Every create, direct or batched, first reserves its identifier. A second
//! create of the same identifier fails with `DuplicateIdentifier` until the
//! first one has either published its bean or rolled back.
//!
//! ## Expiration
//!
//! With an idle timeout configured, idle beans are scheduled in an
//! [`ExpirationTracker`]. Expiry is checked lazily on lookup and eagerly by
//! [`DistributedBeanManager::sweep`], which an external scheduler calls.
//!
//! ## Lifecycle
//!
//! Operations run only while the manager is started. `stop()` refuses new
//! operations, waits for in-flight ones to drain, then passivates every idle
//! bean. Concurrent `stop()` calls all return after the manager has stopped.
//! If `stop_timeout_ms` elapses first, the manager keeps running and `stop()`
//! fails with `StopTimeout`.

mod builder;
mod scope;

pub use builder::BeanManagerBuilder;
pub use scope::BatchScope;

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use parking_lot::{Condvar, Mutex, RwLock};
use rustc_hash::FxHashSet;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use beanstore_affinity::{
    AffinityDescriptor, AffinityResolver, AffinityRouter, TopologyAffinityResolver,
};
use beanstore_cache::{
    CacheClientRegistration, GridListener, ListenerId, RemoteCache, RemoteCacheContainer,
};
use beanstore_core::{BeanContext, MemberId, Time, Timestamp};
use beanstore_marshalling::Marshaller;

use crate::batch::{Batcher, CacheBatcher};
use crate::bean::{Bean, BeanLifecycle};
use crate::entry::{BeanEntry, EntryMetadata};
use crate::error::{Error, Result};
use crate::expiration::ExpirationTracker;
use crate::identifier::{BeanKey, IdentifierFactory};
use crate::metrics::{BeanManagerMetrics, MetricsSnapshot};

/// Bean state the manager can replicate.
pub trait BeanState: Serialize + DeserializeOwned + Send + 'static {}

impl<T> BeanState for T where T: Serialize + DeserializeOwned + Send + 'static {}

// ============================================================================
// BeanManager SPI
// ============================================================================

/// Creates, locates and removes beans for one bean type.
///
/// Lookups never acquire: callers bracket every use of a returned bean with
/// `acquire()` / `release()`.
pub trait BeanManager<I, T>: Send + Sync {
    /// Create a bean. Fails with `DuplicateIdentifier` if `id` is live.
    fn create_bean(&self, id: I, group_id: I, instance: T) -> Result<Arc<Bean<I, T>>>;

    /// Look up a bean; `None` if unknown, expired or removed
    fn find_bean(&self, id: &I) -> Result<Option<Arc<Bean<I, T>>>>;

    /// Whether a bean exists. May race with a concurrent removal.
    fn contains_bean(&self, id: &I) -> Result<bool>;

    /// Issues cluster-wide unique identifiers
    fn identifier_factory(&self) -> Arc<dyn IdentifierFactory<I>>;

    /// Scopes several cache writes as one unit of work
    fn batcher(&self) -> Arc<dyn Batcher>;

    /// Start accepting operations. Idempotent.
    fn start(&self) -> Result<()>;

    /// Drain in-flight operations and stop. Idempotent.
    fn stop(&self) -> Result<()>;

    /// Whether `error` may succeed against another member
    fn is_remotable(&self, error: &Error) -> bool {
        error.is_transient()
    }
}

// ============================================================================
// Manager state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManagerState {
    Stopped,
    Running,
    Stopping,
}

#[derive(Debug)]
struct Lifecycle {
    state: ManagerState,
    in_flight: usize,
}

/// Counts one in-flight operation until dropped
struct OpGuard<'a> {
    lifecycle: &'a Mutex<Lifecycle>,
    drained: &'a Condvar,
}

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        let mut lifecycle = self.lifecycle.lock();
        lifecycle.in_flight -= 1;
        if lifecycle.in_flight == 0 {
            self.drained.notify_all();
        }
    }
}

/// Holds an identifier reserved for creation until dropped
struct Reservation<'a, I: BeanKey> {
    reserved: &'a DashSet<I>,
    id: I,
}

impl<I: BeanKey> Reservation<'_, I> {
    fn id(&self) -> &I {
        &self.id
    }
}

impl<I: BeanKey> Drop for Reservation<'_, I> {
    fn drop(&mut self) {
        self.reserved.remove(&self.id);
    }
}

struct ManagerInner<I, T> {
    context: BeanContext,
    container: Arc<RemoteCacheContainer>,
    cache_name: String,
    cache: RwLock<Arc<RemoteCache>>,
    registration: Option<CacheClientRegistration>,
    marshaller: Marshaller,
    resolver: Arc<TopologyAffinityResolver>,
    router: AffinityRouter,
    identifiers: Arc<dyn IdentifierFactory<I>>,
    idle_timeout: Option<Time>,
    beans: DashMap<I, Arc<Bean<I, T>>>,
    /// Identifiers with a create in progress
    reserved: DashSet<I>,
    groups: DashMap<I, FxHashSet<I>>,
    expiration: Option<ExpirationTracker<I>>,
    metrics: BeanManagerMetrics,
    lifecycle: Mutex<Lifecycle>,
    drained: Condvar,
    stop_timeout: Option<Duration>,
    listener: Mutex<Option<ListenerId>>,
    hooks: Arc<dyn BeanLifecycle<I, T>>,
}

impl<I: BeanKey, T: BeanState> ManagerInner<I, T> {
    fn begin(&self) -> Result<OpGuard<'_>> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state != ManagerState::Running {
            return Err(Error::NotRunning(self.context.bean_name().to_string()));
        }
        lifecycle.in_flight += 1;
        Ok(OpGuard {
            lifecycle: &self.lifecycle,
            drained: &self.drained,
        })
    }

    fn cache(&self) -> Arc<RemoteCache> {
        Arc::clone(&self.cache.read())
    }

    fn new_bean(&self, id: I, group_id: I, instance: T, last_accessed: Timestamp) -> Bean<I, T> {
        Bean::new(id, group_id, instance, self.idle_timeout)
            .with_last_accessed(last_accessed)
            .with_lifecycle(Arc::clone(&self.hooks))
    }

    fn is_expired(&self, last_accessed: Timestamp, now: Timestamp) -> bool {
        self.idle_timeout
            .is_some_and(|timeout| last_accessed.saturating_add(timeout) <= now)
    }

    /// Local handle for `id` if it can still be used
    fn live(&self, id: &I) -> Option<Arc<Bean<I, T>>> {
        self.beans
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .filter(|bean| bean.is_valid() && !bean.is_closed())
    }

    /// Whether `bean` is the handle this member indexes for its id
    fn is_registered(&self, bean: &Bean<I, T>) -> bool {
        self.beans
            .get(bean.id())
            .is_some_and(|entry| std::ptr::eq(entry.value().as_ref(), bean))
    }

    /// Reserve `id` for creation, failing if another create holds it or a
    /// live handle already uses it.
    fn reserve(&self, id: &I) -> Result<Reservation<'_, I>> {
        if !self.reserved.insert(id.clone()) {
            return Err(Error::DuplicateIdentifier(id.to_string()));
        }
        let reservation = Reservation {
            reserved: &self.reserved,
            id: id.clone(),
        };
        if self.live(id).is_some() {
            return Err(Error::DuplicateIdentifier(id.to_string()));
        }
        Ok(reservation)
    }

    fn encode(&self, bean: &Bean<I, T>, instance: &T) -> Result<Vec<u8>> {
        let entry = BeanEntry::new(bean.group_id(), instance, bean.last_accessed());
        Ok(self.marshaller.marshal(&entry)?)
    }

    /// Encode a bean no other thread can see yet
    fn encode_new(&self, bean: &Bean<I, T>) -> Result<Vec<u8>> {
        bean.with_instance(|instance| self.encode(bean, instance))
    }

    /// Write the bean back, or leave it dirty for the holder of its
    /// instance guard to write.
    fn persist(&self, bean: &Bean<I, T>) -> Result<()> {
        bean.write_back(|instance| {
            let key = bean.id().key_bytes();
            let bytes = self.encode(bean, instance)?;
            let cache = self.cache();
            cache.put(key.clone(), bytes)?;
            if !bean.is_valid() {
                // Removed while writing: do not resurrect it.
                cache.remove(&key)?;
            }
            trace!(target: "beanstore::manager", id = %bean.id(), "Persisted");
            Ok(())
        })
    }

    /// Retry write-backs of idle beans left dirty by a failure
    fn flush_dirty(&self) -> usize {
        let dirty: Vec<Arc<Bean<I, T>>> = self
            .beans
            .iter()
            .filter(|entry| entry.value().is_dirty() && entry.value().acquisition_count() == 0)
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let mut flushed = 0;
        for bean in dirty {
            if !bean.is_valid() {
                continue;
            }
            match self.persist(&bean) {
                Ok(()) => flushed += 1,
                Err(e) => {
                    warn!(target: "beanstore::manager", id = %bean.id(), error = %e, "Write-back retry failed");
                }
            }
        }
        flushed
    }

    /// Add a freshly indexed bean to its group and expiration schedule
    fn index(&self, bean: &Bean<I, T>) {
        self.groups
            .entry(bean.group_id().clone())
            .or_default()
            .insert(bean.id().clone());
        if let Some(tracker) = &self.expiration {
            tracker.track_at(bean.id().clone(), bean.last_accessed());
        }
    }

    /// Insert `bean` unless a live handle already exists; returns the handle
    /// that ends up indexed.
    fn insert(&self, bean: Arc<Bean<I, T>>) -> Arc<Bean<I, T>> {
        let indexed = match self.beans.entry(bean.id().clone()) {
            Entry::Occupied(existing) if existing.get().is_valid() && !existing.get().is_closed() => {
                return Arc::clone(existing.get());
            }
            Entry::Occupied(mut stale) => {
                stale.insert(Arc::clone(&bean));
                bean
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::clone(&bean));
                bean
            }
        };
        self.index(&indexed);
        indexed
    }

    /// Drop `bean` from the local indexes if it is the indexed handle
    fn unlink(&self, bean: &Bean<I, T>) {
        let removed = self
            .beans
            .remove_if(bean.id(), |_, indexed| std::ptr::eq(indexed.as_ref(), bean))
            .is_some();
        if !removed {
            return;
        }
        if let Entry::Occupied(mut group) = self.groups.entry(bean.group_id().clone()) {
            group.get_mut().remove(bean.id());
            if group.get().is_empty() {
                group.remove();
            }
        }
    }

    fn forget(&self, id: &I) {
        if let Some(tracker) = &self.expiration {
            tracker.forget(id);
        }
    }

    /// Expire an idle bean. Returns false if it was acquired or closed first.
    fn expire(&self, bean: &Bean<I, T>) -> Result<bool> {
        if !bean.try_close_idle() {
            return Ok(false);
        }
        bean.invalidate();
        self.unlink(bean);
        self.forget(bean.id());
        self.metrics.record_closed();
        self.cache().remove(&bean.id().key_bytes())?;
        self.metrics.record_expired();
        debug!(target: "beanstore::manager", id = %bean.id(), "Expired");
        Ok(true)
    }

    fn find(&self, id: &I) -> Result<Option<Arc<Bean<I, T>>>> {
        if let Some(bean) = self.beans.get(id).map(|entry| Arc::clone(entry.value())) {
            if bean.is_valid() && !bean.is_closed() {
                if bean.is_expired() && self.expire(&bean)? {
                    return Ok(None);
                }
                if bean.is_valid() && !bean.is_closed() {
                    self.metrics.record_found();
                    return Ok(Some(bean));
                }
            }
            self.unlink(&bean);
        }
        self.load(id)
    }

    fn load(&self, id: &I) -> Result<Option<Arc<Bean<I, T>>>> {
        let key = id.key_bytes();
        let cache = self.cache();
        let Some(bytes) = cache.get(&key)? else {
            trace!(target: "beanstore::manager", id = %id, "Not found");
            return Ok(None);
        };
        let entry: BeanEntry<I, T> = self.marshaller.unmarshal(&bytes)?;
        let last_accessed = entry.last_accessed();
        if self.is_expired(last_accessed, Timestamp::now()) {
            cache.remove(&key)?;
            self.forget(id);
            self.metrics.record_expired();
            debug!(target: "beanstore::manager", id = %id, "Expired on load");
            return Ok(None);
        }
        let bean = Arc::new(self.new_bean(id.clone(), entry.group_id, entry.instance, last_accessed));
        let bean = self.insert(bean);
        self.metrics.record_found();
        debug!(target: "beanstore::manager", id = %id, "Loaded");
        Ok(Some(bean))
    }

    fn contains(&self, id: &I) -> Result<bool> {
        if self.live(id).is_some() {
            return Ok(true);
        }
        Ok(self.cache().contains(&id.key_bytes())?)
    }

    fn create(&self, id: I, group_id: I, instance: T) -> Result<Arc<Bean<I, T>>> {
        let _reservation = self.reserve(&id)?;
        let bean = Arc::new(self.new_bean(id.clone(), group_id, instance, Timestamp::now()));
        match self.beans.entry(id.clone()) {
            Entry::Occupied(existing) if existing.get().is_valid() && !existing.get().is_closed() => {
                return Err(Error::DuplicateIdentifier(id.to_string()));
            }
            Entry::Occupied(mut stale) => {
                stale.insert(Arc::clone(&bean));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::clone(&bean));
            }
        }
        if let Err(e) = self.store_new(&bean) {
            bean.invalidate();
            self.beans
                .remove_if(&id, |_, indexed| Arc::ptr_eq(indexed, &bean));
            return Err(e);
        }
        self.index(&bean);
        self.metrics.record_created();
        debug!(target: "beanstore::manager", id = %id, group = %bean.group_id(), "Created");
        Ok(bean)
    }

    fn store_new(&self, bean: &Bean<I, T>) -> Result<()> {
        let key = bean.id().key_bytes();
        let cache = self.cache();
        if cache.contains(&key)? {
            return Err(Error::DuplicateIdentifier(bean.id().to_string()));
        }
        let bytes = self.encode_new(bean)?;
        cache.put(key, bytes)?;
        Ok(())
    }

    /// Expire `id` if it is still idle past its deadline
    fn sweep_one(&self, tracker: &ExpirationTracker<I>, id: &I, now: Timestamp) -> Result<bool> {
        if let Some(bean) = self.beans.get(id).map(|entry| Arc::clone(entry.value())) {
            if bean.is_expired_at(now) {
                return self.expire(&bean);
            }
            if bean.acquisition_count() == 0 && bean.is_valid() && !bean.is_closed() {
                // Touched since it was scheduled.
                tracker.track_at(id.clone(), bean.last_accessed());
            }
            return Ok(false);
        }

        // Passivated or owned elsewhere: judge by the stored entry.
        let key = id.key_bytes();
        let cache = self.cache();
        let Some(bytes) = cache.get(&key)? else {
            return Ok(false);
        };
        let metadata: EntryMetadata<I> = self.marshaller.unmarshal(&bytes)?;
        if self.is_expired(metadata.last_accessed(), now) {
            cache.remove(&key)?;
            self.metrics.record_expired();
            debug!(target: "beanstore::manager", id = %id, "Expired remote entry");
            Ok(true)
        } else {
            tracker.track_at(id.clone(), metadata.last_accessed());
            Ok(false)
        }
    }
}

impl<I, T> Drop for ManagerInner<I, T> {
    fn drop(&mut self) {
        if let Some(id) = self.listener.get_mut().take() {
            self.container.grid().remove_listener(id);
        }
    }
}

// ============================================================================
// Bean hooks
// ============================================================================

struct ManagerHooks<I, T> {
    inner: Weak<ManagerInner<I, T>>,
}

impl<I: BeanKey, T: BeanState> BeanLifecycle<I, T> for ManagerHooks<I, T> {
    fn activated(&self, bean: &Bean<I, T>) {
        if let Some(inner) = self.inner.upgrade() {
            if let Some(tracker) = &inner.expiration {
                tracker.invalidate(bean.id());
            }
        }
    }

    fn idle(&self, bean: &Bean<I, T>) -> Result<()> {
        let Some(inner) = self.inner.upgrade() else {
            return Ok(());
        };
        // Uncommitted batch beans are written by their batch.
        if !bean.is_valid() || !inner.is_registered(bean) {
            return Ok(());
        }
        if let Some(tracker) = &inner.expiration {
            tracker.track(bean.id().clone());
        }
        inner.persist(bean).map_err(|e| {
            warn!(target: "beanstore::manager", id = %bean.id(), error = %e, "Failed to persist idle bean");
            e
        })
    }

    fn flush(&self, bean: &Bean<I, T>) -> Result<()> {
        match self.inner.upgrade() {
            Some(inner) if bean.is_valid() => inner.persist(bean),
            _ => Ok(()),
        }
    }

    fn closed(&self, bean: &Bean<I, T>) -> Result<()> {
        let Some(inner) = self.inner.upgrade() else {
            return Ok(());
        };
        let registered = inner.is_registered(bean);
        let result = if bean.is_valid() && registered {
            // Passivation: the entry stays tracked so it can still expire.
            inner.persist(bean)
        } else {
            inner.forget(bean.id());
            Ok(())
        };
        inner.unlink(bean);
        inner.metrics.record_closed();
        debug!(target: "beanstore::manager", id = %bean.id(), passivated = bean.is_valid(), "Bean closed");
        result
    }

    fn removed(&self, bean: &Bean<I, T>) -> Result<()> {
        let Some(inner) = self.inner.upgrade() else {
            return Ok(());
        };
        inner.unlink(bean);
        inner.forget(bean.id());
        inner.metrics.record_removed();
        inner.cache().remove(&bean.id().key_bytes())?;
        Ok(())
    }
}

// ============================================================================
// DistributedBeanManager
// ============================================================================

/// [`BeanManager`] backed by a remote cache.
pub struct DistributedBeanManager<I, T> {
    inner: Arc<ManagerInner<I, T>>,
}

impl<I: BeanKey, T: BeanState> DistributedBeanManager<I, T> {
    /// Configure a manager for the bean type described by `context`
    pub fn builder(
        context: BeanContext,
        container: Arc<RemoteCacheContainer>,
        identifiers: Arc<dyn IdentifierFactory<I>>,
    ) -> BeanManagerBuilder<I, T> {
        BeanManagerBuilder::new(context, container, identifiers)
    }

    /// Bean type descriptor
    pub fn context(&self) -> &BeanContext {
        &self.inner.context
    }

    /// Remote cache name
    pub fn cache_name(&self) -> &str {
        &self.inner.cache_name
    }

    /// This member
    pub fn local_member(&self) -> &MemberId {
        self.inner.resolver.routes().local_member()
    }

    /// Whether the manager accepts operations
    pub fn is_running(&self) -> bool {
        self.inner.lifecycle.lock().state == ManagerState::Running
    }

    /// Whether the near cache registration is active
    pub fn is_near_cache_registered(&self) -> bool {
        self.inner
            .registration
            .as_ref()
            .is_some_and(CacheClientRegistration::is_registered)
    }

    /// Number of bean handles held by this member
    pub fn len(&self) -> usize {
        self.inner.beans.len()
    }

    /// True if this member holds no bean handles
    pub fn is_empty(&self) -> bool {
        self.inner.beans.is_empty()
    }

    /// Counter snapshot
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Affinity resolver (also the grid's topology listener while started)
    pub fn resolver(&self) -> &Arc<TopologyAffinityResolver> {
        &self.inner.resolver
    }

    /// Failover router
    pub fn router(&self) -> &AffinityRouter {
        &self.inner.router
    }

    /// Look up and remove a bean. Returns false if it did not exist or was
    /// already removed.
    pub fn remove_bean(&self, id: &I) -> Result<bool> {
        let _op = self.inner.begin()?;
        match self.inner.find(id)? {
            Some(bean) => bean.remove(|_| {}),
            None => Ok(false),
        }
    }

    /// Identifiers of the locally held beans in `group_id`
    pub fn group_members(&self, group_id: &I) -> Vec<I> {
        self.inner
            .groups
            .get(group_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Routing descriptor for a bean, resolved on its group so that beans of
    /// one group co-locate. Unknown beans resolve on their own identifier.
    pub fn affinity(&self, id: &I) -> AffinityDescriptor {
        self.group_affinity(&self.group_of(id))
    }

    /// Routing descriptor for a group
    pub fn group_affinity(&self, group_id: &I) -> AffinityDescriptor {
        self.inner.resolver.resolve(&group_id.key_bytes())
    }

    /// Routing descriptor honoring a front-end supplied affinity cookie
    pub fn affinity_with_cookie(&self, id: &I, cookie: Option<&str>) -> AffinityDescriptor {
        self.inner
            .resolver
            .resolve_with_cookie(&self.group_of(id).key_bytes(), cookie)
    }

    /// Whether this member owns the bean's data under the current view
    pub fn is_local(&self, id: &I) -> bool {
        let owners = self.inner.resolver.owners(&self.group_of(id).key_bytes());
        owners.is_empty() || owners.contains(self.local_member())
    }

    /// Run `op` against the bean's preferred members, failing over on
    /// remotable errors.
    pub fn invoke<R, F>(&self, id: &I, op: F) -> Result<R>
    where
        F: FnMut(&MemberId) -> Result<R>,
    {
        let descriptor = self.affinity(id);
        self.inner.router.invoke(&descriptor, op, Error::is_transient)
    }

    /// Expire every bean whose idle deadline is at or before `now`.
    ///
    /// Returns how many beans expired. Entries that could not be expired (for
    /// example because the grid was unreachable) are rescheduled. Idle beans
    /// whose last write-back failed are written again first.
    pub fn sweep(&self, now: Timestamp) -> Result<usize> {
        let _op = self.inner.begin()?;
        self.inner.flush_dirty();
        let Some(tracker) = &self.inner.expiration else {
            return Ok(0);
        };
        let mut expired = 0;
        let mut failed = Vec::new();
        while let Some(id) = tracker.poll_expired(now) {
            match self.inner.sweep_one(tracker, &id, now) {
                Ok(true) => expired += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(target: "beanstore::manager", id = %id, error = %e, "Expiration failed, will retry");
                    failed.push(id);
                }
            }
        }
        for id in failed {
            tracker.retry_at(id, now);
        }
        if expired > 0 {
            debug!(target: "beanstore::manager", expired, "Sweep complete");
        }
        Ok(expired)
    }

    /// Next scheduled expiration, if any
    pub fn next_expiration(&self) -> Option<Timestamp> {
        self.inner
            .expiration
            .as_ref()
            .and_then(ExpirationTracker::next_expiration)
    }

    /// Run `f` as one unit of work.
    ///
    /// Writes made through the scope become visible together when `f`
    /// returns `Ok`. If `f` fails, or the commit does, nothing is written and
    /// beans created in the scope are invalidated.
    pub fn batch<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut BatchScope<'_, I, T>) -> Result<R>,
    {
        let _op = self.inner.begin()?;
        let mut scope = BatchScope::new(&self.inner);
        let result = f(&mut scope);
        scope.finish(result)
    }

    fn group_of(&self, id: &I) -> I {
        self.inner
            .beans
            .get(id)
            .map(|bean| bean.group_id().clone())
            .unwrap_or_else(|| id.clone())
    }
}

impl<I: BeanKey, T: BeanState> BeanManager<I, T> for DistributedBeanManager<I, T> {
    fn create_bean(&self, id: I, group_id: I, instance: T) -> Result<Arc<Bean<I, T>>> {
        let _op = self.inner.begin()?;
        self.inner.create(id, group_id, instance)
    }

    fn find_bean(&self, id: &I) -> Result<Option<Arc<Bean<I, T>>>> {
        let _op = self.inner.begin()?;
        self.inner.find(id)
    }

    fn contains_bean(&self, id: &I) -> Result<bool> {
        let _op = self.inner.begin()?;
        self.inner.contains(id)
    }

    fn identifier_factory(&self) -> Arc<dyn IdentifierFactory<I>> {
        Arc::clone(&self.inner.identifiers)
    }

    fn batcher(&self) -> Arc<dyn Batcher> {
        Arc::new(CacheBatcher::new(self.inner.cache()))
    }

    fn start(&self) -> Result<()> {
        let inner = &self.inner;
        let mut lifecycle = inner.lifecycle.lock();
        match lifecycle.state {
            ManagerState::Running => return Ok(()),
            ManagerState::Stopping => {
                return Err(Error::NotRunning(format!(
                    "{} is stopping",
                    inner.context.bean_name()
                )))
            }
            ManagerState::Stopped => {}
        }

        if let Some(registration) = &inner.registration {
            registration.start()?;
            match registration.cache() {
                Ok(cache) => *inner.cache.write() = Arc::new(cache),
                Err(e) => {
                    registration.stop();
                    return Err(e.into());
                }
            }
        }

        let grid = inner.container.grid();
        inner.resolver.on_topology_change(&grid.topology());
        let listener: Arc<dyn GridListener> = inner.resolver.clone();
        *inner.listener.lock() = Some(grid.add_listener(listener));

        lifecycle.state = ManagerState::Running;
        info!(
            target: "beanstore::manager",
            bean = inner.context.bean_name(),
            deployment = %inner.context.deployment(),
            cache = %inner.cache_name,
            member = %self.local_member(),
            "Bean manager started"
        );
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let inner = &self.inner;
        {
            let mut lifecycle = inner.lifecycle.lock();
            loop {
                match lifecycle.state {
                    ManagerState::Stopped => return Ok(()),
                    // Another caller is stopping; wait for it to finish or give up.
                    ManagerState::Stopping => inner.drained.wait(&mut lifecycle),
                    ManagerState::Running => break,
                }
            }
            lifecycle.state = ManagerState::Stopping;
            let deadline = inner.stop_timeout.map(|timeout| Instant::now() + timeout);
            while lifecycle.in_flight > 0 {
                match deadline {
                    Some(deadline) => {
                        if inner.drained.wait_until(&mut lifecycle, deadline).timed_out()
                            && lifecycle.in_flight > 0
                        {
                            let in_flight = lifecycle.in_flight;
                            lifecycle.state = ManagerState::Running;
                            inner.drained.notify_all();
                            warn!(
                                target: "beanstore::manager",
                                in_flight,
                                "Stop timed out waiting for in-flight operations"
                            );
                            return Err(Error::StopTimeout { in_flight });
                        }
                    }
                    None => inner.drained.wait(&mut lifecycle),
                }
            }
        }

        let beans: Vec<Arc<Bean<I, T>>> = inner
            .beans
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let mut passivated = 0;
        let mut first_error = None;
        for bean in beans {
            match bean.close() {
                Ok(()) => passivated += 1,
                Err(e) if e.is_contract_violation() => {
                    warn!(target: "beanstore::manager", id = %bean.id(), "Bean still acquired at stop");
                }
                Err(e) => {
                    warn!(target: "beanstore::manager", id = %bean.id(), error = %e, "Failed to passivate bean");
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(id) = inner.listener.lock().take() {
            inner.container.grid().remove_listener(id);
        }
        if let Some(registration) = &inner.registration {
            if registration.stop() {
                match inner.container.get_cache(&inner.cache_name) {
                    Ok(cache) => *inner.cache.write() = Arc::new(cache),
                    Err(e) => {
                        warn!(target: "beanstore::manager", error = %e, "Failed to reopen cache without near cache");
                    }
                }
            }
        }

        inner.lifecycle.lock().state = ManagerState::Stopped;
        inner.drained.notify_all();
        info!(
            target: "beanstore::manager",
            bean = inner.context.bean_name(),
            passivated,
            "Bean manager stopped"
        );
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<I: BeanKey, T> std::fmt::Debug for DistributedBeanManager<I, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedBeanManager")
            .field("bean", &self.inner.context.bean_name())
            .field("cache", &self.inner.cache_name)
            .field("beans", &self.inner.beans.len())
            .field("state", &self.inner.lifecycle.lock().state)
            .finish()
    }
}
