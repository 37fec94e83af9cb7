//! Reference-counted bean handles
//!
//! A [`Bean`] wraps one unit of distributed state. Request threads bracket
//! every use with `acquire()` / `release()`; the manager closes the bean once
//! it is idle and either expired or removed.
//!
//! ## State machine
//!
//! ```text
//! ACTIVE(count>0) <-> IDLE(count=0) --(idle timeout)--> EXPIRED --+
//!                          |                                       +--> CLOSED
//!                          +--------------(remove)------> REMOVED --+
//! ```
//!
//! The count and the closed flag share one atomic word, so `acquire` can never
//! slip in between a zero check and the close:
//!
//! - high bit: closed
//! - remaining bits: acquisition count
//!
//! Validity (removal) is a separate flag flipped exactly once.
//!
//! ## Write-back
//!
//! The manager writes the instance back to the grid when the bean goes idle
//! or is closed. The write never blocks on the instance lock: if a guard from
//! [`Bean::instance`] is still alive (typically on the thread calling
//! `release()`), the bean is marked dirty and the guard performs the write
//! when it is dropped.

use parking_lot::{Mutex, MutexGuard};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use beanstore_core::{Time, Timestamp};

use crate::error::{Error, Result};

const CLOSED: usize = 1 << (usize::BITS - 1);
const COUNT_MASK: usize = !CLOSED;

/// Callbacks the owning manager installs on its beans.
///
/// Hooks run on the calling thread with no bean lock held.
pub trait BeanLifecycle<I, T>: Send + Sync {
    /// First acquisition after being idle
    fn activated(&self, _bean: &Bean<I, T>) {}

    /// Count dropped to zero. An error is returned from `release()`.
    fn idle(&self, _bean: &Bean<I, T>) -> Result<()> {
        Ok(())
    }

    /// A write-back deferred behind an instance guard is due
    fn flush(&self, _bean: &Bean<I, T>) -> Result<()> {
        Ok(())
    }

    /// The bean was closed
    fn closed(&self, _bean: &Bean<I, T>) -> Result<()> {
        Ok(())
    }

    /// The bean was removed (runs after the removal listener)
    fn removed(&self, _bean: &Bean<I, T>) -> Result<()> {
        Ok(())
    }
}

/// A reference-counted handle to one bean instance.
pub struct Bean<I, T> {
    id: I,
    group_id: I,
    instance: Mutex<T>,
    state: AtomicUsize,
    valid: AtomicBool,
    /// Set while a write-back is pending or last failed
    dirty: AtomicBool,
    last_accessed: AtomicU64,
    idle_timeout: Option<Time>,
    lifecycle: Option<Arc<dyn BeanLifecycle<I, T>>>,
}

impl<I, T> Bean<I, T>
where
    I: std::fmt::Display,
{
    /// Create an idle, valid bean with no lifecycle hooks
    pub fn new(id: I, group_id: I, instance: T, idle_timeout: Option<Time>) -> Self {
        Bean {
            id,
            group_id,
            instance: Mutex::new(instance),
            state: AtomicUsize::new(0),
            valid: AtomicBool::new(true),
            dirty: AtomicBool::new(false),
            last_accessed: AtomicU64::new(Timestamp::now().as_millis()),
            idle_timeout,
            lifecycle: None,
        }
    }

    /// Install lifecycle hooks
    pub fn with_lifecycle(mut self, lifecycle: Arc<dyn BeanLifecycle<I, T>>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Override the last access time (e.g. when loaded from the grid)
    pub fn with_last_accessed(self, at: Timestamp) -> Self {
        self.last_accessed.store(at.as_millis(), Ordering::Relaxed);
        self
    }

    /// Bean identifier
    pub fn id(&self) -> &I {
        &self.id
    }

    /// Group identifier
    pub fn group_id(&self) -> &I {
        &self.group_id
    }

    /// Lock the instance.
    ///
    /// The guard may be held across `release()` or `close()`; a write-back
    /// that finds it held runs when the guard is dropped.
    pub fn instance(&self) -> InstanceGuard<'_, I, T> {
        InstanceGuard {
            bean: self,
            guard: self.instance.lock(),
        }
    }

    /// Run `f` with exclusive access to the instance
    pub fn with_instance<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.instance())
    }

    /// Whether a write-back is pending or last failed
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Current acquisition count
    pub fn acquisition_count(&self) -> usize {
        self.state.load(Ordering::Acquire) & COUNT_MASK
    }

    /// Whether `close` has completed its transition
    pub fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) & CLOSED != 0
    }

    /// False once removed
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Last acquire or release
    pub fn last_accessed(&self) -> Timestamp {
        Timestamp::from_millis(self.last_accessed.load(Ordering::Relaxed))
    }

    /// Configured idle timeout; `None` never expires
    pub fn idle_timeout(&self) -> Option<Time> {
        self.idle_timeout
    }

    /// Whether the bean has been idle longer than its timeout
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Timestamp::now())
    }

    /// [`is_expired`](Self::is_expired) against an explicit clock.
    ///
    /// Acquired beans are never expired.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        match self.idle_timeout {
            Some(timeout) if self.acquisition_count() == 0 => {
                self.last_accessed().saturating_add(timeout) <= now
            }
            _ => false,
        }
    }

    /// Increment the acquisition count.
    ///
    /// # Errors
    ///
    /// `ContractViolation` if the bean is closed or removed.
    pub fn acquire(&self) -> Result<()> {
        if !self.is_valid() {
            return Err(Error::contract(&self.id, "acquire after remove"));
        }
        let previous = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                if state & CLOSED != 0 || state & COUNT_MASK == COUNT_MASK {
                    None
                } else {
                    Some(state + 1)
                }
            })
            .map_err(|state| {
                if state & CLOSED != 0 {
                    Error::contract(&self.id, "acquire after close")
                } else {
                    Error::contract(&self.id, "acquisition count overflow")
                }
            })?;
        self.touch();
        trace!(target: "beanstore::bean", id = %self.id, count = previous + 1, "Acquired");
        if previous == 0 {
            if let Some(lifecycle) = &self.lifecycle {
                lifecycle.activated(self);
            }
        }
        Ok(())
    }

    /// Decrement the acquisition count.
    ///
    /// Returns true iff the count reached zero on this call.
    ///
    /// # Errors
    ///
    /// `ContractViolation` on a release without a matching acquire. If the
    /// count reached zero but the idle write-back failed, that error is
    /// returned; the bean stays dirty and the write is retried by the next
    /// release, close or sweep.
    pub fn release(&self) -> Result<bool> {
        let previous = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                if state & COUNT_MASK == 0 {
                    None
                } else {
                    Some(state - 1)
                }
            })
            .map_err(|_| Error::contract(&self.id, "release without acquire"))?;
        self.touch();
        let idle = previous & COUNT_MASK == 1;
        trace!(target: "beanstore::bean", id = %self.id, idle, "Released");
        if idle {
            if let Some(lifecycle) = &self.lifecycle {
                lifecycle.idle(self)?;
            }
        }
        Ok(idle)
    }

    /// Close the bean. Closing an already closed bean does nothing.
    ///
    /// # Errors
    ///
    /// `ContractViolation` if the bean is still acquired.
    pub fn close(&self) -> Result<()> {
        match self
            .state
            .compare_exchange(0, CLOSED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                debug!(target: "beanstore::bean", id = %self.id, valid = self.is_valid(), "Closed");
                match &self.lifecycle {
                    Some(lifecycle) => lifecycle.closed(self),
                    None => Ok(()),
                }
            }
            Err(state) if state & CLOSED != 0 => Ok(()),
            Err(state) => Err(Error::contract(
                &self.id,
                format!("close while acquired (count {})", state & COUNT_MASK),
            )),
        }
    }

    /// Remove the bean, invoking `listener` exactly once across all calls.
    ///
    /// Returns true if this call performed the removal. Closed beans cannot be
    /// removed. `is_valid()` is already false when `listener` runs.
    pub fn remove<F>(&self, listener: F) -> Result<bool>
    where
        F: FnOnce(&Bean<I, T>),
    {
        if self.is_closed() || !self.invalidate() {
            return Ok(false);
        }
        debug!(target: "beanstore::bean", id = %self.id, "Removed");
        listener(self);
        if let Some(lifecycle) = &self.lifecycle {
            lifecycle.removed(self)?;
        }
        Ok(true)
    }

    /// Flip validity without running removal hooks; true for the call that
    /// flipped it.
    pub(crate) fn invalidate(&self) -> bool {
        self.valid.swap(false, Ordering::AcqRel)
    }

    /// Close without hooks if idle. Used by expiration, which does its own
    /// cleanup and must not passivate.
    pub(crate) fn try_close_idle(&self) -> bool {
        self.state
            .compare_exchange(0, CLOSED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Write the instance with `write` unless a guard holds it, in which case
    /// the write runs when that guard is dropped.
    pub(crate) fn write_back(&self, write: impl FnOnce(&T) -> Result<()>) -> Result<()> {
        // Marked before trying the lock so a guard released in between
        // still sees the pending write.
        self.dirty.store(true, Ordering::Release);
        let Some(instance) = self.instance.try_lock() else {
            trace!(target: "beanstore::bean", id = %self.id, "Write-back deferred to instance guard");
            return Ok(());
        };
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        write(&instance).map_err(|e| {
            self.dirty.store(true, Ordering::Release);
            e
        })
    }

    fn flush_deferred(&self) {
        if !self.is_dirty() || self.acquisition_count() != 0 {
            return;
        }
        if let Some(lifecycle) = &self.lifecycle {
            if let Err(e) = lifecycle.flush(self) {
                warn!(target: "beanstore::bean", id = %self.id, error = %e, "Deferred write-back failed");
            }
        }
    }

    fn touch(&self) {
        self.last_accessed
            .store(Timestamp::now().as_millis(), Ordering::Relaxed);
    }
}

/// Exclusive access to a bean's instance.
pub struct InstanceGuard<'a, I: std::fmt::Display, T> {
    bean: &'a Bean<I, T>,
    guard: MutexGuard<'a, T>,
}

impl<I: std::fmt::Display, T> Deref for InstanceGuard<'_, I, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<I: std::fmt::Display, T> DerefMut for InstanceGuard<'_, I, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<I: std::fmt::Display, T> Drop for InstanceGuard<'_, I, T> {
    fn drop(&mut self) {
        let bean = self.bean;
        if bean.is_dirty() {
            MutexGuard::unlocked(&mut self.guard, || bean.flush_deferred());
        }
    }
}

impl<I: std::fmt::Debug, T> std::fmt::Debug for Bean<I, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.load(Ordering::Relaxed);
        f.debug_struct("Bean")
            .field("id", &self.id)
            .field("group_id", &self.group_id)
            .field("count", &(state & COUNT_MASK))
            .field("closed", &(state & CLOSED != 0))
            .field("valid", &self.valid.load(Ordering::Relaxed))
            .field("dirty", &self.dirty.load(Ordering::Relaxed))
            .finish()
    }
}
