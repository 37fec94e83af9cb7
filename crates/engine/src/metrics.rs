//! Bean manager counters
//!
//! All counters use Relaxed ordering: they are observational and never used
//! for synchronization, so a snapshot may be momentarily inconsistent across
//! fields.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lifetime counters of one bean manager.
#[derive(Debug, Default)]
pub struct BeanManagerMetrics {
    created: AtomicU64,
    found: AtomicU64,
    removed: AtomicU64,
    expired: AtomicU64,
    closed: AtomicU64,
}

impl BeanManagerMetrics {
    /// Zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_found(&self) {
        self.found.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_removed(&self) {
        self.removed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expired(&self) {
        self.expired.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_closed(&self) {
        self.closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            created: self.created.load(Ordering::Relaxed),
            found: self.found.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            closed: self.closed.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`BeanManagerMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Beans created
    pub created: u64,
    /// Lookups that returned a bean
    pub found: u64,
    /// Explicit removals
    pub removed: u64,
    /// Beans removed by idle expiration
    pub expired: u64,
    /// Bean handles closed
    pub closed: u64,
}

impl MetricsSnapshot {
    /// Beans created but neither removed nor expired yet
    pub fn live(&self) -> u64 {
        self.created
            .saturating_sub(self.removed)
            .saturating_sub(self.expired)
    }
}
