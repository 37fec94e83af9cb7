//! Idle expiration scheduling
//!
//! Tracks which identifiers should expire and when. Expiration is never
//! triggered by a timer here; a sweeper calls [`ExpirationTracker::poll_expired`]
//! with the current time and acts on what it gets back.
//!
//! An identifier is in one of three states:
//! - untracked
//! - tracked and scheduled (`track`)
//! - tracked but unscheduled (`invalidate`, e.g. while a bean is acquired)

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::hash::Hash;

use beanstore_core::{Time, Timestamp};

/// Position in the schedule: deadline, then insertion sequence
type Slot = (Timestamp, u64);

struct Schedule<I> {
    by_deadline: BTreeMap<Slot, I>,
    tracked: FxHashMap<I, Option<Slot>>,
    next_seq: u64,
}

impl<I: Clone + Eq + Hash> Schedule<I> {
    fn unschedule(&mut self, id: &I) {
        if let Some(slot) = self.tracked.get_mut(id).and_then(Option::take) {
            self.by_deadline.remove(&slot);
        }
    }

    fn schedule(&mut self, id: I, deadline: Timestamp) {
        self.unschedule(&id);
        let slot = (deadline, self.next_seq);
        self.next_seq += 1;
        self.by_deadline.insert(slot, id.clone());
        self.tracked.insert(id, Some(slot));
    }
}

/// Schedules identifiers to expire a fixed time after they were last tracked.
pub struct ExpirationTracker<I> {
    timeout: Time,
    schedule: Mutex<Schedule<I>>,
}

impl<I: Clone + Eq + Hash> ExpirationTracker<I> {
    /// Tracker expiring identifiers `timeout` after tracking
    pub fn new(timeout: Time) -> Self {
        ExpirationTracker {
            timeout,
            schedule: Mutex::new(Schedule {
                by_deadline: BTreeMap::new(),
                tracked: FxHashMap::default(),
                next_seq: 0,
            }),
        }
    }

    /// Configured timeout
    pub fn timeout(&self) -> Time {
        self.timeout
    }

    /// Schedule `id` to expire `timeout` from now
    pub fn track(&self, id: I) {
        self.track_at(id, Timestamp::now());
    }

    /// Schedule `id` to expire `timeout` after `now`, replacing any earlier
    /// schedule for it
    pub fn track_at(&self, id: I, now: Timestamp) {
        self.schedule
            .lock()
            .schedule(id, now.saturating_add(self.timeout));
    }

    /// Cancel the scheduled expiration but keep `id` tracked
    pub fn invalidate(&self, id: &I) {
        self.schedule.lock().unschedule(id);
    }

    /// Schedule `id` again unless it is already scheduled.
    ///
    /// Used after an expiration attempt failed or was deferred.
    pub fn retry(&self, id: I) {
        self.retry_at(id, Timestamp::now());
    }

    /// [`retry`](Self::retry) with an explicit clock
    pub fn retry_at(&self, id: I, now: Timestamp) {
        let mut schedule = self.schedule.lock();
        if !matches!(schedule.tracked.get(&id), Some(Some(_))) {
            schedule.schedule(id, now.saturating_add(self.timeout));
        }
    }

    /// Stop tracking `id`
    pub fn forget(&self, id: &I) {
        let mut schedule = self.schedule.lock();
        schedule.unschedule(id);
        schedule.tracked.remove(id);
    }

    /// Remove and return the earliest identifier due at `now`
    pub fn poll_expired(&self, now: Timestamp) -> Option<I> {
        let mut schedule = self.schedule.lock();
        let (&slot, _) = schedule.by_deadline.iter().next()?;
        if slot.0 > now {
            return None;
        }
        let id = schedule.by_deadline.remove(&slot)?;
        schedule.tracked.remove(&id);
        Some(id)
    }

    /// Earliest scheduled deadline
    pub fn next_expiration(&self) -> Option<Timestamp> {
        self.schedule
            .lock()
            .by_deadline
            .keys()
            .next()
            .map(|(deadline, _)| *deadline)
    }

    /// Every tracked identifier, scheduled or not
    pub fn tracked_ids(&self) -> Vec<I> {
        self.schedule.lock().tracked.keys().cloned().collect()
    }

    /// Whether `id` is tracked
    pub fn is_tracked(&self, id: &I) -> bool {
        self.schedule.lock().tracked.contains_key(id)
    }
}

impl<I> std::fmt::Debug for ExpirationTracker<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpirationTracker")
            .field("timeout", &self.timeout)
            .field("tracked", &self.schedule.lock().tracked.len())
            .finish()
    }
}
