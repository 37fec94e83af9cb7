//! Expiration Tests
//!
//! Idle beans expire lazily on lookup and through explicit sweeps.

use crate::common::*;
use std::thread;
use std::time::Duration;

fn later(secs: u64) -> Timestamp {
    Timestamp::now().saturating_add(Time::seconds(secs))
}

// ============================================================================
// Sweeps
// ============================================================================

#[test]
fn sweep_expires_idle_beans() {
    let grid = cluster(1, 1);
    let manager = manager_with(&grid, Some(Time::seconds(10)), BeanstoreConfig::default());
    let bean = new_cart(&manager, "ann");
    let id = bean.id().clone();

    let deadline = manager.next_expiration().unwrap();
    assert!(deadline >= bean.last_accessed().saturating_add(Time::seconds(10)));

    assert_eq!(manager.sweep(Timestamp::now()).unwrap(), 0);
    assert_eq!(manager.sweep(later(11)).unwrap(), 1);

    assert!(bean.is_closed());
    assert!(!bean.is_valid());
    assert_eq!(grid.len("beans"), 0);
    assert!(manager.find_bean(&id).unwrap().is_none());
    assert!(manager.next_expiration().is_none());

    let metrics = manager.metrics();
    assert_eq!(metrics.expired, 1);
    assert_eq!(metrics.live(), 0);
}

#[test]
fn acquired_beans_do_not_expire() {
    let grid = cluster(1, 1);
    let manager = manager_with(&grid, Some(Time::seconds(10)), BeanstoreConfig::default());
    let bean = new_cart(&manager, "ann");

    bean.acquire().unwrap();
    assert!(manager.next_expiration().is_none());
    assert_eq!(manager.sweep(later(60)).unwrap(), 0);
    assert!(!bean.is_expired_at(later(60)));

    // Releasing reschedules from the release time.
    assert!(bean.release().unwrap());
    assert!(manager.next_expiration().is_some());
    assert_eq!(manager.sweep(later(60)).unwrap(), 1);
    assert!(bean.is_closed());
}

#[test]
fn sweep_without_timeout_is_noop() {
    let grid = cluster(1, 1);
    let manager = manager(&grid);
    new_cart(&manager, "ann");

    assert!(manager.next_expiration().is_none());
    assert_eq!(manager.sweep(later(3600)).unwrap(), 0);
    assert_eq!(manager.len(), 1);
}

#[test]
fn sweep_expires_passivated_entries() {
    let grid = cluster(1, 1);
    let manager = manager_with(&grid, Some(Time::seconds(10)), BeanstoreConfig::default());
    let bean = new_cart(&manager, "ann");
    bean.close().unwrap();
    assert_eq!(grid.len("beans"), 1);

    assert_eq!(manager.sweep(later(11)).unwrap(), 1);
    assert_eq!(grid.len("beans"), 0);
}

#[test]
fn failed_expiration_is_retried() {
    let grid = cluster(1, 1);
    let manager = manager_with(&grid, Some(Time::seconds(10)), BeanstoreConfig::default());
    let id = new_cart(&manager, "ann").id().clone();

    grid.set_reachable(false);
    assert_eq!(manager.sweep(later(11)).unwrap(), 0);
    grid.set_reachable(true);

    assert!(manager.next_expiration().is_some());
    assert_eq!(grid.len("beans"), 1);
    assert_eq!(manager.sweep(later(30)).unwrap(), 1);
    assert_eq!(grid.len("beans"), 0);
    assert!(!manager.contains_bean(&id).unwrap());
}

// ============================================================================
// Lazy expiry
// ============================================================================

#[test]
fn find_expires_stale_bean() {
    let grid = cluster(1, 1);
    let manager = manager_with(&grid, Some(Time::millis(20)), BeanstoreConfig::default());
    let bean = new_cart(&manager, "ann");
    let id = bean.id().clone();

    thread::sleep(Duration::from_millis(60));
    assert!(bean.is_expired());
    assert!(manager.find_bean(&id).unwrap().is_none());
    assert!(bean.is_closed());
    assert_eq!(grid.len("beans"), 0);
    assert_eq!(manager.metrics().expired, 1);
}

#[test]
fn load_discards_stale_entry() {
    let grid = cluster(1, 1);
    let manager = manager_with(&grid, Some(Time::millis(20)), BeanstoreConfig::default());
    let bean = new_cart(&manager, "ann");
    let id = bean.id().clone();
    bean.close().unwrap();

    thread::sleep(Duration::from_millis(60));
    assert!(manager.find_bean(&id).unwrap().is_none());
    assert_eq!(grid.len("beans"), 0);
    assert_eq!(manager.metrics().expired, 1);
}

#[test]
fn is_expired_does_not_change_state() {
    let grid = cluster(1, 1);
    let manager = manager_with(&grid, Some(Time::seconds(10)), BeanstoreConfig::default());
    let bean = new_cart(&manager, "ann");

    assert!(bean.is_expired_at(later(11)));
    assert!(bean.is_valid());
    assert!(!bean.is_closed());
    assert_eq!(manager.len(), 1);
    bean.acquire().unwrap();
    bean.release().unwrap();
}
