//! Manager Lifecycle Tests
//!
//! start/stop idempotence, draining of in-flight operations and
//! passivation on stop.

use crate::common::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn start_and_stop_are_idempotent() {
    let grid = cluster(1, 1);
    let manager = manager(&grid);
    assert!(manager.is_running());

    manager.start().unwrap();
    assert!(manager.is_running());

    manager.stop().unwrap();
    manager.stop().unwrap();
    assert!(!manager.is_running());
}

#[test]
fn operations_rejected_when_stopped() {
    let grid = cluster(1, 1);
    let manager = manager(&grid);
    manager.stop().unwrap();

    let id = "b1".to_string();
    assert!(matches!(
        manager.create_bean(id.clone(), id.clone(), Cart::new("ann")),
        Err(Error::NotRunning(_))
    ));
    assert!(matches!(manager.find_bean(&id), Err(Error::NotRunning(_))));
    assert!(matches!(manager.contains_bean(&id), Err(Error::NotRunning(_))));
    assert!(matches!(manager.remove_bean(&id), Err(Error::NotRunning(_))));
    assert!(matches!(manager.sweep(Timestamp::now()), Err(Error::NotRunning(_))));
    assert!(matches!(manager.batch(|_| Ok(())), Err(Error::NotRunning(_))));

    // Rejections are not retried elsewhere.
    let err = manager.find_bean(&id).unwrap_err();
    assert!(!manager.is_remotable(&err));
}

#[test]
fn stop_passivates_and_restart_reloads() {
    let grid = cluster(1, 1);
    let manager = manager(&grid);
    let bean = new_cart(&manager, "ann");
    let id = bean.id().clone();
    bean.acquire().unwrap();
    bean.with_instance(|cart| cart.items.push("tea".into()));
    bean.release().unwrap();

    manager.stop().unwrap();
    assert!(bean.is_closed());
    assert!(manager.is_empty());
    assert_eq!(grid.len("beans"), 1);

    manager.start().unwrap();
    let reloaded = manager.find_bean(&id).unwrap().unwrap();
    assert_eq!(reloaded.instance().items, vec!["tea".to_string()]);
}

#[test]
fn stop_leaves_acquired_beans_open() {
    let grid = cluster(1, 1);
    let manager = manager(&grid);
    let bean = new_cart(&manager, "ann");
    bean.acquire().unwrap();

    manager.stop().unwrap();
    assert!(!bean.is_closed());
    assert_eq!(manager.len(), 1);

    bean.release().unwrap();
    bean.close().unwrap();
}

#[test]
fn stop_waits_for_in_flight_batch() {
    let grid = cluster(1, 1);
    let manager = Arc::new(manager(&grid));
    let finished = Arc::new(AtomicBool::new(false));
    let (started_tx, started_rx) = mpsc::channel();

    let worker = {
        let manager = Arc::clone(&manager);
        let finished = Arc::clone(&finished);
        thread::spawn(move || {
            manager.batch(|scope| {
                started_tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(100));
                scope.create_bean("late".into(), "late".into(), Cart::new("ann"))?;
                finished.store(true, Ordering::SeqCst);
                Ok(())
            })
        })
    };

    started_rx.recv().unwrap();
    manager.stop().unwrap();
    assert!(finished.load(Ordering::SeqCst));
    worker.join().unwrap().unwrap();

    // Committed by the batch, then passivated by stop.
    assert_eq!(grid.len("beans"), 1);
    assert!(manager.is_empty());
}

#[test]
fn stop_timeout_bounds_the_wait() {
    let grid = cluster(1, 1);
    let config = BeanstoreConfig {
        stop_timeout_ms: Some(50),
        ..BeanstoreConfig::default()
    };
    let manager = Arc::new(manager_with(&grid, None, config));
    let (started_tx, started_rx) = mpsc::channel();

    let worker = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || {
            manager.batch(|_| {
                started_tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(1000));
                Ok(())
            })
        })
    };

    started_rx.recv().unwrap();
    let begun = Instant::now();
    match manager.stop() {
        Err(Error::StopTimeout { in_flight }) => assert_eq!(in_flight, 1),
        other => panic!("expected StopTimeout, got {:?}", other),
    }
    assert!(begun.elapsed() < Duration::from_millis(900));
    // Gave up: still accepting work.
    assert!(manager.is_running());
    assert!(manager.contains_bean(&"b1".to_string()).is_ok());

    worker.join().unwrap().unwrap();
    manager.stop().unwrap();
    assert!(!manager.is_running());
}

#[test]
fn concurrent_stops_all_wait_for_drain() {
    let grid = cluster(1, 1);
    let manager = Arc::new(manager(&grid));
    let finished = Arc::new(AtomicBool::new(false));
    let (started_tx, started_rx) = mpsc::channel();

    let worker = {
        let manager = Arc::clone(&manager);
        let finished = Arc::clone(&finished);
        thread::spawn(move || {
            manager.batch(|_| {
                started_tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(300));
                finished.store(true, Ordering::SeqCst);
                Ok(())
            })
        })
    };

    started_rx.recv().unwrap();
    let stoppers: Vec<_> = (0..3)
        .map(|i| {
            let manager = Arc::clone(&manager);
            let finished = Arc::clone(&finished);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20 * i));
                manager.stop().unwrap();
                finished.load(Ordering::SeqCst)
            })
        })
        .collect();

    for stopper in stoppers {
        assert!(stopper.join().unwrap(), "stop returned before the batch drained");
    }
    worker.join().unwrap().unwrap();
    assert!(!manager.is_running());
}

#[test]
fn is_remotable_classifies_errors() {
    let grid = cluster(1, 1);
    let manager = manager(&grid);

    grid.set_reachable(false);
    let unreachable = manager.find_bean(&"b1".to_string()).unwrap_err();
    grid.set_reachable(true);
    assert!(manager.is_remotable(&unreachable));

    let contract = Error::contract("b1", "close while acquired");
    assert!(!manager.is_remotable(&contract));
    assert!(!manager.is_remotable(&Error::DuplicateIdentifier("b1".into())));
}
