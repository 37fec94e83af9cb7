//! Registration Tests
//!
//! Concurrent start/stop of a cache client registration performs each side
//! effect once.

use crate::common::*;
use beanstore::{CacheClientRegistration, DefaultNearCacheFactory, NearCache, NearCacheFactory};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

fn container() -> Arc<RemoteCacheContainer> {
    init_tracing();
    Arc::new(RemoteCacheContainer::new(
        Arc::new(InMemoryGrid::new("node-0")) as Arc<dyn RemoteGrid>
    ))
}

fn registration(container: &Arc<RemoteCacheContainer>) -> Arc<CacheClientRegistration> {
    Arc::new(CacheClientRegistration::new(
        Arc::clone(container),
        "beans",
        Arc::new(DefaultNearCacheFactory::new(8)),
    ))
}

/// Run `f` on `n` threads released together; collect the results
fn race<R, F>(n: usize, f: F) -> Vec<R>
where
    R: Send + 'static,
    F: Fn() -> R + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let barrier = Arc::new(Barrier::new(n));
    let handles: Vec<_> = (0..n)
        .map(|_| {
            let f = Arc::clone(&f);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                f()
            })
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

#[test]
fn concurrent_start_registers_once() {
    let container = container();
    let registration = registration(&container);

    let started = {
        let registration = Arc::clone(&registration);
        race(8, move || registration.start().unwrap())
    };
    assert_eq!(started.iter().filter(|s| **s).count(), 1);
    assert!(registration.is_registered());
    assert_eq!(registration.registrations(), 1);
    assert_eq!(container.near_cache_factories("beans"), 1);

    assert!(registration.stop());
    assert!(!registration.stop());
    assert!(!registration.stop());
    assert_eq!(registration.deregistrations(), 1);
    assert_eq!(container.near_cache_factories("beans"), 0);
}

#[test]
fn concurrent_stop_deregisters_once() {
    let container = container();
    let registration = registration(&container);
    registration.start().unwrap();

    let stopped = {
        let registration = Arc::clone(&registration);
        race(8, move || registration.stop())
    };
    assert_eq!(stopped.iter().filter(|s| **s).count(), 1);
    assert_eq!(registration.deregistrations(), 1);
    assert_eq!(container.near_cache_factories("beans"), 0);
}

#[test]
fn each_cycle_has_one_side_effect_per_edge() {
    let container = container();
    let registration = registration(&container);

    for cycle in 1..=3 {
        let started = {
            let registration = Arc::clone(&registration);
            race(4, move || registration.start().unwrap())
        };
        assert_eq!(started.iter().filter(|s| **s).count(), 1);
        assert_eq!(container.near_cache_factories("beans"), 1);

        let stopped = {
            let registration = Arc::clone(&registration);
            race(4, move || registration.stop())
        };
        assert_eq!(stopped.iter().filter(|s| **s).count(), 1);
        assert_eq!(registration.registrations(), cycle);
        assert_eq!(registration.deregistrations(), cycle);
    }
    assert_eq!(container.near_cache_factories("beans"), 0);
}

#[test]
fn stop_racing_start_never_leaks_registration() {
    let container = container();
    let registration = registration(&container);

    for _ in 0..200 {
        let barrier = Arc::new(Barrier::new(2));
        let starter = {
            let registration = Arc::clone(&registration);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registration.start().unwrap()
            })
        };
        barrier.wait();
        let stopped = registration.stop();
        assert!(starter.join().unwrap());

        // A stop that saw the start always wins; one that ran first is a no-op.
        let factories = container.near_cache_factories("beans");
        assert_eq!(registration.is_registered(), factories == 1);
        assert_eq!(factories, usize::from(!stopped));
        assert_eq!(
            registration.registrations() - registration.deregistrations(),
            factories as u64
        );

        registration.stop();
        assert_eq!(container.near_cache_factories("beans"), 0);
    }
}

#[test]
fn failed_start_can_be_retried() {
    let container = container();
    let registration = CacheClientRegistration::new(
        Arc::clone(&container),
        " ",
        Arc::new(DefaultNearCacheFactory::new(8)),
    );
    assert!(registration.start().is_err());
    assert!(!registration.is_registered());
    assert!(registration.start().is_err());
    assert_eq!(registration.registrations(), 0);
    assert!(!registration.stop());
}

/// Counts the near caches it creates
struct CountingFactory {
    created: AtomicUsize,
}

impl NearCacheFactory for CountingFactory {
    fn create_near_cache(&self, cache_name: &str) -> Arc<dyn NearCache> {
        self.created.fetch_add(1, Ordering::SeqCst);
        DefaultNearCacheFactory::new(4).create_near_cache(cache_name)
    }
}

#[test]
fn closing_stale_registration_keeps_newer() {
    let container = container();
    let older = Arc::new(CountingFactory {
        created: AtomicUsize::new(0),
    });
    let newer = Arc::new(CountingFactory {
        created: AtomicUsize::new(0),
    });

    let older_handle = container
        .register_near_cache_factory("beans", Arc::clone(&older) as Arc<dyn NearCacheFactory>)
        .unwrap();
    let newer_handle = container
        .register_near_cache_factory("beans", Arc::clone(&newer) as Arc<dyn NearCacheFactory>)
        .unwrap();
    assert_eq!(container.near_cache_factories("beans"), 2);

    // The most recent registration wins.
    assert!(container.get_cache("beans").unwrap().near_cache().is_some());
    assert_eq!(newer.created.load(Ordering::SeqCst), 1);
    assert_eq!(older.created.load(Ordering::SeqCst), 0);

    assert!(older_handle.close());
    assert!(!older_handle.close());
    assert!(older_handle.is_closed());
    assert_eq!(container.near_cache_factories("beans"), 1);
    container.get_cache("beans").unwrap();
    assert_eq!(newer.created.load(Ordering::SeqCst), 2);

    assert!(newer_handle.close());
    assert!(container.get_cache("beans").unwrap().near_cache().is_none());
    assert_eq!(older.created.load(Ordering::SeqCst), 0);
}

#[test]
fn closure_factories_are_accepted() {
    let container = container();
    let handle = container
        .register_near_cache_factory(
            "beans",
            Arc::new(|_: &str| Arc::new(beanstore::DefaultNearCache::new(2)) as Arc<dyn NearCache>),
        )
        .unwrap();
    let cache = container.get_cache("beans").unwrap();
    assert_eq!(cache.near_cache().unwrap().len(), 0);
    handle.close();
}
