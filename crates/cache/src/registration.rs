//! At-most-once near-cache registration for a cache client
//!
//! [`CacheClientRegistration`] owns the lifecycle of one near-cache factory
//! registration. The state is a single atomic cell:
//!
//! ```text
//! UNREGISTERED --start--> STARTING --ok--> REGISTERED --stop--> STOPPING --> UNREGISTERED
//!                            |  \
//!                            |   +--stop--> STOP_PENDING --ok--> STOPPING --> UNREGISTERED
//!                            |                   |
//!                            +--err--------------+--err--> UNREGISTERED
//! ```
//!
//! Only the caller whose compare-and-swap moves the cell out of `UNREGISTERED`
//! (or out of `REGISTERED`) performs the side effect. Every other concurrent
//! caller observes a state it does not own and returns without acting. A stop
//! that arrives while a start is registering is recorded as `STOP_PENDING` and
//! the starting thread deregisters before it returns.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::container::{NearCacheRegistration, RemoteCacheContainer};
use crate::error::Result;
use crate::near_cache::NearCacheFactory;
use crate::remote_cache::RemoteCache;

const UNREGISTERED: u8 = 0;
const STARTING: u8 = 1;
const REGISTERED: u8 = 2;
const STOPPING: u8 = 3;
const STOP_PENDING: u8 = 4;

/// Lifecycle wrapper registering a near cache for one remote cache.
pub struct CacheClientRegistration {
    container: Arc<RemoteCacheContainer>,
    cache_name: String,
    factory: Arc<dyn NearCacheFactory>,
    state: AtomicU8,
    /// Written only by the thread that owns the current transition
    token: Mutex<Option<NearCacheRegistration>>,
    registrations: AtomicU64,
    deregistrations: AtomicU64,
}

impl CacheClientRegistration {
    /// Prepare a registration; nothing happens until [`start`](Self::start)
    pub fn new(
        container: Arc<RemoteCacheContainer>,
        cache_name: impl Into<String>,
        factory: Arc<dyn NearCacheFactory>,
    ) -> Self {
        CacheClientRegistration {
            container,
            cache_name: cache_name.into(),
            factory,
            state: AtomicU8::new(UNREGISTERED),
            token: Mutex::new(None),
            registrations: AtomicU64::new(0),
            deregistrations: AtomicU64::new(0),
        }
    }

    /// Register the near-cache factory unless already registered.
    ///
    /// Returns true if this call performed the registration. A concurrent
    /// [`stop`](Self::stop) issued meanwhile is honored before returning,
    /// so the factory may already be deregistered again.
    ///
    /// # Errors
    ///
    /// Propagates the container's registration error; the cell then returns
    /// to unregistered so a later `start` may try again.
    pub fn start(&self) -> Result<bool> {
        if self
            .state
            .compare_exchange(UNREGISTERED, STARTING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(target: "beanstore::cache", cache = %self.cache_name, "Registration already active");
            return Ok(false);
        }
        self.complete_start()
    }

    /// Second half of `start`, run by the thread that moved the cell to
    /// `STARTING`.
    fn complete_start(&self) -> Result<bool> {
        let token = match self
            .container
            .register_near_cache_factory(&self.cache_name, Arc::clone(&self.factory))
        {
            Ok(token) => token,
            Err(e) => {
                // Nothing was registered, so a pending stop has nothing to undo.
                self.state.store(UNREGISTERED, Ordering::Release);
                warn!(target: "beanstore::cache", cache = %self.cache_name, error = %e, "Cache client registration failed");
                return Err(e);
            }
        };
        *self.token.lock() = Some(token);
        self.registrations.fetch_add(1, Ordering::Relaxed);

        if self
            .state
            .compare_exchange(STARTING, REGISTERED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            info!(target: "beanstore::cache", cache = %self.cache_name, "Cache client registered");
        } else {
            // Only a stop can move the cell out of STARTING.
            self.state.store(STOPPING, Ordering::Release);
            debug!(target: "beanstore::cache", cache = %self.cache_name, "Stop requested during registration");
            self.deregister();
        }
        Ok(true)
    }

    /// Deregister the near-cache factory if registered.
    ///
    /// Returns true if this call performed the deregistration, or handed it
    /// to a [`start`](Self::start) that is still registering.
    pub fn stop(&self) -> bool {
        loop {
            match self.state.compare_exchange(
                REGISTERED,
                STOPPING,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.deregister();
                    return true;
                }
                Err(STARTING) => {
                    if self
                        .state
                        .compare_exchange(STARTING, STOP_PENDING, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        debug!(target: "beanstore::cache", cache = %self.cache_name, "Stop handed to in-progress start");
                        return true;
                    }
                    // The start finished or failed; look again.
                }
                Err(_) => return false,
            }
        }
    }

    /// Close the registration token; the cell must be `STOPPING`
    fn deregister(&self) {
        let token = self.token.lock().take();
        if let Some(token) = token {
            token.close();
        }
        self.deregistrations.fetch_add(1, Ordering::Relaxed);
        self.state.store(UNREGISTERED, Ordering::Release);
        info!(target: "beanstore::cache", cache = %self.cache_name, "Cache client deregistered");
    }

    /// Whether the near-cache factory is currently registered
    pub fn is_registered(&self) -> bool {
        self.state.load(Ordering::Acquire) == REGISTERED
    }

    /// Cache name
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// Instantiate the remote cache (with its near cache when registered)
    pub fn cache(&self) -> Result<RemoteCache> {
        self.container.get_cache(&self.cache_name)
    }

    /// Registrations performed over this handle's lifetime
    pub fn registrations(&self) -> u64 {
        self.registrations.load(Ordering::Relaxed)
    }

    /// Deregistrations performed over this handle's lifetime
    pub fn deregistrations(&self) -> u64 {
        self.deregistrations.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for CacheClientRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheClientRegistration")
            .field("cache_name", &self.cache_name)
            .field("state", &self.state.load(Ordering::Relaxed))
            .finish()
    }
}
