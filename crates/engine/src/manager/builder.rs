//! Bean manager builder

use dashmap::{DashMap, DashSet};
use parking_lot::{Condvar, Mutex, RwLock};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use beanstore_affinity::{AffinityRouter, RouteRegistry, TopologyAffinityResolver};
use beanstore_cache::{
    CacheClientRegistration, DefaultNearCacheFactory, NearCacheFactory, RemoteCacheContainer,
};
use beanstore_core::{BeanContext, BeanstoreConfig};
use beanstore_marshalling::{Marshaller, MarshallingRegistry};

use super::{
    BeanState, DistributedBeanManager, Lifecycle, ManagerHooks, ManagerInner, ManagerState,
};
use crate::error::Result;
use crate::expiration::ExpirationTracker;
use crate::identifier::{BeanKey, IdentifierFactory};
use crate::metrics::BeanManagerMetrics;

// ============================================================================
// Bean Manager Builder
// ============================================================================

/// Fluent configuration for a [`DistributedBeanManager`].
///
/// ```ignore
/// let manager = DistributedBeanManager::builder(context, container, identifiers)
///     .config(BeanstoreConfig::from_file(path)?)
///     .route("a1")
///     .build()?;
/// manager.start()?;
/// ```
pub struct BeanManagerBuilder<I, T> {
    context: BeanContext,
    container: Arc<RemoteCacheContainer>,
    identifiers: Arc<dyn IdentifierFactory<I>>,
    config: BeanstoreConfig,
    marshaller: Option<Marshaller>,
    route: Option<String>,
    near_cache_factory: Option<Arc<dyn NearCacheFactory>>,
    _state: PhantomData<fn() -> T>,
}

impl<I: BeanKey, T: BeanState> BeanManagerBuilder<I, T> {
    /// Builder with default configuration
    pub fn new(
        context: BeanContext,
        container: Arc<RemoteCacheContainer>,
        identifiers: Arc<dyn IdentifierFactory<I>>,
    ) -> Self {
        Self {
            context,
            container,
            identifiers,
            config: BeanstoreConfig::default(),
            marshaller: None,
            route: None,
            near_cache_factory: None,
            _state: PhantomData,
        }
    }

    /// Use `config` (cache name, affinity, near cache, retry, stop timeout)
    pub fn config(mut self, config: BeanstoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Marshaller for bean entries (default: MessagePack)
    pub fn marshaller(mut self, marshaller: Marshaller) -> Self {
        self.marshaller = Some(marshaller);
        self
    }

    /// Route token this member advertises in affinity cookies
    /// (default: the member name)
    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    /// Near-cache factory used when the near cache is enabled
    /// (default: [`DefaultNearCacheFactory`] sized from the config)
    pub fn near_cache_factory(mut self, factory: Arc<dyn NearCacheFactory>) -> Self {
        self.near_cache_factory = Some(factory);
        self
    }

    /// Validate the configuration and assemble the manager (not started).
    ///
    /// The bean context's idle timeout takes precedence over the config's.
    ///
    /// # Errors
    ///
    /// Invalid configuration, an invalid route token, or an invalid cache
    /// name.
    pub fn build(self) -> Result<DistributedBeanManager<I, T>> {
        self.config.validate()?;

        let grid = Arc::clone(self.container.grid());
        let local = grid.local_member();
        let routes = Arc::new(match self.route {
            Some(route) => RouteRegistry::new(local, route)?,
            None => RouteRegistry::for_member(local)?,
        });
        let resolver = Arc::new(TopologyAffinityResolver::new(
            grid.topology(),
            self.config.affinity.clone(),
            Arc::clone(&routes),
        ));
        let router = AffinityRouter::new(routes, self.config.retry.clone());

        let cache = Arc::new(self.container.get_cache(&self.config.cache_name)?);
        let registration = if self.config.near_cache.enabled {
            let factory: Arc<dyn NearCacheFactory> = match self.near_cache_factory {
                Some(factory) => factory,
                None => Arc::new(DefaultNearCacheFactory::new(self.config.near_cache.max_entries)),
            };
            Some(CacheClientRegistration::new(
                Arc::clone(&self.container),
                self.config.cache_name.clone(),
                factory,
            ))
        } else {
            None
        };

        let marshaller = self
            .marshaller
            .unwrap_or_else(|| Marshaller::msgpack(Arc::new(MarshallingRegistry::with_defaults())));
        let idle_timeout = self.context.idle_timeout().or(self.config.idle_timeout);

        let inner = Arc::new_cyclic(|weak| ManagerInner {
            context: self.context,
            container: self.container,
            cache_name: self.config.cache_name,
            cache: RwLock::new(cache),
            registration,
            marshaller,
            resolver,
            router,
            identifiers: self.identifiers,
            idle_timeout,
            beans: DashMap::new(),
            reserved: DashSet::new(),
            groups: DashMap::new(),
            expiration: idle_timeout.map(ExpirationTracker::new),
            metrics: BeanManagerMetrics::new(),
            lifecycle: Mutex::new(Lifecycle {
                state: ManagerState::Stopped,
                in_flight: 0,
            }),
            drained: Condvar::new(),
            stop_timeout: self.config.stop_timeout_ms.map(Duration::from_millis),
            listener: Mutex::new(None),
            hooks: Arc::new(ManagerHooks {
                inner: weak.clone(),
            }),
        });
        Ok(DistributedBeanManager { inner })
    }
}

impl<I, T> std::fmt::Debug for BeanManagerBuilder<I, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeanManagerBuilder")
            .field("bean", &self.context.bean_name())
            .field("config", &self.config)
            .field("route", &self.route)
            .finish()
    }
}
