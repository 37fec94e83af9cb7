//! Beanstore - distributed stateful-bean manager
//!
//! Beanstore creates, locates, reference-counts, expires and removes
//! server-side stateful units ("beans") whose state lives in a remote data
//! grid shared by a cluster of members.
//!
//! # Quick Start
//!
//! ```ignore
//! use beanstore::{
//!     BeanConfiguration, BeanManager, DeploymentId, DistributedBeanManager, InMemoryGrid,
//!     RemoteCacheContainer, UuidIdentifierFactory,
//! };
//!
//! let grid = Arc::new(InMemoryGrid::new("node-a"));
//! let container = Arc::new(RemoteCacheContainer::new(grid));
//! let context = BeanConfiguration::new("cart", DeploymentId::new("shop", "web")).into_context();
//!
//! let manager = DistributedBeanManager::builder(context, container, Arc::new(UuidIdentifierFactory))
//!     .build()?;
//! manager.start()?;
//!
//! let id = manager.identifier_factory().create_identifier();
//! let bean = manager.create_bean(id, id, vec!["apple".to_string()])?;
//! bean.acquire()?;
//! bean.with_instance(|cart| cart.push("pear".into()));
//! bean.release()?;
//! ```
//!
//! # Architecture
//!
//! - `beanstore-core`: time values, identifiers, bean configuration, TOML config
//! - `beanstore-marshalling`: media types, transcoders and the encoder registry
//! - `beanstore-cache`: remote grid client, near caches, client registration
//! - `beanstore-affinity`: affinity descriptors, resolution and failover routing
//! - `beanstore-engine`: beans, the bean manager, batching and expiration

pub use beanstore_affinity::{
    encode_routes, find_cookie, parse_routes, set_cookie_header, AffinityDescriptor,
    AffinityError, AffinityResolver, AffinityRouter, RouteRegistry, TopologyAffinityResolver,
    DEFAULT_MEMO_CAPACITY,
};
pub use beanstore_cache::{
    CacheClientRegistration, CacheError, DefaultNearCache, DefaultNearCacheFactory,
    GridListener, InMemoryGrid, ListenerId, NearCache, NearCacheFactory, NearCacheRegistration,
    RemoteCache, RemoteCacheContainer, RemoteGrid, Topology, WriteOp,
};
pub use beanstore_core::{
    AffinityConfig, AffinityPolicy, BeanConfiguration, BeanContext, BeanId, BeanstoreConfig,
    CacheKey, CoreError, DeploymentId, MemberId, NearCacheConfig, RetryConfig, Time, TimeUnit,
    Timestamp, CONFIG_FILE_NAME, DEFAULT_CACHE_NAME, DEFAULT_COOKIE_NAME,
};
pub use beanstore_engine::{
    Batch, BatchScope, Batcher, Bean, BeanEntry, BeanKey, BeanLifecycle, BeanManager,
    BeanManagerBuilder, BeanManagerMetrics, BeanState, CacheBatcher, DistributedBeanManager,
    EntryMetadata, Error, ExpirationTracker, IdentifierFactory, InstanceGuard,
    MemberScopedIdentifierFactory, MetricsSnapshot, Result, UuidIdentifierFactory,
};
pub use beanstore_marshalling::{
    Base64Transcoder, Encoder, EncoderRegistry, IdentityEncoder, IdentityWrapper,
    JsonEncoder, JsonTranscoder, LengthPrefixedWrapper, Lookup, Marshaller, MarshallingError,
    MarshallingRegistry, MediaType, Transcoder, Wrapper, APPLICATION_BASE64, APPLICATION_JSON,
    APPLICATION_MSGPACK, APPLICATION_OCTET_STREAM, IDENTITY_ENCODER_ID, IDENTITY_WRAPPER_ID,
    JSON_ENCODER_ID, LENGTH_PREFIXED_WRAPPER_ID, TEXT_PLAIN,
};
