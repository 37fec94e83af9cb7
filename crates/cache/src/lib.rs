//! Remote cache client layer
//!
//! - RemoteGrid / InMemoryGrid: the data grid collaborator
//! - Topology: membership views and owner ranking
//! - RemoteCache: one named cache, optionally fronted by a near cache
//! - RemoteCacheContainer: cache instantiation and near-cache factories
//! - CacheClientRegistration: at-most-once near-cache registration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod container;
pub mod error;
pub mod grid;
pub mod near_cache;
pub mod registration;
pub mod remote_cache;
pub mod topology;

pub use container::{NearCacheRegistration, RemoteCacheContainer};
pub use error::{CacheError, Result};
pub use grid::{GridListener, InMemoryGrid, ListenerId, RemoteGrid, WriteOp};
pub use near_cache::{DefaultNearCache, DefaultNearCacheFactory, NearCache, NearCacheFactory};
pub use registration::CacheClientRegistration;
pub use remote_cache::RemoteCache;
pub use topology::Topology;
