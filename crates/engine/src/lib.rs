//! Bean engine
//!
//! This crate orchestrates all lower layers:
//! - Bean: reference-counted handle with acquire/release/close/remove
//! - BeanManager: create, find and remove beans backed by the remote cache
//! - Batching: several manager operations as one unit of work
//! - Expiration: idle-timeout scheduling and sweeps
//!
//! The engine is the only component that knows about:
//! - Bean lifecycle and passivation
//! - Cross-layer coordination (cache + marshalling + affinity)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod bean;
pub mod entry;
pub mod error;
pub mod expiration;
pub mod identifier;
pub mod manager;
pub mod metrics;

pub use batch::{Batch, Batcher, CacheBatcher};
pub use bean::{Bean, BeanLifecycle, InstanceGuard};
pub use entry::{BeanEntry, EntryMetadata};
pub use error::{Error, Result};
pub use expiration::ExpirationTracker;
pub use identifier::{BeanKey, IdentifierFactory, MemberScopedIdentifierFactory, UuidIdentifierFactory};
pub use manager::{BatchScope, BeanManager, BeanManagerBuilder, BeanState, DistributedBeanManager};
pub use metrics::{BeanManagerMetrics, MetricsSnapshot};
