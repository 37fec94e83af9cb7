//! Core types for the bean store
//!
//! This crate defines the foundational values shared by every layer:
//! - Time / TimeUnit: unit-tagged durations compared after normalization
//! - Timestamp: millisecond wall-clock time carried with bean entries
//! - BeanId / MemberId: bean, group and cluster member identifiers
//! - BeanConfiguration / BeanContext: deployment-scoped bean descriptor
//! - BeanstoreConfig: `beanstore.toml` configuration
//! - RetryConfig: failover retry settings
//! - CoreError: configuration and parsing errors

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod context;
pub mod error;
pub mod retry;
pub mod time;
pub mod timestamp;
pub mod types;

pub use config::{
    AffinityConfig, AffinityPolicy, BeanstoreConfig, NearCacheConfig, CONFIG_FILE_NAME,
    DEFAULT_CACHE_NAME, DEFAULT_COOKIE_NAME,
};
pub use context::{BeanConfiguration, BeanContext, DeploymentId};
pub use error::{CoreError, Result};
pub use retry::RetryConfig;
pub use time::{Time, TimeUnit};
pub use timestamp::Timestamp;
pub use types::{BeanId, CacheKey, MemberId};
