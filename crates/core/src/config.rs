//! Bean store configuration via `beanstore.toml`
//!
//! The management layer persists these attributes; at deployment time they
//! are loaded here and injected into the bean context and the affinity
//! resolver.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::context::{BeanConfiguration, DeploymentId};
use crate::error::{CoreError, Result};
use crate::retry::RetryConfig;
use crate::time::Time;

/// Config file name placed in the deployment's data directory.
pub const CONFIG_FILE_NAME: &str = "beanstore.toml";

/// Default remote cache name for bean state.
pub const DEFAULT_CACHE_NAME: &str = "beans";

/// Default affinity cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "JSESSIONID";

/// Which affinity descriptor the resolver produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AffinityPolicy {
    /// Route to the primary owner only
    Single,
    /// Route by owner rank: primary, then backups
    Ranked,
    /// Emit a cookie carrying the ranked route tokens
    Cookie,
}

/// Affinity settings (`[affinity]` section)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffinityConfig {
    /// Descriptor kind
    #[serde(default = "default_policy")]
    pub policy: AffinityPolicy,
    /// Maximum ranked list length
    #[serde(default = "default_max_members")]
    pub max_members: usize,
    /// Cookie name used by the cookie policy
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

fn default_policy() -> AffinityPolicy {
    AffinityPolicy::Ranked
}

fn default_max_members() -> usize {
    3
}

fn default_cookie_name() -> String {
    DEFAULT_COOKIE_NAME.to_string()
}

impl Default for AffinityConfig {
    fn default() -> Self {
        Self {
            policy: default_policy(),
            max_members: default_max_members(),
            cookie_name: default_cookie_name(),
        }
    }
}

/// Near cache settings (`[near_cache]` section)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NearCacheConfig {
    /// Register a near cache in front of the remote cache
    #[serde(default)]
    pub enabled: bool,
    /// Maximum number of entries held locally
    #[serde(default = "default_near_cache_entries")]
    pub max_entries: usize,
}

fn default_near_cache_entries() -> usize {
    10_000
}

impl Default for NearCacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_entries: default_near_cache_entries(),
        }
    }
}

/// Bean store configuration loaded from `beanstore.toml`.
///
/// # Example
///
/// ```toml
/// cache_name = "beans"
/// idle_timeout = { value = 10, unit = "minutes" }
///
/// [affinity]
/// policy = "ranked"
/// max_members = 3
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeanstoreConfig {
    /// Remote cache holding bean state
    #[serde(default = "default_cache_name")]
    pub cache_name: String,
    /// Idle timeout; absent means beans never expire
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_timeout: Option<Time>,
    /// How long `stop()` waits for in-flight operations to drain before
    /// failing and leaving the manager running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_timeout_ms: Option<u64>,
    /// Affinity settings
    #[serde(default)]
    pub affinity: AffinityConfig,
    /// Near cache settings
    #[serde(default)]
    pub near_cache: NearCacheConfig,
    /// Failover retry settings
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_cache_name() -> String {
    DEFAULT_CACHE_NAME.to_string()
}

impl Default for BeanstoreConfig {
    fn default() -> Self {
        Self {
            cache_name: default_cache_name(),
            idle_timeout: None,
            stop_timeout_ms: None,
            affinity: AffinityConfig::default(),
            near_cache: NearCacheConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl BeanstoreConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Bean store configuration
#
# Remote cache that holds bean state.
cache_name = "beans"

# Idle timeout after which an unused bean expires (default: never).
# idle_timeout = { value = 10, unit = "minutes" }

# How long stop() waits for in-flight operations, in milliseconds (default: forever).
# When it elapses, stop() fails and the manager keeps running.
# stop_timeout_ms = 30000

[affinity]
# "single", "ranked" (default) or "cookie"
policy = "ranked"
# Maximum number of members in a ranked list
max_members = 3
cookie_name = "JSESSIONID"

[near_cache]
enabled = false
max_entries = 10000

[retry]
max_retries = 3
base_delay_ms = 10
max_delay_ms = 100
"#
    }

    /// Parse and validate config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: BeanstoreConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content).map_err(|e| {
            CoreError::InvalidConfig(format!("config file '{}': {}", path.display(), e))
        })?;
        debug!(target: "beanstore::config", path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.cache_name.trim().is_empty() {
            return Err(CoreError::InvalidConfig("cache_name must not be empty".into()));
        }
        if self.affinity.max_members == 0 {
            return Err(CoreError::InvalidConfig(
                "affinity.max_members must be at least 1".into(),
            ));
        }
        if self.affinity.policy == AffinityPolicy::Cookie && self.affinity.cookie_name.is_empty() {
            return Err(CoreError::InvalidConfig(
                "affinity.cookie_name must not be empty for the cookie policy".into(),
            ));
        }
        if self.near_cache.enabled && self.near_cache.max_entries == 0 {
            return Err(CoreError::InvalidConfig(
                "near_cache.max_entries must be at least 1 when enabled".into(),
            ));
        }
        Ok(())
    }

    /// Build the bean descriptor for one bean type of a deployment.
    pub fn bean_configuration(
        &self,
        bean_name: impl Into<String>,
        deployment: DeploymentId,
    ) -> BeanConfiguration {
        let config = BeanConfiguration::new(bean_name, deployment);
        match self.idle_timeout {
            Some(timeout) => config.with_idle_timeout(timeout),
            None => config,
        }
    }
}
