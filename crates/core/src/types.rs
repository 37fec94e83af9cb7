//! Identifier types
//!
//! - BeanId: cluster-wide unique identifier of a bean (also used for groups)
//! - MemberId: name of a cluster member (server process)

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a bean or a bean group
///
/// A BeanId wraps a UUID v4. Random v4 identifiers let every cluster member
/// issue identifiers independently without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BeanId(Uuid);

impl BeanId {
    /// Create a new random BeanId using UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a BeanId from raw bytes
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Parse a BeanId from a string representation
    ///
    /// Returns None if the string is not a valid UUID.
    pub fn from_string(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Get the raw bytes of this BeanId
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for BeanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BeanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a cluster member
///
/// Member names are opaque strings assigned by the cluster transport
/// (e.g. "node-a"). They are compared and hashed as plain strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberId(String);

impl MemberId {
    /// Create a member id from a name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The member name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemberId {
    fn from(name: &str) -> Self {
        MemberId::new(name)
    }
}

impl From<String> for MemberId {
    fn from(name: String) -> Self {
        MemberId(name)
    }
}

/// Key types that can be placed in the cache grid
///
/// Cache keys must have a stable byte form so that every member computes the
/// same owners for them.
pub trait CacheKey {
    /// Stable byte form used for owner hashing and storage keys
    fn key_bytes(&self) -> Vec<u8>;
}

impl CacheKey for BeanId {
    fn key_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl CacheKey for str {
    fn key_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl CacheKey for String {
    fn key_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}
