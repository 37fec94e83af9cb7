//! Bean identifiers and their factories

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use beanstore_core::{BeanId, CacheKey, MemberId};

/// Everything a bean (or group) identifier must support.
///
/// Implemented for every type meeting the bounds, e.g. [`BeanId`] and
/// `String`.
pub trait BeanKey:
    CacheKey + Clone + Eq + Hash + Display + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<K> BeanKey for K where
    K: CacheKey
        + Clone
        + Eq
        + Hash
        + Display
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Issues identifiers that never collide across cluster members.
pub trait IdentifierFactory<I>: Send + Sync {
    /// A fresh identifier
    fn create_identifier(&self) -> I;
}

/// Random v4 UUIDs; needs no coordination between members.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdentifierFactory;

impl IdentifierFactory<BeanId> for UuidIdentifierFactory {
    fn create_identifier(&self) -> BeanId {
        BeanId::new()
    }
}

/// `<member>-<counter>` strings.
///
/// Unique across the cluster as long as member names are unique and the
/// factory lives as long as the deployment.
#[derive(Debug)]
pub struct MemberScopedIdentifierFactory {
    member: MemberId,
    next: AtomicU64,
}

impl MemberScopedIdentifierFactory {
    /// Identifiers prefixed with `member`
    pub fn new(member: impl Into<MemberId>) -> Self {
        MemberScopedIdentifierFactory {
            member: member.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdentifierFactory<String> for MemberScopedIdentifierFactory {
    fn create_identifier(&self) -> String {
        format!("{}-{}", self.member, self.next.fetch_add(1, Ordering::Relaxed))
    }
}
