//! Serialized form of a bean in the remote cache

use serde::{Deserialize, Serialize};

use beanstore_core::Timestamp;

/// What the remote cache stores under a bean's key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeanEntry<I, T> {
    /// Group the bean belongs to
    pub group_id: I,
    /// Last acquire/release, milliseconds since the Unix epoch
    pub last_accessed: u64,
    /// Bean state
    pub instance: T,
}

impl<I, T> BeanEntry<I, T> {
    /// Entry last accessed `at`
    pub fn new(group_id: I, instance: T, at: Timestamp) -> Self {
        BeanEntry {
            group_id,
            last_accessed: at.as_millis(),
            instance,
        }
    }

    /// Last access as a timestamp
    pub fn last_accessed(&self) -> Timestamp {
        Timestamp::from_millis(self.last_accessed)
    }
}

/// The fields of a [`BeanEntry`] needed for expiration and routing, read
/// without materializing the bean state.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntryMetadata<I> {
    /// Group the bean belongs to
    pub group_id: I,
    /// Last acquire/release, milliseconds since the Unix epoch
    pub last_accessed: u64,
}

impl<I> EntryMetadata<I> {
    /// Last access as a timestamp
    pub fn last_accessed(&self) -> Timestamp {
        Timestamp::from_millis(self.last_accessed)
    }
}
