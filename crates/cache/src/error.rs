//! Remote cache errors

use beanstore_core::MemberId;

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors talking to the remote grid or managing client registrations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// The member serving the request could not be reached.
    #[error("Member unreachable: {member}")]
    Unreachable {
        /// Member that failed
        member: MemberId,
    },

    /// The grid did not answer in time.
    #[error("Operation {operation} timed out after {after_ms}ms")]
    Timeout {
        /// Operation name
        operation: &'static str,
        /// Elapsed time before giving up
        after_ms: u64,
    },

    /// The topology moved while the operation was in flight.
    #[error("Topology changed during operation (expected view {expected}, found {actual})")]
    TopologyChanged {
        /// View the caller started from
        expected: u64,
        /// Current view
        actual: u64,
    },

    /// Cache names must be non-empty.
    #[error("Invalid cache name: {0:?}")]
    InvalidCacheName(String),

    /// A batch was used after commit or rollback.
    #[error("Batch already {0}")]
    BatchClosed(&'static str),
}

impl CacheError {
    /// Whether the failure is network or topology related, so the same
    /// request may succeed against another member.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CacheError::Unreachable { .. }
                | CacheError::Timeout { .. }
                | CacheError::TopologyChanged { .. }
        )
    }

    /// Create an unreachable error.
    pub fn unreachable(member: impl Into<MemberId>) -> Self {
        CacheError::Unreachable {
            member: member.into(),
        }
    }
}
