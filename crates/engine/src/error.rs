//! Bean manager errors
//!
//! Wraps the errors of every lower layer so callers see one type. Use
//! [`Error::is_transient`] (or `BeanManager::is_remotable`) to decide whether
//! a failure may succeed against another member.

use beanstore_affinity::AffinityError;
use beanstore_cache::CacheError;
use beanstore_core::CoreError;
use beanstore_marshalling::MarshallingError;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Bean manager errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A live bean already uses the identifier.
    #[error("Duplicate bean identifier: {0}")]
    DuplicateIdentifier(String),

    /// The caller broke the bean lifecycle contract. Never retried.
    #[error("Contract violation on bean {id}: {reason}")]
    ContractViolation {
        /// Bean identifier
        id: String,
        /// What was violated
        reason: String,
    },

    /// The manager is not started (or is stopping).
    #[error("Bean manager is not running: {0}")]
    NotRunning(String),

    /// `stop()` gave up waiting for in-flight operations; the manager is
    /// still running.
    #[error("Stop timed out with {in_flight} operations in flight")]
    StopTimeout {
        /// Operations still running when the wait ended
        in_flight: usize,
    },

    /// Remote cache failure.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Payload conversion failure.
    #[error(transparent)]
    Marshalling(#[from] MarshallingError),

    /// Configuration failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Routing failure.
    #[error(transparent)]
    Affinity(#[from] AffinityError),
}

impl Error {
    /// Create a contract violation error.
    pub fn contract(id: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Error::ContractViolation {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the failure is network or topology related.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Cache(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Whether this is a contract violation.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Error::ContractViolation { .. })
    }
}
