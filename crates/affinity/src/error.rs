//! Affinity errors

/// Result type alias for affinity operations
pub type Result<T> = std::result::Result<T, AffinityError>;

/// Errors building or interpreting affinity descriptors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AffinityError {
    /// Route tokens must be non-empty and free of `.`, `;`, `=` and whitespace.
    #[error("Invalid route token: {0:?}")]
    InvalidRoute(String),

    /// A cookie value could not be split into route tokens.
    #[error("Invalid affinity cookie: {0:?}")]
    InvalidCookie(String),

    /// The descriptor named no member that could be routed to.
    #[error("No routable member for {0}")]
    NoTargets(String),
}
