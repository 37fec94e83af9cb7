//! Marshalling errors

use std::fmt;

use crate::media_type::MediaType;

/// Result type alias for marshalling operations
pub type Result<T> = std::result::Result<T, MarshallingError>;

/// How a registry lookup was keyed, so "no such id" and "no such type" stay
/// distinguishable in error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Lookup by numeric id
    Id(u16),
    /// Lookup by implementing type
    Type(&'static str),
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Id(id) => write!(f, "no such id {}", id),
            Lookup::Type(name) => write!(f, "no such type {}", name),
        }
    }
}

/// Marshalling errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarshallingError {
    /// No registered transcoder converts between the two types.
    #[error("No transcoder found for conversion from {from} to {to}")]
    NoTranscoderFound {
        /// Source media type
        from: MediaType,
        /// Target media type
        to: MediaType,
    },

    /// An encoder with the same id is already registered.
    #[error("Duplicate encoder id: {0}")]
    DuplicateEncoderId(u16),

    /// A wrapper with the same id is already registered.
    #[error("Duplicate wrapper id: {0}")]
    DuplicateWrapperId(u8),

    /// Encoder lookup failed.
    #[error("Encoder not found: {0}")]
    EncoderNotFound(Lookup),

    /// Wrapper lookup failed.
    #[error("Wrapper not found: {0}")]
    WrapperNotFound(Lookup),

    /// A media type string could not be parsed.
    #[error("Invalid media type: {0}")]
    InvalidMediaType(String),

    /// A conversion failed inside a transcoder or wrapper.
    ///
    /// Carries the component name so callers can tell a wrong-format payload
    /// from a broken codec.
    #[error("Conversion failed in {component}: {detail}")]
    Conversion {
        /// Transcoder or wrapper that failed
        component: String,
        /// Human-readable description
        detail: String,
    },
}

impl MarshallingError {
    /// Create a conversion error.
    pub fn conversion(component: impl Into<String>, detail: impl fmt::Display) -> Self {
        MarshallingError::Conversion {
            component: component.into(),
            detail: detail.to_string(),
        }
    }
}
