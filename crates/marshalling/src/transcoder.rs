//! Transcoder trait and built-in transcoders.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::{MarshallingError, Result};
use crate::media_type::{
    MediaType, APPLICATION_BASE64, APPLICATION_JSON, APPLICATION_MSGPACK,
    APPLICATION_OCTET_STREAM,
};

/// A codec converting a payload between two content types.
///
/// # Thread Safety
///
/// Transcoders are shared across request threads through the registry and
/// must be `Send + Sync`.
pub trait Transcoder: Send + Sync {
    /// Name used in logs and conversion errors.
    fn name(&self) -> &str;

    /// Every media type this transcoder reads or writes.
    fn supported_media_types(&self) -> &[MediaType];

    /// Whether `media` is among the supported types (parameters ignored).
    fn supports(&self, media: &MediaType) -> bool {
        self.supported_media_types().iter().any(|m| m.matches(media))
    }

    /// Whether this transcoder converts `from` into `to`.
    fn supports_conversion(&self, from: &MediaType, to: &MediaType) -> bool {
        !from.matches(to) && self.supports(from) && self.supports(to)
    }

    /// Convert `content` from one type to the other.
    fn transcode(&self, content: &[u8], from: &MediaType, to: &MediaType) -> Result<Vec<u8>>;
}

/// Identity of a shared transcoder (data pointer only, vtables may differ).
pub(crate) fn same_transcoder(a: &dyn Transcoder, b: &dyn Transcoder) -> bool {
    std::ptr::eq(
        a as *const dyn Transcoder as *const (),
        b as *const dyn Transcoder as *const (),
    )
}

/// MessagePack <-> JSON through a `serde_json::Value` intermediate.
#[derive(Debug)]
pub struct JsonTranscoder {
    types: [MediaType; 2],
}

impl JsonTranscoder {
    /// Create the transcoder.
    pub fn new() -> Self {
        Self {
            types: [APPLICATION_MSGPACK, APPLICATION_JSON],
        }
    }
}

impl Default for JsonTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcoder for JsonTranscoder {
    fn name(&self) -> &str {
        "json"
    }

    fn supported_media_types(&self) -> &[MediaType] {
        &self.types
    }

    fn transcode(&self, content: &[u8], from: &MediaType, to: &MediaType) -> Result<Vec<u8>> {
        if from.matches(&APPLICATION_MSGPACK) && to.matches(&APPLICATION_JSON) {
            let value: serde_json::Value = rmp_serde::from_slice(content)
                .map_err(|e| MarshallingError::conversion(self.name(), e))?;
            serde_json::to_vec(&value).map_err(|e| MarshallingError::conversion(self.name(), e))
        } else if from.matches(&APPLICATION_JSON) && to.matches(&APPLICATION_MSGPACK) {
            let value: serde_json::Value = serde_json::from_slice(content)
                .map_err(|e| MarshallingError::conversion(self.name(), e))?;
            rmp_serde::to_vec_named(&value)
                .map_err(|e| MarshallingError::conversion(self.name(), e))
        } else {
            Err(MarshallingError::NoTranscoderFound {
                from: from.clone(),
                to: to.clone(),
            })
        }
    }
}

/// Binary <-> Base64 text.
///
/// Converts only between base64 and one of the binary types, never between
/// two binary types.
#[derive(Debug)]
pub struct Base64Transcoder {
    types: [MediaType; 3],
}

impl Base64Transcoder {
    /// Create the transcoder.
    pub fn new() -> Self {
        Self {
            types: [APPLICATION_BASE64, APPLICATION_MSGPACK, APPLICATION_OCTET_STREAM],
        }
    }
}

impl Default for Base64Transcoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcoder for Base64Transcoder {
    fn name(&self) -> &str {
        "base64"
    }

    fn supported_media_types(&self) -> &[MediaType] {
        &self.types
    }

    fn supports_conversion(&self, from: &MediaType, to: &MediaType) -> bool {
        self.supports(from)
            && self.supports(to)
            && (from.matches(&APPLICATION_BASE64) != to.matches(&APPLICATION_BASE64))
    }

    fn transcode(&self, content: &[u8], from: &MediaType, to: &MediaType) -> Result<Vec<u8>> {
        if !self.supports_conversion(from, to) {
            return Err(MarshallingError::NoTranscoderFound {
                from: from.clone(),
                to: to.clone(),
            });
        }
        if to.matches(&APPLICATION_BASE64) {
            Ok(STANDARD.encode(content).into_bytes())
        } else {
            STANDARD
                .decode(content)
                .map_err(|e| MarshallingError::conversion(self.name(), e))
        }
    }
}
