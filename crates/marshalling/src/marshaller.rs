//! Typed value marshalling

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::error::{MarshallingError, Result};
use crate::media_type::{MediaType, APPLICATION_MSGPACK};
use crate::registry::MarshallingRegistry;

/// Serializes values to MessagePack and transcodes them into a storage format.
#[derive(Debug, Clone)]
pub struct Marshaller {
    registry: Arc<MarshallingRegistry>,
    format: MediaType,
}

impl Marshaller {
    /// Marshal into `format` through `registry`
    pub fn new(registry: Arc<MarshallingRegistry>, format: MediaType) -> Self {
        Marshaller { registry, format }
    }

    /// Marshal into MessagePack with no transcoding
    pub fn msgpack(registry: Arc<MarshallingRegistry>) -> Self {
        Self::new(registry, APPLICATION_MSGPACK)
    }

    /// Storage format
    pub fn format(&self) -> &MediaType {
        &self.format
    }

    /// Underlying registry
    pub fn registry(&self) -> &Arc<MarshallingRegistry> {
        &self.registry
    }

    /// Serialize `value` in the storage format
    pub fn marshal<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        let packed = rmp_serde::to_vec_named(value)
            .map_err(|e| MarshallingError::conversion("msgpack", e))?;
        self.registry
            .transcode(&packed, &APPLICATION_MSGPACK, &self.format)
    }

    /// Deserialize bytes in the storage format
    pub fn unmarshal<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        let packed = self
            .registry
            .transcode(bytes, &self.format, &APPLICATION_MSGPACK)?;
        rmp_serde::from_slice(&packed).map_err(|e| MarshallingError::conversion("msgpack", e))
    }
}
