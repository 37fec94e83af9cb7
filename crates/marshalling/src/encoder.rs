//! Id-keyed encoders and wrappers
//!
//! Older callers address codecs by a small numeric id instead of a media type
//! pair. Encoders here carry no codec logic of their own: each one names a
//! `(source, storage)` format pair and the actual conversion is delegated to
//! the shared [`MarshallingRegistry`], so there is a single transcoding path.
//!
//! Wrappers frame already-encoded bytes for storage (e.g. a length prefix).

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Lookup, MarshallingError, Result};
use crate::media_type::{MediaType, APPLICATION_JSON, APPLICATION_MSGPACK};
use crate::registry::MarshallingRegistry;

/// Id of [`IdentityEncoder`]
pub const IDENTITY_ENCODER_ID: u16 = 0;
/// Id of [`JsonEncoder`]
pub const JSON_ENCODER_ID: u16 = 1;
/// Id of [`IdentityWrapper`]
pub const IDENTITY_WRAPPER_ID: u8 = 0;
/// Id of [`LengthPrefixedWrapper`]
pub const LENGTH_PREFIXED_WRAPPER_ID: u8 = 1;

/// A numeric handle for a `(source, storage)` format pair.
pub trait Encoder: Any + Send + Sync {
    /// Registry-unique id
    fn id(&self) -> u16;

    /// Format values arrive in
    fn source_format(&self) -> MediaType;

    /// Format values are stored in
    fn storage_format(&self) -> MediaType;

    /// Downcast support for by-type lookups
    fn as_any(&self) -> &dyn Any;
}

/// A storage framing applied after encoding.
pub trait Wrapper: Any + Send + Sync {
    /// Registry-unique id
    fn id(&self) -> u8;

    /// Frame encoded bytes, rejecting input the framing cannot describe
    fn wrap(&self, bytes: Vec<u8>) -> Result<Vec<u8>>;

    /// Strip the framing, rejecting malformed input
    fn unwrap(&self, bytes: &[u8]) -> Result<Vec<u8>>;

    /// Downcast support for by-type lookups
    fn as_any(&self) -> &dyn Any;
}

/// Stores MessagePack as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityEncoder;

impl Encoder for IdentityEncoder {
    fn id(&self) -> u16 {
        IDENTITY_ENCODER_ID
    }

    fn source_format(&self) -> MediaType {
        APPLICATION_MSGPACK
    }

    fn storage_format(&self) -> MediaType {
        APPLICATION_MSGPACK
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Stores MessagePack values as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    fn id(&self) -> u16 {
        JSON_ENCODER_ID
    }

    fn source_format(&self) -> MediaType {
        APPLICATION_MSGPACK
    }

    fn storage_format(&self) -> MediaType {
        APPLICATION_JSON
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// No framing.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityWrapper;

impl Wrapper for IdentityWrapper {
    fn id(&self) -> u8 {
        IDENTITY_WRAPPER_ID
    }

    fn wrap(&self, bytes: Vec<u8>) -> Result<Vec<u8>> {
        Ok(bytes)
    }

    fn unwrap(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Big-endian `u32` length prefix.
#[derive(Debug, Default, Clone, Copy)]
pub struct LengthPrefixedWrapper;

impl Wrapper for LengthPrefixedWrapper {
    fn id(&self) -> u8 {
        LENGTH_PREFIXED_WRAPPER_ID
    }

    fn wrap(&self, bytes: Vec<u8>) -> Result<Vec<u8>> {
        let prefix = frame_len(bytes.len())?;
        let mut framed = Vec::with_capacity(bytes.len() + 4);
        framed.extend_from_slice(&prefix.to_be_bytes());
        framed.extend_from_slice(&bytes);
        Ok(framed)
    }

    fn unwrap(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        if bytes.len() < 4 {
            return Err(MarshallingError::conversion(
                "length-prefixed",
                format!("frame too short: {} bytes", bytes.len()),
            ));
        }
        let (prefix, body) = bytes.split_at(4);
        let declared = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        if declared != body.len() {
            return Err(MarshallingError::conversion(
                "length-prefixed",
                format!("declared {} bytes, found {}", declared, body.len()),
            ));
        }
        Ok(body.to_vec())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Length prefix for a body of `len` bytes
fn frame_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        MarshallingError::conversion(
            "length-prefixed",
            format!("body of {} bytes exceeds the u32 length prefix", len),
        )
    })
}

/// Id-keyed encoder and wrapper registry layered over a [`MarshallingRegistry`].
pub struct EncoderRegistry {
    registry: Arc<MarshallingRegistry>,
    encoders: DashMap<u16, Arc<dyn Encoder>>,
    wrappers: DashMap<u8, Arc<dyn Wrapper>>,
}

impl EncoderRegistry {
    /// Create an empty registry delegating conversions to `registry`
    pub fn new(registry: Arc<MarshallingRegistry>) -> Self {
        EncoderRegistry {
            registry,
            encoders: DashMap::new(),
            wrappers: DashMap::new(),
        }
    }

    /// Create a registry holding the built-in encoders and wrappers
    pub fn with_defaults(registry: Arc<MarshallingRegistry>) -> Self {
        let encoders: [Arc<dyn Encoder>; 2] = [Arc::new(IdentityEncoder), Arc::new(JsonEncoder)];
        let wrappers: [Arc<dyn Wrapper>; 2] =
            [Arc::new(IdentityWrapper), Arc::new(LengthPrefixedWrapper)];
        EncoderRegistry {
            registry,
            encoders: encoders.into_iter().map(|e| (e.id(), e)).collect(),
            wrappers: wrappers.into_iter().map(|w| (w.id(), w)).collect(),
        }
    }

    /// The registry conversions are delegated to
    pub fn marshalling_registry(&self) -> &Arc<MarshallingRegistry> {
        &self.registry
    }

    /// Register an encoder.
    ///
    /// # Errors
    ///
    /// `DuplicateEncoderId` if the id is taken.
    pub fn register_encoder(&self, encoder: Arc<dyn Encoder>) -> Result<()> {
        let id = encoder.id();
        match self.encoders.entry(id) {
            Entry::Occupied(_) => Err(MarshallingError::DuplicateEncoderId(id)),
            Entry::Vacant(slot) => {
                debug!(target: "beanstore::marshalling", encoder_id = id, "Registered encoder");
                slot.insert(encoder);
                Ok(())
            }
        }
    }

    /// Register a wrapper.
    ///
    /// # Errors
    ///
    /// `DuplicateWrapperId` if the id is taken.
    pub fn register_wrapper(&self, wrapper: Arc<dyn Wrapper>) -> Result<()> {
        let id = wrapper.id();
        match self.wrappers.entry(id) {
            Entry::Occupied(_) => Err(MarshallingError::DuplicateWrapperId(id)),
            Entry::Vacant(slot) => {
                debug!(target: "beanstore::marshalling", wrapper_id = id, "Registered wrapper");
                slot.insert(wrapper);
                Ok(())
            }
        }
    }

    /// Look up an encoder by id
    pub fn get_encoder(&self, id: u16) -> Result<Arc<dyn Encoder>> {
        self.encoders
            .get(&id)
            .map(|e| Arc::clone(e.value()))
            .ok_or(MarshallingError::EncoderNotFound(Lookup::Id(id)))
    }

    /// Look up an encoder by implementing type
    pub fn get_encoder_by_type<E: Encoder>(&self) -> Result<Arc<dyn Encoder>> {
        self.encoders
            .iter()
            .find(|e| e.value().as_any().is::<E>())
            .map(|e| Arc::clone(e.value()))
            .ok_or(MarshallingError::EncoderNotFound(Lookup::Type(
                std::any::type_name::<E>(),
            )))
    }

    /// Look up a wrapper by id
    pub fn get_wrapper(&self, id: u8) -> Result<Arc<dyn Wrapper>> {
        self.wrappers
            .get(&id)
            .map(|w| Arc::clone(w.value()))
            .ok_or(MarshallingError::WrapperNotFound(Lookup::Id(u16::from(id))))
    }

    /// Look up a wrapper by implementing type
    pub fn get_wrapper_by_type<W: Wrapper>(&self) -> Result<Arc<dyn Wrapper>> {
        self.wrappers
            .iter()
            .find(|w| w.value().as_any().is::<W>())
            .map(|w| Arc::clone(w.value()))
            .ok_or(MarshallingError::WrapperNotFound(Lookup::Type(
                std::any::type_name::<W>(),
            )))
    }

    /// Whether the encoder's format pair is currently convertible
    pub fn is_encoder_available(&self, id: u16) -> bool {
        self.get_encoder(id)
            .map(|e| {
                self.registry
                    .is_conversion_supported(&e.source_format(), &e.storage_format())
            })
            .unwrap_or(false)
    }

    /// Encode with encoder `encoder_id`, then frame with wrapper `wrapper_id`
    pub fn encode(&self, encoder_id: u16, wrapper_id: u8, content: &[u8]) -> Result<Vec<u8>> {
        let encoder = self.get_encoder(encoder_id)?;
        let wrapper = self.get_wrapper(wrapper_id)?;
        let stored =
            self.registry
                .transcode(content, &encoder.source_format(), &encoder.storage_format())?;
        wrapper.wrap(stored)
    }

    /// Inverse of [`encode`](Self::encode)
    pub fn decode(&self, encoder_id: u16, wrapper_id: u8, stored: &[u8]) -> Result<Vec<u8>> {
        let encoder = self.get_encoder(encoder_id)?;
        let wrapper = self.get_wrapper(wrapper_id)?;
        let unwrapped = wrapper.unwrap(stored)?;
        self.registry
            .transcode(&unwrapped, &encoder.storage_format(), &encoder.source_format())
    }
}

impl std::fmt::Debug for EncoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoderRegistry")
            .field("encoders", &self.encoders.len())
            .field("wrappers", &self.wrappers.len())
            .finish()
    }
}
