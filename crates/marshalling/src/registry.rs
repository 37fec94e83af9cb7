//! Transcoder registry with a derived lookup cache
//!
//! The registry keeps an ordered list of transcoders and a `(from, to)` index
//! of previously answered lookups.
//!
//! ## Locking
//!
//! - Cache hits read the `DashMap` only and never touch the mutation lock.
//! - Cache misses, registration and unregistration serialize on one mutex
//!   that guards the transcoder list; the cache is populated and purged
//!   while holding it, so an unregistered transcoder can never be re-cached
//!   by a concurrent miss.
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use beanstore_marshalling::{
//!     JsonTranscoder, MarshallingRegistry, APPLICATION_JSON, APPLICATION_MSGPACK,
//! };
//!
//! let registry = MarshallingRegistry::new();
//! registry.register_transcoder(Arc::new(JsonTranscoder::new()));
//! assert!(registry.is_conversion_supported(&APPLICATION_MSGPACK, &APPLICATION_JSON));
//! ```

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{MarshallingError, Result};
use crate::media_type::MediaType;
use crate::transcoder::{same_transcoder, Base64Transcoder, JsonTranscoder, Transcoder};

type CacheKey = (MediaType, MediaType);

/// Content-type keyed transcoder lookup with dynamic registration.
pub struct MarshallingRegistry {
    /// Registered transcoders in registration order; also the mutation lock
    transcoders: Mutex<Vec<Arc<dyn Transcoder>>>,
    /// Derived index of answered lookups
    cache: DashMap<CacheKey, Arc<dyn Transcoder>>,
}

impl MarshallingRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        MarshallingRegistry {
            transcoders: Mutex::new(Vec::new()),
            cache: DashMap::new(),
        }
    }

    /// Create a registry holding the built-in JSON and Base64 transcoders
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register_transcoder(Arc::new(JsonTranscoder::new()));
        registry.register_transcoder(Arc::new(Base64Transcoder::new()));
        registry
    }

    /// Append a transcoder.
    ///
    /// Lookups already cached keep their answer; the new transcoder is only
    /// considered for pairs that miss the cache.
    pub fn register_transcoder(&self, transcoder: Arc<dyn Transcoder>) {
        let mut transcoders = self.transcoders.lock();
        debug!(
            target: "beanstore::marshalling",
            transcoder = transcoder.name(),
            "Registered transcoder"
        );
        transcoders.push(transcoder);
    }

    /// Find a transcoder converting `from` into `to`.
    ///
    /// # Errors
    ///
    /// Returns `NoTranscoderFound` carrying both types if none matches.
    pub fn get_transcoder(&self, from: &MediaType, to: &MediaType) -> Result<Arc<dyn Transcoder>> {
        let key = (from.clone(), to.clone());
        if let Some(hit) = self.cache.get(&key) {
            return Ok(Arc::clone(hit.value()));
        }

        let transcoders = self.transcoders.lock();
        // Another thread may have populated the entry while we waited.
        if let Some(hit) = self.cache.get(&key) {
            return Ok(Arc::clone(hit.value()));
        }
        let found = transcoders
            .iter()
            .find(|t| t.supports_conversion(from, to))
            .cloned()
            .ok_or_else(|| MarshallingError::NoTranscoderFound {
                from: from.clone(),
                to: to.clone(),
            })?;
        self.cache.insert(key, Arc::clone(&found));
        Ok(found)
    }

    /// Remove every transcoder supporting `media`.
    ///
    /// Also purges every cached pair that names `media` on either side or
    /// whose answer was one of the removed transcoders. Returns the number of
    /// transcoders removed.
    pub fn unregister_transcoder(&self, media: &MediaType) -> usize {
        let mut transcoders = self.transcoders.lock();
        let (removed, kept): (Vec<_>, Vec<_>) =
            transcoders.drain(..).partition(|t| t.supports(media));
        *transcoders = kept;

        self.cache.retain(|(from, to), chosen| {
            !(from.matches(media)
                || to.matches(media)
                || removed.iter().any(|r| same_transcoder(&**r, &**chosen)))
        });

        if !removed.is_empty() {
            info!(
                target: "beanstore::marshalling",
                media_type = %media,
                removed = removed.len(),
                "Unregistered transcoders"
            );
        }
        removed.len()
    }

    /// Whether `from` can be turned into `to`: same type, or a transcoder exists.
    pub fn is_conversion_supported(&self, from: &MediaType, to: &MediaType) -> bool {
        from.matches(to) || self.get_transcoder(from, to).is_ok()
    }

    /// Convert `content`, passing it through unchanged when the types match.
    pub fn transcode(&self, content: &[u8], from: &MediaType, to: &MediaType) -> Result<Vec<u8>> {
        if from.matches(to) {
            return Ok(content.to_vec());
        }
        self.get_transcoder(from, to)?.transcode(content, from, to)
    }

    /// Number of registered transcoders
    pub fn len(&self) -> usize {
        self.transcoders.lock().len()
    }

    /// Whether no transcoder is registered
    pub fn is_empty(&self) -> bool {
        self.transcoders.lock().is_empty()
    }

    /// Number of cached lookups
    pub fn cached_lookups(&self) -> usize {
        self.cache.len()
    }
}

impl Default for MarshallingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MarshallingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .transcoders
            .lock()
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        f.debug_struct("MarshallingRegistry")
            .field("transcoders", &names)
            .field("cached_lookups", &self.cache.len())
            .finish()
    }
}
