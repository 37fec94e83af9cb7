//! Transcoder Cache Coherence Tests
//!
//! An unregistered transcoder must never be returned from the lookup cache.

use beanstore::{
    JsonTranscoder, MarshallingError, MarshallingRegistry, MediaType, Transcoder,
    APPLICATION_JSON, APPLICATION_MSGPACK, TEXT_PLAIN,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

/// Passes bytes through between any two of its types
struct PassThrough {
    name: &'static str,
    types: Vec<MediaType>,
}

impl PassThrough {
    fn new(name: &'static str, types: &[MediaType]) -> Arc<dyn Transcoder> {
        Arc::new(PassThrough {
            name,
            types: types.to_vec(),
        })
    }
}

impl Transcoder for PassThrough {
    fn name(&self) -> &str {
        self.name
    }

    fn supported_media_types(&self) -> &[MediaType] {
        &self.types
    }

    fn transcode(
        &self,
        content: &[u8],
        _from: &MediaType,
        _to: &MediaType,
    ) -> Result<Vec<u8>, MarshallingError> {
        Ok(content.to_vec())
    }
}

fn same(a: &Arc<dyn Transcoder>, b: &Arc<dyn Transcoder>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

fn churn_type() -> MediaType {
    MediaType::new("application", "x-churn")
}

// ============================================================================
// Unregistration
// ============================================================================

#[test]
fn unregistered_transcoder_is_never_returned() {
    let registry = MarshallingRegistry::new();
    let json: Arc<dyn Transcoder> = Arc::new(JsonTranscoder::new());
    registry.register_transcoder(Arc::clone(&json));

    let found = registry
        .get_transcoder(&APPLICATION_MSGPACK, &APPLICATION_JSON)
        .unwrap();
    assert!(same(&found, &json));
    assert_eq!(registry.cached_lookups(), 1);

    assert_eq!(registry.unregister_transcoder(&APPLICATION_MSGPACK), 1);
    assert_eq!(registry.cached_lookups(), 0);

    match registry.get_transcoder(&APPLICATION_MSGPACK, &APPLICATION_JSON) {
        Err(MarshallingError::NoTranscoderFound { from, to }) => {
            assert_eq!(from, APPLICATION_MSGPACK);
            assert_eq!(to, APPLICATION_JSON);
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(found) => panic!("stale transcoder returned: {}", found.name()),
    }
    assert!(!registry.is_conversion_supported(&APPLICATION_MSGPACK, &APPLICATION_JSON));
}

#[test]
fn purge_covers_pairs_not_naming_the_type() {
    let registry = MarshallingRegistry::new();
    let universal = PassThrough::new("universal", &[APPLICATION_MSGPACK, APPLICATION_JSON, TEXT_PLAIN]);
    let text = PassThrough::new("text", &[APPLICATION_JSON, TEXT_PLAIN]);
    registry.register_transcoder(Arc::clone(&universal));
    registry.register_transcoder(Arc::clone(&text));

    let first = registry.get_transcoder(&APPLICATION_JSON, &TEXT_PLAIN).unwrap();
    assert!(same(&first, &universal));

    // The pair names neither side of the removal but its answer is gone.
    assert_eq!(registry.unregister_transcoder(&APPLICATION_MSGPACK), 1);
    let second = registry.get_transcoder(&APPLICATION_JSON, &TEXT_PLAIN).unwrap();
    assert!(same(&second, &text));
    assert!(!same(&second, &universal));
}

#[test]
fn registration_keeps_cached_answers() {
    let registry = MarshallingRegistry::new();
    let first = PassThrough::new("first", &[APPLICATION_JSON, TEXT_PLAIN]);
    registry.register_transcoder(Arc::clone(&first));
    registry.get_transcoder(&APPLICATION_JSON, &TEXT_PLAIN).unwrap();

    let later = PassThrough::new("later", &[APPLICATION_JSON, TEXT_PLAIN]);
    registry.register_transcoder(later);
    let found = registry.get_transcoder(&APPLICATION_JSON, &TEXT_PLAIN).unwrap();
    assert!(same(&found, &first));
    assert_eq!(registry.len(), 2);
}

#[test]
fn identical_types_need_no_transcoder() {
    let registry = MarshallingRegistry::new();
    assert!(registry.is_empty());
    assert!(registry.is_conversion_supported(&TEXT_PLAIN, &TEXT_PLAIN));
    assert!(!registry.is_conversion_supported(&TEXT_PLAIN, &APPLICATION_JSON));
    assert_eq!(registry.unregister_transcoder(&TEXT_PLAIN), 0);
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn lookups_race_registration_churn() {
    let registry = Arc::new(MarshallingRegistry::with_defaults());
    let churn = PassThrough::new("churn", &[churn_type(), TEXT_PLAIN]);
    let num_readers = 6;
    let barrier = Arc::new(Barrier::new(num_readers + 1));
    let running = Arc::new(AtomicBool::new(true));

    let readers: Vec<_> = (0..num_readers)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            let running = Arc::clone(&running);
            thread::spawn(move || {
                barrier.wait();
                let mut churn_hits = 0usize;
                while running.load(Ordering::Relaxed) {
                    // Never touched by the churn.
                    registry
                        .get_transcoder(&APPLICATION_MSGPACK, &APPLICATION_JSON)
                        .unwrap();
                    if registry.get_transcoder(&churn_type(), &TEXT_PLAIN).is_ok() {
                        churn_hits += 1;
                    }
                }
                churn_hits
            })
        })
        .collect();

    barrier.wait();
    for _ in 0..500 {
        registry.register_transcoder(Arc::clone(&churn));
        registry.get_transcoder(&churn_type(), &TEXT_PLAIN).unwrap();
        assert_eq!(registry.unregister_transcoder(&churn_type()), 1);
        assert!(registry.get_transcoder(&churn_type(), &TEXT_PLAIN).is_err());
    }
    running.store(false, Ordering::Relaxed);
    for reader in readers {
        reader.join().unwrap();
    }

    assert!(registry.get_transcoder(&churn_type(), &TEXT_PLAIN).is_err());
    assert_eq!(registry.len(), 2);
}
