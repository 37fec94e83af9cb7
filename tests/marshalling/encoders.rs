//! Encoder Registry Tests

use beanstore::{
    Encoder, EncoderRegistry, IdentityWrapper, JsonEncoder, Lookup, Marshaller, MarshallingError,
    MarshallingRegistry, MediaType, APPLICATION_JSON, APPLICATION_MSGPACK, IDENTITY_ENCODER_ID,
    IDENTITY_WRAPPER_ID, JSON_ENCODER_ID, LENGTH_PREFIXED_WRAPPER_ID, TEXT_PLAIN,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::{Arc, Barrier};
use std::thread;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Order {
    id: u32,
    lines: Vec<String>,
}

/// Unregistered by default; used for by-type lookups
struct CsvEncoder(u16);

impl Encoder for CsvEncoder {
    fn id(&self) -> u16 {
        self.0
    }

    fn source_format(&self) -> MediaType {
        APPLICATION_MSGPACK
    }

    fn storage_format(&self) -> MediaType {
        TEXT_PLAIN
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn registries() -> (Arc<MarshallingRegistry>, EncoderRegistry) {
    let transcoders = Arc::new(MarshallingRegistry::with_defaults());
    let encoders = EncoderRegistry::with_defaults(Arc::clone(&transcoders));
    (transcoders, encoders)
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn duplicate_ids_are_rejected() {
    let (_, encoders) = registries();
    assert_eq!(
        encoders.register_encoder(Arc::new(JsonEncoder)).unwrap_err(),
        MarshallingError::DuplicateEncoderId(JSON_ENCODER_ID)
    );
    assert_eq!(
        encoders.register_wrapper(Arc::new(IdentityWrapper)).unwrap_err(),
        MarshallingError::DuplicateWrapperId(IDENTITY_WRAPPER_ID)
    );
}

#[test]
fn concurrent_registration_of_one_id_admits_one() {
    let (_, encoders) = registries();
    let encoders = Arc::new(encoders);
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let encoders = Arc::clone(&encoders);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                encoders.register_encoder(Arc::new(CsvEncoder(7))).is_ok()
            })
        })
        .collect();

    let admitted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(admitted, 1);
    assert_eq!(encoders.get_encoder(7).unwrap().id(), 7);
}

// ============================================================================
// Lookup
// ============================================================================

#[test]
fn missing_id_and_missing_type_are_distinguishable() {
    let (_, encoders) = registries();

    let by_id = encoders.get_encoder(42).err().unwrap();
    assert_eq!(by_id, MarshallingError::EncoderNotFound(Lookup::Id(42)));
    assert!(by_id.to_string().contains("no such id 42"));

    let by_type = encoders.get_encoder_by_type::<CsvEncoder>().err().unwrap();
    match &by_type {
        MarshallingError::EncoderNotFound(Lookup::Type(name)) => {
            assert!(name.ends_with("CsvEncoder"))
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(by_type.to_string().contains("no such type"));

    assert!(matches!(
        encoders.get_wrapper(9).err().unwrap(),
        MarshallingError::WrapperNotFound(Lookup::Id(9))
    ));
}

#[test]
fn lookup_by_type_finds_registered_encoder() {
    let (_, encoders) = registries();
    assert_eq!(
        encoders.get_encoder_by_type::<JsonEncoder>().unwrap().id(),
        JSON_ENCODER_ID
    );
    encoders.register_encoder(Arc::new(CsvEncoder(3))).unwrap();
    assert_eq!(encoders.get_encoder_by_type::<CsvEncoder>().unwrap().id(), 3);
    assert_eq!(
        encoders.get_wrapper_by_type::<IdentityWrapper>().unwrap().id(),
        IDENTITY_WRAPPER_ID
    );
}

// ============================================================================
// Encode / Decode
// ============================================================================

#[test]
fn json_with_length_prefix_round_trips() {
    let (transcoders, encoders) = registries();
    let msgpack = Marshaller::msgpack(Arc::clone(&transcoders));
    let order = Order {
        id: 7,
        lines: vec!["tea".into(), "scones".into()],
    };
    let content = msgpack.marshal(&order).unwrap();

    let stored = encoders
        .encode(JSON_ENCODER_ID, LENGTH_PREFIXED_WRAPPER_ID, &content)
        .unwrap();
    let (prefix, body) = stored.split_at(4);
    assert_eq!(u32::from_be_bytes(prefix.try_into().unwrap()) as usize, body.len());
    let json: serde_json::Value = serde_json::from_slice(body).unwrap();
    assert_eq!(json["id"], 7);
    assert_eq!(json["lines"][1], "scones");

    let decoded = encoders
        .decode(JSON_ENCODER_ID, LENGTH_PREFIXED_WRAPPER_ID, &stored)
        .unwrap();
    assert_eq!(msgpack.unmarshal::<Order>(&decoded).unwrap(), order);
}

#[test]
fn identity_pair_stores_bytes_unchanged() {
    let (_, encoders) = registries();
    let stored = encoders
        .encode(IDENTITY_ENCODER_ID, IDENTITY_WRAPPER_ID, b"\x92\x01\x02")
        .unwrap();
    assert_eq!(stored, b"\x92\x01\x02");
}

#[test]
fn truncated_frame_is_a_conversion_error() {
    let (_, encoders) = registries();
    let err = encoders
        .decode(JSON_ENCODER_ID, LENGTH_PREFIXED_WRAPPER_ID, b"\x00\x00")
        .unwrap_err();
    assert!(matches!(err, MarshallingError::Conversion { .. }));
}

#[test]
fn availability_follows_the_transcoder_registry() {
    let (transcoders, encoders) = registries();
    assert!(encoders.is_encoder_available(JSON_ENCODER_ID));
    assert!(!encoders.is_encoder_available(42));

    transcoders.unregister_transcoder(&APPLICATION_JSON);
    assert!(!encoders.is_encoder_available(JSON_ENCODER_ID));
    // Same-format pairs need no transcoder.
    assert!(encoders.is_encoder_available(IDENTITY_ENCODER_ID));
    assert!(matches!(
        encoders.encode(JSON_ENCODER_ID, IDENTITY_WRAPPER_ID, b"\xc0"),
        Err(MarshallingError::NoTranscoderFound { .. })
    ));
}
