//! Typed Marshalling Tests

use crate::common::*;
use beanstore::{
    BeanEntry, CacheKey, EntryMetadata, Marshaller, MarshallingError, MarshallingRegistry,
    APPLICATION_BASE64, APPLICATION_JSON, APPLICATION_MSGPACK, TEXT_PLAIN,
};
use std::sync::Arc;

fn entry() -> BeanEntry<String, Cart> {
    let mut cart = Cart::new("ada");
    cart.items.push("lamp".into());
    BeanEntry::new("g1".to_string(), cart, Timestamp::from_millis(1_700_000_000_000))
}

fn marshaller(format: beanstore::MediaType) -> Marshaller {
    Marshaller::new(Arc::new(MarshallingRegistry::with_defaults()), format)
}

#[test]
fn entry_round_trips_in_each_storage_format() {
    for format in [APPLICATION_MSGPACK, APPLICATION_JSON, APPLICATION_BASE64] {
        let marshaller = marshaller(format.clone());
        assert_eq!(marshaller.format(), &format);
        let bytes = marshaller.marshal(&entry()).unwrap();
        let back: BeanEntry<String, Cart> = marshaller.unmarshal(&bytes).unwrap();
        assert_eq!(back, entry(), "format {}", format);
    }
}

#[test]
fn json_form_is_readable_and_metadata_reads_alone() {
    let marshaller = marshaller(APPLICATION_JSON);
    let bytes = marshaller.marshal(&entry()).unwrap();

    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["group_id"], "g1");
    assert_eq!(json["instance"]["items"][0], "lamp");

    let metadata: EntryMetadata<String> = marshaller.unmarshal(&bytes).unwrap();
    assert_eq!(metadata.group_id, "g1");
    assert_eq!(metadata.last_accessed(), Timestamp::from_millis(1_700_000_000_000));
}

#[test]
fn base64_form_is_text() {
    let bytes = marshaller(APPLICATION_BASE64).marshal(&entry()).unwrap();
    assert!(bytes
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=')));
}

#[test]
fn unsupported_format_names_both_types() {
    let err = marshaller(TEXT_PLAIN).marshal(&entry()).unwrap_err();
    assert_eq!(
        err,
        MarshallingError::NoTranscoderFound {
            from: APPLICATION_MSGPACK,
            to: TEXT_PLAIN,
        }
    );
    let message = err.to_string();
    assert!(message.contains("application/x-msgpack"));
    assert!(message.contains("text/plain"));
}

#[test]
fn wrong_format_payload_is_rejected() {
    let json = marshaller(APPLICATION_JSON);
    assert!(json.unmarshal::<BeanEntry<String, Cart>>(b"not json").is_err());
}

#[test]
fn manager_stores_entries_in_configured_format() {
    let grid = cluster(1, 1);
    let container = Arc::new(RemoteCacheContainer::new(
        Arc::clone(&grid) as Arc<dyn RemoteGrid>
    ));
    let manager: CartManager = DistributedBeanManager::builder(
        context(None),
        container,
        Arc::new(MemberScopedIdentifierFactory::new(grid.local_member())),
    )
    .marshaller(marshaller(APPLICATION_JSON))
    .build()
    .unwrap();
    manager.start().unwrap();

    let bean = new_cart(&manager, "grace");
    let raw = grid
        .get(manager.cache_name(), &bean.id().key_bytes())
        .unwrap()
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    assert_eq!(json["instance"]["owner"], "grace");

    bean.close().unwrap();
    let reloaded = manager.find_bean(bean.id()).unwrap().unwrap();
    assert_eq!(reloaded.instance().owner, "grace");
}
