//! Document backend layout and reference-record resolution.

use std::sync::Arc;

use devreg_core::types::*;
use devreg_store::document::{PRIMARY_KEY, SEMANTIC_KEY};
use devreg_store::tables;
use devreg_store::{DocumentSession, MetadataStore, RedbSession, StoreError};
use serde_json::json;

fn open() -> (RedbSession, MetadataStore) {
    let session = RedbSession::open_in_memory().unwrap();
    let store = MetadataStore::document(Arc::new(session.clone()));
    (session, store)
}

fn seed(store: &MetadataStore) -> String {
    store
        .add_addressable(&Addressable {
            name: "addr1".to_string(),
            address: "10.0.0.5".to_string(),
            port: 49990,
            ..Default::default()
        })
        .unwrap()
}

#[test]
fn references_are_stored_as_reference_records() {
    let (session, store) = open();
    let addr = seed(&store);
    let svc = store
        .add_device_service(&DeviceService {
            name: "svc1".to_string(),
            addressable: Addressable {
                name: "addr1".to_string(),
                port: 1,
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();

    let doc = session
        .find_one(tables::DEVICE_SERVICE, SEMANTIC_KEY, &svc)
        .unwrap()
        .unwrap();
    assert_eq!(doc["addressable"], json!({"$ref": "addressable", "$id": addr}));
    assert!(doc[PRIMARY_KEY].is_string());
    assert_ne!(doc[PRIMARY_KEY], doc[SEMANTIC_KEY]);
}

#[test]
fn legacy_reference_by_primary_key_still_resolves() {
    let (session, store) = open();
    let addr = seed(&store);
    let addr_doc = session
        .find_one(tables::ADDRESSABLE, "name", "addr1")
        .unwrap()
        .unwrap();
    let primary = addr_doc[PRIMARY_KEY].as_str().unwrap().to_string();
    assert_ne!(primary, addr);

    session
        .insert(
            tables::DEVICE_SERVICE,
            json!({
                "id": "legacy-svc",
                "name": "legacy",
                "admin_state": "UNLOCKED",
                "operating_state": "ENABLED",
                "addressable": {"$ref": "addressable", "$id": primary},
            }),
        )
        .unwrap();

    let svc = store.get_device_service_by_id("legacy-svc").unwrap();
    assert_eq!(svc.addressable.id, addr);
    assert_eq!(svc.addressable.port, 49990);
    assert_eq!(store.get_device_services().unwrap().len(), 1);
}

#[test]
fn reference_to_wrong_collection_fails_to_decode() {
    let (session, store) = open();
    let addr = seed(&store);
    session
        .insert(
            tables::DEVICE_SERVICE,
            json!({
                "id": "bad-svc",
                "name": "bad",
                "addressable": {"$ref": "schedule", "$id": addr},
            }),
        )
        .unwrap();

    let err = store.get_device_service_by_id("bad-svc").unwrap_err();
    assert!(matches!(err, StoreError::Deserialize(_)), "{err}");
}

#[test]
fn scalar_fields_survive_a_round_trip() {
    let (_session, store) = open();
    seed(&store);
    store
        .add_device_service(&DeviceService {
            name: "svc1".to_string(),
            description: "modbus gateway".to_string(),
            labels: vec!["modbus".to_string(), "rtu".to_string()],
            admin_state: AdminState::Locked,
            operating_state: OperatingState::Disabled,
            last_connected: 42,
            origin: 7,
            addressable: Addressable {
                name: "addr1".to_string(),
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();

    let svc = store.get_device_service_by_name("svc1").unwrap();
    assert_eq!(svc.description, "modbus gateway");
    assert_eq!(svc.labels, ["modbus", "rtu"]);
    assert_eq!(svc.admin_state, AdminState::Locked);
    assert_eq!(svc.operating_state, OperatingState::Disabled);
    assert_eq!(svc.last_connected, 42);
    assert_eq!(svc.origin, 7);
    assert_eq!(svc.addressable.address, "10.0.0.5");
}

#[test]
fn store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metadata.redb");

    let svc = {
        let store = MetadataStore::open_document(&path).unwrap();
        seed(&store);
        store
            .add_device_service(&DeviceService {
                name: "svc1".to_string(),
                addressable: Addressable {
                    name: "addr1".to_string(),
                    ..Default::default()
                },
                ..Default::default()
            })
            .unwrap()
    };

    let store = MetadataStore::open_document(&path).unwrap();
    let service = store.get_device_service_by_id(&svc).unwrap();
    assert_eq!(service.name, "svc1");
    assert_eq!(service.addressable.port, 49990);
    assert!(store
        .add_addressable(&Addressable {
            name: "addr1".to_string(),
            ..Default::default()
        })
        .unwrap_err()
        .is_not_unique());
}
