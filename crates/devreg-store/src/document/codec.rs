//! Per-record encode/decode strategies for the document backend.
//!
//! Records without references are stored as their own JSON form. Records
//! with references go through a document struct in which every reference
//! field is a [`DocRef`] naming the peer collection and the referenced id;
//! nested record bodies are never embedded. Decoding turns each `DocRef`
//! back into a stub holding only the stored key, which the store then
//! hydrates through [`dereference`].

use std::collections::BTreeMap;

use devreg_core::types::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{DocRef, DocumentSession, PRIMARY_KEY, SEMANTIC_KEY};
use crate::entity::Entity;
use crate::error::{StoreError, StoreResult};
use crate::tables;

pub(crate) trait Document: Entity {
    const COLLECTION: &'static str;

    fn encode(&self) -> StoreResult<Value>;

    /// Decode a stored document. Reference fields come back as stubs.
    fn decode(document: Value) -> StoreResult<Self>;
}

/// Find the document a reference key points at.
///
/// The key is matched against the semantic `id` field first and against the
/// primary `_id` field second: reference records written before ids were
/// assigned by the store carry the referenced document's `_id` instead.
pub fn dereference(
    session: &dyn DocumentSession,
    collection: &str,
    key: &str,
) -> StoreResult<Option<Value>> {
    if let Some(document) = session.find_one(collection, SEMANTIC_KEY, key)? {
        return Ok(Some(document));
    }
    let fallback = session.find_one(collection, PRIMARY_KEY, key)?;
    if fallback.is_some() {
        debug!(collection, key, "reference resolved by primary key");
    }
    Ok(fallback)
}

fn to_ref<R: Document>(record: &R) -> DocRef {
    DocRef::new(R::COLLECTION, record.id())
}

fn from_ref<R: Document>(reference: DocRef) -> StoreResult<R> {
    if reference.collection != R::COLLECTION {
        return Err(StoreError::Deserialize(format!(
            "reference to {} where {} was expected",
            reference.collection,
            R::COLLECTION
        )));
    }
    let mut stub = R::default();
    stub.set_id(reference.id);
    Ok(stub)
}

fn encode_value<S: Serialize>(shape: &S) -> StoreResult<Value> {
    serde_json::to_value(shape).map_err(map_err!(Serialize))
}

fn decode_value<S: for<'de> Deserialize<'de>>(document: Value) -> StoreResult<S> {
    serde_json::from_value(document).map_err(map_err!(Deserialize))
}

macro_rules! plain_document {
    ($ty:ty, $collection:expr) => {
        impl Document for $ty {
            const COLLECTION: &'static str = $collection;

            fn encode(&self) -> StoreResult<Value> {
                encode_value(self)
            }

            fn decode(document: Value) -> StoreResult<Self> {
                decode_value(document)
            }
        }
    };
}

plain_document!(Addressable, tables::ADDRESSABLE);
plain_document!(Command, tables::COMMAND);
plain_document!(Schedule, tables::SCHEDULE);
plain_document!(DeviceReport, tables::DEVICE_REPORT);

// ── Device service ────────────────────────────────────────────────

#[derive(Default, Serialize, Deserialize)]
#[serde(default)]
struct DeviceServiceDocument {
    id: String,
    name: String,
    description: String,
    labels: Vec<String>,
    admin_state: AdminState,
    operating_state: OperatingState,
    last_connected: i64,
    last_reported: i64,
    addressable: DocRef,
    created: i64,
    modified: i64,
    origin: i64,
}

impl Document for DeviceService {
    const COLLECTION: &'static str = tables::DEVICE_SERVICE;

    fn encode(&self) -> StoreResult<Value> {
        encode_value(&DeviceServiceDocument {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            labels: self.labels.clone(),
            admin_state: self.admin_state,
            operating_state: self.operating_state,
            last_connected: self.last_connected,
            last_reported: self.last_reported,
            addressable: to_ref(&self.addressable),
            created: self.created,
            modified: self.modified,
            origin: self.origin,
        })
    }

    fn decode(document: Value) -> StoreResult<Self> {
        let doc: DeviceServiceDocument = decode_value(document)?;
        Ok(DeviceService {
            id: doc.id,
            name: doc.name,
            description: doc.description,
            labels: doc.labels,
            admin_state: doc.admin_state,
            operating_state: doc.operating_state,
            last_connected: doc.last_connected,
            last_reported: doc.last_reported,
            addressable: from_ref(doc.addressable)?,
            created: doc.created,
            modified: doc.modified,
            origin: doc.origin,
        })
    }
}

// ── Device profile ────────────────────────────────────────────────

#[derive(Default, Serialize, Deserialize)]
#[serde(default)]
struct DeviceProfileDocument {
    id: String,
    name: String,
    description: String,
    manufacturer: String,
    model: String,
    labels: Vec<String>,
    commands: Vec<DocRef>,
    created: i64,
    modified: i64,
    origin: i64,
}

impl Document for DeviceProfile {
    const COLLECTION: &'static str = tables::DEVICE_PROFILE;

    fn encode(&self) -> StoreResult<Value> {
        encode_value(&DeviceProfileDocument {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            manufacturer: self.manufacturer.clone(),
            model: self.model.clone(),
            labels: self.labels.clone(),
            commands: self.commands.iter().map(to_ref).collect(),
            created: self.created,
            modified: self.modified,
            origin: self.origin,
        })
    }

    fn decode(document: Value) -> StoreResult<Self> {
        let doc: DeviceProfileDocument = decode_value(document)?;
        Ok(DeviceProfile {
            id: doc.id,
            name: doc.name,
            description: doc.description,
            manufacturer: doc.manufacturer,
            model: doc.model,
            labels: doc.labels,
            commands: doc
                .commands
                .into_iter()
                .map(from_ref)
                .collect::<StoreResult<_>>()?,
            created: doc.created,
            modified: doc.modified,
            origin: doc.origin,
        })
    }
}

// ── Device ────────────────────────────────────────────────────────

#[derive(Default, Serialize, Deserialize)]
#[serde(default)]
struct DeviceDocument {
    id: String,
    name: String,
    description: String,
    admin_state: AdminState,
    operating_state: OperatingState,
    labels: Vec<String>,
    location: String,
    last_connected: i64,
    last_reported: i64,
    addressable: DocRef,
    service: DocRef,
    profile: DocRef,
    created: i64,
    modified: i64,
    origin: i64,
}

impl Document for Device {
    const COLLECTION: &'static str = tables::DEVICE;

    fn encode(&self) -> StoreResult<Value> {
        encode_value(&DeviceDocument {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            admin_state: self.admin_state,
            operating_state: self.operating_state,
            labels: self.labels.clone(),
            location: self.location.clone(),
            last_connected: self.last_connected,
            last_reported: self.last_reported,
            addressable: to_ref(&self.addressable),
            service: to_ref(&self.service),
            profile: to_ref(&self.profile),
            created: self.created,
            modified: self.modified,
            origin: self.origin,
        })
    }

    fn decode(document: Value) -> StoreResult<Self> {
        let doc: DeviceDocument = decode_value(document)?;
        Ok(Device {
            id: doc.id,
            name: doc.name,
            description: doc.description,
            admin_state: doc.admin_state,
            operating_state: doc.operating_state,
            labels: doc.labels,
            location: doc.location,
            last_connected: doc.last_connected,
            last_reported: doc.last_reported,
            addressable: from_ref(doc.addressable)?,
            service: from_ref(doc.service)?,
            profile: from_ref(doc.profile)?,
            created: doc.created,
            modified: doc.modified,
            origin: doc.origin,
        })
    }
}

// ── Schedule event ────────────────────────────────────────────────

#[derive(Default, Serialize, Deserialize)]
#[serde(default)]
struct ScheduleEventDocument {
    id: String,
    name: String,
    schedule: String,
    addressable: DocRef,
    parameters: String,
    service: String,
    created: i64,
    modified: i64,
    origin: i64,
}

impl Document for ScheduleEvent {
    const COLLECTION: &'static str = tables::SCHEDULE_EVENT;

    fn encode(&self) -> StoreResult<Value> {
        encode_value(&ScheduleEventDocument {
            id: self.id.clone(),
            name: self.name.clone(),
            schedule: self.schedule.clone(),
            addressable: to_ref(&self.addressable),
            parameters: self.parameters.clone(),
            service: self.service.clone(),
            created: self.created,
            modified: self.modified,
            origin: self.origin,
        })
    }

    fn decode(document: Value) -> StoreResult<Self> {
        let doc: ScheduleEventDocument = decode_value(document)?;
        Ok(ScheduleEvent {
            id: doc.id,
            name: doc.name,
            schedule: doc.schedule,
            addressable: from_ref(doc.addressable)?,
            parameters: doc.parameters,
            service: doc.service,
            created: doc.created,
            modified: doc.modified,
            origin: doc.origin,
        })
    }
}

// ── Provision watcher ─────────────────────────────────────────────

#[derive(Default, Serialize, Deserialize)]
#[serde(default)]
struct ProvisionWatcherDocument {
    id: String,
    name: String,
    identifiers: BTreeMap<String, String>,
    profile: DocRef,
    service: DocRef,
    operating_state: OperatingState,
    created: i64,
    modified: i64,
    origin: i64,
}

impl Document for ProvisionWatcher {
    const COLLECTION: &'static str = tables::PROVISION_WATCHER;

    fn encode(&self) -> StoreResult<Value> {
        encode_value(&ProvisionWatcherDocument {
            id: self.id.clone(),
            name: self.name.clone(),
            identifiers: self.identifiers.clone(),
            profile: to_ref(&self.profile),
            service: to_ref(&self.service),
            operating_state: self.operating_state,
            created: self.created,
            modified: self.modified,
            origin: self.origin,
        })
    }

    fn decode(document: Value) -> StoreResult<Self> {
        let doc: ProvisionWatcherDocument = decode_value(document)?;
        Ok(ProvisionWatcher {
            id: doc.id,
            name: doc.name,
            identifiers: doc.identifiers,
            profile: from_ref(doc.profile)?,
            service: from_ref(doc.service)?,
            operating_state: doc.operating_state,
            created: doc.created,
            modified: doc.modified,
            origin: doc.origin,
        })
    }
}
