//! Document backend.
//!
//! Records are stored as JSON documents in collection-scoped tables of a
//! [`DocumentSession`]. Documents never embed other records: each reference
//! field is written as a [`DocRef`] and resolved again on read through
//! [`codec::dereference`].

pub mod codec;
pub mod session;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::backend::Backend;
use crate::entity::Entity;
use crate::error::{StoreError, StoreResult};
use crate::tables;

pub(crate) use codec::Document;
pub use session::RedbSession;

/// Primary key field, assigned by the session on insert.
pub const PRIMARY_KEY: &str = "_id";

/// Semantic unique key field: the store-assigned record id.
pub const SEMANTIC_KEY: &str = "id";

/// Collection-scoped access to a document database.
///
/// Field matching compares string values for equality.
pub trait DocumentSession: Send + Sync {
    /// Insert a document, assigning `_id` when absent. Returns the `_id`.
    fn insert(&self, collection: &str, document: Value) -> StoreResult<String>;

    /// First document, in insertion order, whose `field` equals `value`.
    fn find_one(&self, collection: &str, field: &str, value: &str) -> StoreResult<Option<Value>>;

    /// Every document in the collection, in insertion order.
    fn find_all(&self, collection: &str) -> StoreResult<Vec<Value>>;

    /// Replace the first document whose `field` equals `value`, keeping its
    /// `_id` and position. Returns false if nothing matched.
    fn replace_one(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        document: Value,
    ) -> StoreResult<bool>;

    /// Remove the first document whose `field` equals `value`. Returns false
    /// if nothing matched.
    fn remove_one(&self, collection: &str, field: &str, value: &str) -> StoreResult<bool>;

    /// Remove every document in the collection.
    fn drop_collection(&self, collection: &str) -> StoreResult<()>;
}

/// Reference record: a link to another collection's document by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocRef {
    #[serde(rename = "$ref")]
    pub collection: String,
    #[serde(rename = "$id")]
    pub id: String,
}

impl DocRef {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

/// Backend adapter translating records to and from session documents.
pub(crate) struct DocumentBackend {
    session: Arc<dyn DocumentSession>,
}

impl DocumentBackend {
    pub(crate) fn new(session: Arc<dyn DocumentSession>) -> Self {
        Self { session }
    }

    pub(crate) fn clear(&mut self) -> StoreResult<()> {
        for collection in tables::COLLECTIONS {
            self.session.drop_collection(collection)?;
        }
        debug!("document collections dropped");
        Ok(())
    }
}

fn decode_all<T: Document>(documents: Vec<Value>) -> StoreResult<Vec<T>> {
    documents.into_iter().map(T::decode).collect()
}

impl<T: Document> Backend<T> for DocumentBackend {
    fn load(&self, id: &str) -> StoreResult<Option<T>> {
        self.session
            .find_one(T::COLLECTION, SEMANTIC_KEY, id)?
            .map(T::decode)
            .transpose()
    }

    fn load_by_name(&self, name: &str) -> StoreResult<Option<T>> {
        self.session
            .find_one(T::COLLECTION, "name", name)?
            .map(T::decode)
            .transpose()
    }

    fn load_all(&self) -> StoreResult<Vec<T>> {
        decode_all(self.session.find_all(T::COLLECTION)?)
    }

    fn resolve(&self, key: &str) -> StoreResult<Option<T>> {
        codec::dereference(self.session.as_ref(), T::COLLECTION, key)?
            .map(T::decode)
            .transpose()
    }

    fn insert(&mut self, record: T) -> StoreResult<()> {
        let document = record.encode()?;
        self.session.insert(T::COLLECTION, document)?;
        Ok(())
    }

    fn replace(&mut self, record: T) -> StoreResult<bool> {
        let document = record.encode()?;
        self.session
            .replace_one(T::COLLECTION, SEMANTIC_KEY, record.id(), document)
    }

    fn remove(&mut self, id: &str) -> StoreResult<bool> {
        self.session.remove_one(T::COLLECTION, SEMANTIC_KEY, id)
    }
}

/// Reject a document that is not a JSON object.
pub(crate) fn expect_object(
    document: &mut Value,
) -> StoreResult<&mut serde_json::Map<String, Value>> {
    document
        .as_object_mut()
        .ok_or_else(|| StoreError::Serialize("document is not a JSON object".to_string()))
}
