//! redb-backed document session.
//!
//! Every collection is a redb table from an insertion sequence number to a
//! JSON document. Field lookups are linear scans; there are no secondary
//! indexes.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde_json::Value;
use tracing::debug;

use super::{expect_object, DocumentSession, PRIMARY_KEY};
use crate::error::{StoreError, StoreResult};
use crate::tables;

/// Thread-safe document session backed by redb.
#[derive(Clone)]
pub struct RedbSession {
    db: Arc<Database>,
}

impl RedbSession {
    /// Open (or create) a persistent document database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let session = Self { db: Arc::new(db) };
        session.ensure_tables()?;
        debug!(?path, "document database opened");
        Ok(session)
    }

    /// Create an ephemeral in-memory document database.
    pub fn open_in_memory() -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let session = Self { db: Arc::new(db) };
        session.ensure_tables()?;
        debug!("in-memory document database opened");
        Ok(session)
    }

    /// Create all collection tables if they don't exist yet.
    fn ensure_tables(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        for name in tables::COLLECTIONS {
            txn.open_table(definition(name)?).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }
}

fn definition(collection: &str) -> StoreResult<TableDefinition<'_, u64, &'static [u8]>> {
    tables::collection(collection)
        .ok_or_else(|| StoreError::Table(format!("unknown collection: {collection}")))
}

fn field_matches(document: &Value, field: &str, value: &str) -> bool {
    document.get(field).and_then(Value::as_str) == Some(value)
}

/// First entry whose document has `field == value`, with its sequence key.
fn scan<T>(table: &T, field: &str, value: &str) -> StoreResult<Option<(u64, Value)>>
where
    T: ReadableTable<u64, &'static [u8]>,
{
    for entry in table.iter().map_err(map_err!(Read))? {
        let (key, raw) = entry.map_err(map_err!(Read))?;
        let document: Value =
            serde_json::from_slice(raw.value()).map_err(map_err!(Deserialize))?;
        if field_matches(&document, field, value) {
            return Ok(Some((key.value(), document)));
        }
    }
    Ok(None)
}

fn new_primary_key() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

impl DocumentSession for RedbSession {
    fn insert(&self, collection: &str, mut document: Value) -> StoreResult<String> {
        let def = definition(collection)?;
        let object = expect_object(&mut document)?;
        let key = match object.get(PRIMARY_KEY).and_then(Value::as_str) {
            Some(key) => key.to_string(),
            None => {
                let key = new_primary_key();
                object.insert(PRIMARY_KEY.to_string(), Value::String(key.clone()));
                key
            }
        };
        let value = serde_json::to_vec(&document).map_err(map_err!(Serialize))?;

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(def).map_err(map_err!(Table))?;
            let next = match table.last().map_err(map_err!(Read))? {
                Some((seq, _)) => seq.value() + 1,
                None => 0,
            };
            table
                .insert(next, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(collection, %key, "document inserted");
        Ok(key)
    }

    fn find_one(&self, collection: &str, field: &str, value: &str) -> StoreResult<Option<Value>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(definition(collection)?).map_err(map_err!(Table))?;
        Ok(scan(&table, field, value)?.map(|(_, document)| document))
    }

    fn find_all(&self, collection: &str) -> StoreResult<Vec<Value>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(definition(collection)?).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, raw) = entry.map_err(map_err!(Read))?;
            let document: Value =
                serde_json::from_slice(raw.value()).map_err(map_err!(Deserialize))?;
            results.push(document);
        }
        Ok(results)
    }

    fn replace_one(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        mut document: Value,
    ) -> StoreResult<bool> {
        let def = definition(collection)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let replaced;
        {
            let mut table = txn.open_table(def).map_err(map_err!(Table))?;
            replaced = match scan(&table, field, value)? {
                Some((seq, existing)) => {
                    if let Some(key) = existing.get(PRIMARY_KEY) {
                        expect_object(&mut document)?.insert(PRIMARY_KEY.to_string(), key.clone());
                    }
                    let bytes = serde_json::to_vec(&document).map_err(map_err!(Serialize))?;
                    table
                        .insert(seq, bytes.as_slice())
                        .map_err(map_err!(Write))?;
                    true
                }
                None => false,
            };
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(collection, field, value, replaced, "document replaced");
        Ok(replaced)
    }

    fn remove_one(&self, collection: &str, field: &str, value: &str) -> StoreResult<bool> {
        let def = definition(collection)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(def).map_err(map_err!(Table))?;
            existed = match scan(&table, field, value)? {
                Some((seq, _)) => {
                    table.remove(seq).map_err(map_err!(Write))?;
                    true
                }
                None => false,
            };
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(collection, field, value, existed, "document removed");
        Ok(existed)
    }

    fn drop_collection(&self, collection: &str) -> StoreResult<()> {
        let def = definition(collection)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(def).map_err(map_err!(Table))?;
            // Collect keys first; the iterator borrows the table.
            let mut keys = Vec::new();
            for entry in table.iter().map_err(map_err!(Read))? {
                let (seq, _) = entry.map_err(map_err!(Read))?;
                keys.push(seq.value());
            }
            for seq in keys {
                table.remove(seq).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session() -> RedbSession {
        RedbSession::open_in_memory().unwrap()
    }

    #[test]
    fn insert_assigns_primary_key() {
        let session = session();
        let key = session
            .insert(tables::SCHEDULE, json!({"id": "s1", "name": "10sec"}))
            .unwrap();

        let doc = session
            .find_one(tables::SCHEDULE, PRIMARY_KEY, &key)
            .unwrap()
            .unwrap();
        assert_eq!(doc["id"], "s1");
        assert_eq!(doc[PRIMARY_KEY], key.as_str());
    }

    #[test]
    fn insert_keeps_given_primary_key() {
        let session = session();
        let key = session
            .insert(tables::SCHEDULE, json!({"_id": "legacy-1", "name": "a"}))
            .unwrap();
        assert_eq!(key, "legacy-1");
    }

    #[test]
    fn find_all_preserves_insertion_order() {
        let session = session();
        for name in ["c", "a", "b"] {
            session
                .insert(tables::SCHEDULE, json!({"id": name, "name": name}))
                .unwrap();
        }

        let names: Vec<String> = session
            .find_all(tables::SCHEDULE)
            .unwrap()
            .into_iter()
            .map(|doc| doc["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["c", "a", "b"]);
    }

    #[test]
    fn replace_keeps_primary_key_and_position() {
        let session = session();
        let key = session
            .insert(tables::SCHEDULE, json!({"id": "s1", "name": "old"}))
            .unwrap();
        session
            .insert(tables::SCHEDULE, json!({"id": "s2", "name": "other"}))
            .unwrap();

        let replaced = session
            .replace_one(tables::SCHEDULE, "id", "s1", json!({"id": "s1", "name": "new"}))
            .unwrap();
        assert!(replaced);

        let all = session.find_all(tables::SCHEDULE).unwrap();
        assert_eq!(all[0]["name"], "new");
        assert_eq!(all[0][PRIMARY_KEY], key.as_str());
        assert_eq!(all[1]["name"], "other");

        assert!(!session
            .replace_one(tables::SCHEDULE, "id", "nope", json!({"id": "nope"}))
            .unwrap());
    }

    #[test]
    fn remove_one_reports_existence() {
        let session = session();
        session
            .insert(tables::COMMAND, json!({"id": "c1", "name": "switch"}))
            .unwrap();

        assert!(session.remove_one(tables::COMMAND, "id", "c1").unwrap());
        assert!(!session.remove_one(tables::COMMAND, "id", "c1").unwrap());
        assert!(session.find_all(tables::COMMAND).unwrap().is_empty());
    }

    #[test]
    fn drop_collection_leaves_others() {
        let session = session();
        session
            .insert(tables::COMMAND, json!({"id": "c1"}))
            .unwrap();
        session
            .insert(tables::SCHEDULE, json!({"id": "s1"}))
            .unwrap();

        session.drop_collection(tables::COMMAND).unwrap();

        assert!(session.find_all(tables::COMMAND).unwrap().is_empty());
        assert_eq!(session.find_all(tables::SCHEDULE).unwrap().len(), 1);
    }

    #[test]
    fn unknown_collection_is_an_error() {
        let session = session();
        let err = session.find_all("widgets").unwrap_err();
        assert!(matches!(err, StoreError::Table(_)));
    }

    #[test]
    fn non_object_document_is_rejected() {
        let session = session();
        let err = session.insert(tables::COMMAND, json!([1, 2])).unwrap_err();
        assert!(matches!(err, StoreError::Serialize(_)));
    }

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("metadata.redb");

        {
            let session = RedbSession::open(&db_path).unwrap();
            session
                .insert(tables::ADDRESSABLE, json!({"id": "a1", "name": "addr1"}))
                .unwrap();
        }

        let session = RedbSession::open(&db_path).unwrap();
        let doc = session
            .find_one(tables::ADDRESSABLE, "name", "addr1")
            .unwrap();
        assert_eq!(doc.unwrap()["id"], "a1");
    }
}
