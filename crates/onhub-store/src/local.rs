use std::path::Path;
use std::sync::Mutex;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rusqlite::Connection;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::{debug, info};

use onhub_types::{ChangeEvent, ChangeOp, EntityKind};

use crate::entity::generate_id;
use crate::error::{Result, StoreError};

/// Buffered change events per subscriber before lagging.
const EVENT_CAPACITY: usize = 256;

/// Embedded backend: JSON records in SQLite, one logical collection per
/// entity kind. List order is insertion order (`seq`). Filtering happens
/// in-process with exact-match conjunction, never in SQL.
pub struct LocalStore {
    conn: Mutex<Connection>,
    events: broadcast::Sender<ChangeEvent>,
}

impl LocalStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        run_migrations(&conn)?;

        info!("Local store opened at {}", path.display());
        Ok(Self::wrap(conn))
    }

    /// In-memory store, used by tests and throwaway sessions.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self::wrap(conn))
    }

    fn wrap(conn: Connection) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        LocalStore {
            conn: Mutex::new(conn),
            events,
        }
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&conn)
    }

    // -- Records --

    /// All records of `kind` matching every provided filter key exactly,
    /// in insertion order.
    pub fn list(&self, kind: EntityKind, filters: &Map<String, Value>) -> Result<Vec<Value>> {
        let rows = self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT data FROM records WHERE collection = ?1 ORDER BY seq")?;
            let rows = stmt
                .query_map([kind.collection()], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        let mut records = Vec::with_capacity(rows.len());
        for raw in rows {
            let value: Value = serde_json::from_str(&raw)?;
            if matches_filters(&value, filters) {
                records.push(value);
            }
        }
        Ok(records)
    }

    pub fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Value>> {
        let raw = self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT data FROM records WHERE collection = ?1 AND id = ?2")?;
            let row = stmt
                .query_row((kind.collection(), id), |row| row.get::<_, String>(0))
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            Ok(row)
        })?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Insert a new record. The record's `id` field is the key.
    pub fn insert(&self, kind: EntityKind, record: &Value) -> Result<()> {
        let id = record_id(kind, record)?;
        let data = serde_json::to_string(record)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO records (collection, id, data) VALUES (?1, ?2, ?3)",
                (kind.collection(), &id, &data),
            )?;
            Ok(())
        })?;
        debug!("Inserted {} {}", kind.path_segment(), id);
        self.publish(ChangeEvent::new(kind, id, ChangeOp::Created));
        Ok(())
    }

    /// Replace an existing record in place. Errors with `NotFound` when the
    /// id is absent — the local backend never upserts.
    pub fn replace(&self, kind: EntityKind, id: &str, record: &Value) -> Result<()> {
        let data = serde_json::to_string(record)?;
        let changed = self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE records SET data = ?3 WHERE collection = ?1 AND id = ?2",
                (kind.collection(), id, &data),
            )?;
            Ok(n)
        })?;
        if changed == 0 {
            return Err(StoreError::not_found(kind, id));
        }
        self.publish(ChangeEvent::new(kind, id, ChangeOp::Updated));
        Ok(())
    }

    /// Physical removal. Returns whether a record was actually deleted.
    pub fn delete(&self, kind: EntityKind, id: &str) -> Result<bool> {
        let changed = self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM records WHERE collection = ?1 AND id = ?2",
                (kind.collection(), id),
            )?;
            Ok(n)
        })?;
        if changed > 0 {
            debug!("Deleted {} {}", kind.path_segment(), id);
            self.publish(ChangeEvent::new(kind, id, ChangeOp::Deleted));
        }
        Ok(changed > 0)
    }

    // -- Scalar config keys --

    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
            let row = stmt
                .query_row([key], |row| row.get::<_, String>(0))
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            Ok(row)
        })
    }

    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                (key, value),
            )?;
            Ok(())
        })
    }

    pub fn kv_delete(&self, key: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
            Ok(())
        })
    }

    // -- Blobs --

    /// Store a binary payload as a base64 data URL and hand back the
    /// `local://<key>` reference to put in a file's `file_url`.
    pub fn put_blob(&self, mime: &str, bytes: &[u8]) -> Result<String> {
        let key = format!("local://{}", generate_id());
        let data_url = format!("data:{};base64,{}", mime, BASE64.encode(bytes));
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO blobs (key, data) VALUES (?1, ?2)",
                (&key, &data_url),
            )?;
            Ok(())
        })?;
        Ok(key)
    }

    /// The stored data URL for a `local://` reference, if any.
    pub fn get_blob(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT data FROM blobs WHERE key = ?1")?;
            let row = stmt
                .query_row([key], |row| row.get::<_, String>(0))
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            Ok(row)
        })
    }

    pub fn delete_blob(&self, key: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM blobs WHERE key = ?1", [key])?;
            Ok(n > 0)
        })
    }

    // -- Change notification --

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: ChangeEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Exact-match conjunction over the provided filter keys. No substring or
/// partial matching.
pub(crate) fn matches_filters(record: &Value, filters: &Map<String, Value>) -> bool {
    filters
        .iter()
        .all(|(key, want)| record.get(key) == Some(want))
}

fn record_id(kind: EntityKind, record: &Value) -> Result<String> {
    record
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| StoreError::Invalid {
            kind,
            source: serde::de::Error::custom("record has no id"),
        })
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Local store: running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE records (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                UNIQUE (collection, id)
            );

            CREATE TABLE kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE blobs (
                key TEXT PRIMARY KEY,
                data TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> LocalStore {
        LocalStore::open_in_memory().unwrap()
    }

    fn filters(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn list_preserves_insertion_order() {
        let store = store();
        for name in ["a", "b", "c"] {
            store
                .insert(EntityKind::Folder, &json!({ "id": name, "name": name }))
                .unwrap();
        }
        let names: Vec<String> = store
            .list(EntityKind::Folder, &Map::new())
            .unwrap()
            .into_iter()
            .map(|v| v["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn filter_is_exact_match_not_substring() {
        let store = store();
        store
            .insert(
                EntityKind::Folder,
                &json!({ "id": "1", "owner": "a@x.com" }),
            )
            .unwrap();
        store
            .insert(
                EntityKind::Folder,
                &json!({ "id": "2", "owner": "aa@x.com" }),
            )
            .unwrap();

        let hits = store
            .list(EntityKind::Folder, &filters(json!({ "owner": "a@x.com" })))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["id"], "1");

        // Substring of an owner value matches nothing
        let hits = store
            .list(EntityKind::Folder, &filters(json!({ "owner": "a@x" })))
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn filters_are_a_conjunction() {
        let store = store();
        store
            .insert(
                EntityKind::File,
                &json!({ "id": "1", "owner": "a@x.com", "deleted": false }),
            )
            .unwrap();
        store
            .insert(
                EntityKind::File,
                &json!({ "id": "2", "owner": "a@x.com", "deleted": true }),
            )
            .unwrap();

        let hits = store
            .list(
                EntityKind::File,
                &filters(json!({ "owner": "a@x.com", "deleted": true })),
            )
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["id"], "2");
    }

    #[test]
    fn replace_on_missing_id_is_not_found() {
        let store = store();
        let err = store
            .replace(EntityKind::Folder, "ghost", &json!({ "id": "ghost" }))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn delete_reports_whether_a_record_existed() {
        let store = store();
        store
            .insert(EntityKind::Team, &json!({ "id": "t1" }))
            .unwrap();
        assert!(store.delete(EntityKind::Team, "t1").unwrap());
        assert!(!store.delete(EntityKind::Team, "t1").unwrap());
    }

    #[test]
    fn collections_are_isolated() {
        let store = store();
        store
            .insert(EntityKind::Folder, &json!({ "id": "x" }))
            .unwrap();
        assert!(store.get(EntityKind::File, "x").unwrap().is_none());
    }

    #[test]
    fn mutations_publish_change_events() {
        let store = store();
        let mut rx = store.subscribe();

        store
            .insert(EntityKind::Folder, &json!({ "id": "f1" }))
            .unwrap();
        store
            .replace(EntityKind::Folder, "f1", &json!({ "id": "f1", "n": 2 }))
            .unwrap();
        store.delete(EntityKind::Folder, "f1").unwrap();

        let ops: Vec<ChangeOp> = (0..3).map(|_| rx.try_recv().unwrap().op).collect();
        assert_eq!(
            ops,
            [ChangeOp::Created, ChangeOp::Updated, ChangeOp::Deleted]
        );
    }

    #[test]
    fn blob_round_trip() {
        let store = store();
        let key = store.put_blob("image/png", b"\x89PNG").unwrap();
        assert!(key.starts_with("local://"));
        let data_url = store.get_blob(&key).unwrap().unwrap();
        assert!(data_url.starts_with("data:image/png;base64,"));
        assert!(store.get_blob("local://missing").unwrap().is_none());
    }
}
