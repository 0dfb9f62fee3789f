//! SQLite-backed JSON row store
//!
//! Every table lives in one `records` table keyed by `(table_name, id)`. Rows
//! are JSON objects; `id`, `created_at` and `updated_at` are managed here and
//! mirrored into the stored JSON.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::broadcast;

use super::error::{TableError, TableResult};

/// Fields the store owns; patches cannot change them
const MANAGED_FIELDS: [&str; 2] = ["id", "created_at"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordAction {
    Created,
    Updated,
    Deleted,
}

/// A change to one row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordEvent {
    pub table: String,
    pub id: String,
    pub action: RecordAction,
}

/// Row counts per table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableCount {
    pub table: String,
    pub rows: usize,
}

pub struct TableStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    events: broadcast::Sender<RecordEvent>,
}

impl TableStore {
    /// Open (and create) the database file
    pub fn open(path: &Path) -> TableResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Volatile store, used by tests and tooling
    pub fn open_in_memory() -> TableResult<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> TableResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS records (
                table_name TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (table_name, id)
            );
            CREATE INDEX IF NOT EXISTS idx_records_created ON records(table_name, created_at);
            ",
        )?;

        let (events, _) = broadcast::channel(256);
        Ok(Self {
            conn: Mutex::new(conn),
            path,
            events,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordEvent> {
        self.events.subscribe()
    }

    /// Insert a row, assigning `id` (unless given) and timestamps
    pub fn insert(&self, table: &str, row: Value) -> TableResult<Value> {
        let mut object = into_object(row)?;

        let id = match object.get("id").and_then(Value::as_str) {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };
        let now = Utc::now().to_rfc3339();

        object.insert("id".to_string(), Value::String(id.clone()));
        object.insert("created_at".to_string(), Value::String(now.clone()));
        object.insert("updated_at".to_string(), Value::String(now.clone()));
        let row = Value::Object(object);

        let data = serde_json::to_string(&row)?;
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO records (table_name, id, data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![table, id, data, now],
        )?;
        drop(conn);

        if inserted == 0 {
            return Err(TableError::Conflict {
                table: table.to_string(),
                id,
            });
        }

        tracing::debug!(table = %table, id = %id, "Record created");
        self.publish(table, &id, RecordAction::Created);
        Ok(row)
    }

    pub fn get(&self, table: &str, id: &str) -> TableResult<Option<Value>> {
        let conn = self.lock()?;
        read_row(&conn, table, id)
    }

    /// All rows in insertion order
    pub fn list(&self, table: &str) -> TableResult<Vec<Value>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT data FROM records WHERE table_name = ?1 ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map(params![table], |row| row.get::<_, String>(0))?;

        let mut result = Vec::new();
        for data in rows {
            let data = data?;
            match serde_json::from_str(&data) {
                Ok(value) => result.push(value),
                Err(e) => tracing::warn!(table = %table, error = %e, "Skipping undecodable row"),
            }
        }
        Ok(result)
    }

    /// Shallow-merge `patch` into the row
    ///
    /// Read, merge and write share one lock; the event is sent before it is released.
    pub fn update(&self, table: &str, id: &str, patch: Value) -> TableResult<Value> {
        let patch = into_object(patch)?;
        let not_found = || TableError::NotFound {
            table: table.to_string(),
            id: id.to_string(),
        };

        let conn = self.lock()?;
        let current = read_row(&conn, table, id)?.ok_or_else(not_found)?;

        let now = Utc::now().to_rfc3339();
        let mut merged = merge_patch(&current, &Value::Object(patch));
        if let Value::Object(map) = &mut merged {
            map.insert("updated_at".to_string(), Value::String(now.clone()));
        }

        let data = serde_json::to_string(&merged)?;
        let changed = conn.execute(
            "UPDATE records SET data = ?3, updated_at = ?4 WHERE table_name = ?1 AND id = ?2",
            params![table, id, data, now],
        )?;
        if changed == 0 {
            return Err(not_found());
        }

        tracing::debug!(table = %table, id = %id, "Record updated");
        self.publish(table, id, RecordAction::Updated);
        drop(conn);
        Ok(merged)
    }

    pub fn delete(&self, table: &str, id: &str) -> TableResult<bool> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM records WHERE table_name = ?1 AND id = ?2",
            params![table, id],
        )?;

        if removed > 0 {
            tracing::debug!(table = %table, id = %id, "Record deleted");
            self.publish(table, id, RecordAction::Deleted);
        }
        drop(conn);
        Ok(removed > 0)
    }

    /// Rows whose top-level `field` equals `value`
    pub fn find_by(&self, table: &str, field: &str, value: &Value) -> TableResult<Vec<Value>> {
        Ok(self
            .list(table)?
            .into_iter()
            .filter(|row| row.get(field) == Some(value))
            .collect())
    }

    pub fn count(&self, table: &str) -> TableResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE table_name = ?1",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Row counts of every non-empty table
    pub fn counts(&self) -> TableResult<Vec<TableCount>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT table_name, COUNT(*) FROM records GROUP BY table_name ORDER BY table_name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(TableCount {
                table: row.get(0)?,
                rows: row.get::<_, i64>(1)? as usize,
            })
        })?;

        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }
        Ok(counts)
    }

    fn lock(&self) -> TableResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| TableError::Lock(e.to_string()))
    }

    fn publish(&self, table: &str, id: &str, action: RecordAction) {
        let _ = self.events.send(RecordEvent {
            table: table.to_string(),
            id: id.to_string(),
            action,
        });
    }
}

/// Shallow merge: top-level keys of `patch` replace those of `current`.
/// Managed fields are left alone.
pub fn merge_patch(current: &Value, patch: &Value) -> Value {
    let mut merged = current.as_object().cloned().unwrap_or_default();
    if let Some(patch) = patch.as_object() {
        for (key, value) in patch {
            if MANAGED_FIELDS.contains(&key.as_str()) {
                continue;
            }
            merged.insert(key.clone(), value.clone());
        }
    }
    Value::Object(merged)
}

fn read_row(conn: &Connection, table: &str, id: &str) -> TableResult<Option<Value>> {
    let data: Option<String> = conn
        .query_row(
            "SELECT data FROM records WHERE table_name = ?1 AND id = ?2",
            params![table, id],
            |row| row.get(0),
        )
        .optional()?;

    data.map(|d| serde_json::from_str(&d).map_err(TableError::from))
        .transpose()
}

fn into_object(row: Value) -> TableResult<Map<String, Value>> {
    match row {
        Value::Object(map) => Ok(map),
        other => Err(TableError::InvalidRow(format!(
            "expected a JSON object, got {}",
            json_type(&other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_insert_assigns_id_and_timestamps() {
        let store = TableStore::open_in_memory().unwrap();
        let row = store
            .insert("clients", json!({"company_name": "Acme"}))
            .unwrap();

        let id = row["id"].as_str().unwrap();
        assert_eq!(id.len(), 36);
        assert!(row["created_at"].is_string());
        assert_eq!(row["created_at"], row["updated_at"]);

        let fetched = store.get("clients", id).unwrap().unwrap();
        assert_eq!(fetched, row);
    }

    #[test]
    fn test_insert_keeps_given_id_and_detects_conflict() {
        let store = TableStore::open_in_memory().unwrap();
        store.insert("clients", json!({"id": "c1"})).unwrap();

        let err = store.insert("clients", json!({"id": "c1"})).unwrap_err();
        assert!(matches!(err, TableError::Conflict { .. }));

        // Same id in another table is fine
        assert!(store.insert("invoices", json!({"id": "c1"})).is_ok());
    }

    #[test]
    fn test_rejects_non_objects() {
        let store = TableStore::open_in_memory().unwrap();
        let err = store.insert("clients", json!([1, 2])).unwrap_err();
        assert_eq!(err.to_string(), "Invalid row: expected a JSON object, got array");
    }

    #[test]
    fn test_update_merges_shallowly() {
        let store = TableStore::open_in_memory().unwrap();
        let row = store
            .insert("clients", json!({"company_name": "Acme", "phone": "1"}))
            .unwrap();
        let id = row["id"].as_str().unwrap().to_string();

        let updated = store
            .update("clients", &id, json!({"phone": "2", "id": "hijack", "email": "a@b.co"}))
            .unwrap();
        assert_eq!(updated["company_name"], "Acme");
        assert_eq!(updated["phone"], "2");
        assert_eq!(updated["email"], "a@b.co");
        assert_eq!(updated["id"], id.as_str());
        assert_eq!(updated["created_at"], row["created_at"]);

        assert_eq!(store.get("clients", &id).unwrap().unwrap(), updated);
    }

    #[test]
    fn test_update_missing_row() {
        let store = TableStore::open_in_memory().unwrap();
        let err = store.update("clients", "nope", json!({})).unwrap_err();
        assert!(matches!(err, TableError::NotFound { .. }));
    }

    #[test]
    fn test_update_racing_delete_never_follows_it() {
        let store = TableStore::open_in_memory().unwrap();
        let ids: Vec<String> = (0..20).map(|i| format!("c{i}")).collect();
        for id in &ids {
            store.insert("clients", json!({"id": id})).unwrap();
        }
        let mut rx = store.subscribe();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..5 {
                    for id in &ids {
                        match store.update("clients", id, json!({"phone": "1"})) {
                            Ok(_) | Err(TableError::NotFound { .. }) => {}
                            Err(e) => panic!("unexpected error: {e}"),
                        }
                    }
                }
            });
            scope.spawn(|| {
                for id in &ids {
                    assert!(store.delete("clients", id).unwrap());
                }
            });
        });

        let mut deleted = std::collections::HashSet::new();
        while let Ok(event) = rx.try_recv() {
            assert!(!deleted.contains(&event.id), "{} changed after delete", event.id);
            if event.action == RecordAction::Deleted {
                deleted.insert(event.id);
            }
        }
        assert_eq!(deleted.len(), ids.len());
        assert_eq!(store.count("clients").unwrap(), 0);
    }

    #[test]
    fn test_list_find_count_delete() {
        let store = TableStore::open_in_memory().unwrap();
        store.insert("inventory", json!({"id": "a", "sku": "X"})).unwrap();
        store.insert("inventory", json!({"id": "b", "sku": "Y"})).unwrap();
        store.insert("clients", json!({"id": "c"})).unwrap();

        let ids: Vec<String> = store
            .list("inventory")
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);

        let found = store.find_by("inventory", "sku", &json!("Y")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["id"], "b");

        assert_eq!(store.count("inventory").unwrap(), 2);
        assert!(store.delete("inventory", "a").unwrap());
        assert!(!store.delete("inventory", "a").unwrap());
        assert_eq!(store.count("inventory").unwrap(), 1);

        let counts = store.counts().unwrap();
        assert_eq!(
            counts,
            vec![
                TableCount { table: "clients".into(), rows: 1 },
                TableCount { table: "inventory".into(), rows: 1 },
            ]
        );
    }

    #[test]
    fn test_events() {
        let store = TableStore::open_in_memory().unwrap();
        let mut rx = store.subscribe();

        store.insert("clients", json!({"id": "c1"})).unwrap();
        store.delete("clients", "c1").unwrap();

        let created = rx.try_recv().unwrap();
        assert_eq!(created.action, RecordAction::Created);
        assert_eq!(created.id, "c1");
        assert_eq!(rx.try_recv().unwrap().action, RecordAction::Deleted);
    }

    #[test]
    fn test_persists_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tables.db");

        {
            let store = TableStore::open(&path).unwrap();
            store.insert("clients", json!({"id": "c1", "company_name": "Acme"})).unwrap();
        }

        let store = TableStore::open(&path).unwrap();
        assert_eq!(store.get("clients", "c1").unwrap().unwrap()["company_name"], "Acme");
        assert_eq!(store.path(), Some(path.as_path()));
    }
}
