//! SQLite-backed `Indexed` tier
//!
//! A single `kv` table in its own database file. Opening is the slow part
//! (locking, journal recovery), so [`SqliteBackend::open_with_timeout`] bounds
//! it and reports the tier unavailable instead of stalling startup.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::backend::{StorageBackend, Tier};
use super::error::{VaultError, VaultResult};

/// Key-value tier stored in SQLite
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteBackend {
    /// Open (and create) the database synchronously
    pub fn open(path: &Path) -> VaultResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 1000;
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            ",
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_path_buf(),
        })
    }

    /// Open on a blocking thread, giving up after `timeout`
    pub async fn open_with_timeout(path: &Path, timeout: Duration) -> VaultResult<Self> {
        Self::open_bounded(path, timeout, Self::open).await
    }

    async fn open_bounded<F>(path: &Path, timeout: Duration, opener: F) -> VaultResult<Self>
    where
        F: FnOnce(&Path) -> VaultResult<Self> + Send + 'static,
    {
        let owned = path.to_path_buf();
        let task = tokio::task::spawn_blocking(move || opener(&owned));

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(VaultError::Database(format!(
                "open task failed: {}",
                join_err
            ))),
            Err(_) => {
                tracing::warn!(
                    path = ?path,
                    timeout_ms = timeout.as_millis() as u64,
                    "Indexed tier open timed out"
                );
                Err(VaultError::Unavailable(Tier::Indexed))
            }
        }
    }

    /// Database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> VaultResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| VaultError::Lock(format!("indexed tier: {}", e)))
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    fn tier(&self) -> Tier {
        Tier::Indexed
    }

    async fn get(&self, key: &str) -> VaultResult<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> VaultResult<()> {
        if key.is_empty() {
            return Err(VaultError::InvalidKey(key.to_string()));
        }
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> VaultResult<bool> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    async fn keys(&self) -> VaultResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached("SELECT key FROM kv ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_roundtrip() {
        let dir = tempdir().unwrap();
        let backend =
            SqliteBackend::open_with_timeout(&dir.path().join("indexed.db"), Duration::from_secs(5))
                .await
                .unwrap();

        backend.set("clients", "[]").await.unwrap();
        backend.set("clients", "[1]").await.unwrap();
        assert_eq!(backend.get("clients").await.unwrap().as_deref(), Some("[1]"));
        assert_eq!(backend.keys().await.unwrap(), vec!["clients".to_string()]);
        assert!(backend.remove("clients").await.unwrap());
        assert_eq!(backend.get("clients").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_open_failure_reported() {
        let dir = tempdir().unwrap();
        // A directory where the database file should be
        let path = dir.path().join("indexed.db");
        std::fs::create_dir_all(&path).unwrap();

        let result = SqliteBackend::open_with_timeout(&path, Duration::from_secs(5)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_slow_open_marks_tier_unavailable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("indexed.db");

        let result = SqliteBackend::open_bounded(&path, Duration::from_millis(20), |path: &Path| {
            std::thread::sleep(Duration::from_millis(500));
            SqliteBackend::open(path)
        })
        .await;

        assert!(matches!(result, Err(VaultError::Unavailable(Tier::Indexed))));
    }

    #[tokio::test]
    async fn test_open_within_timeout_succeeds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("indexed.db");

        let backend = SqliteBackend::open_bounded(&path, Duration::from_secs(5), |path: &Path| {
            std::thread::sleep(Duration::from_millis(20));
            SqliteBackend::open(path)
        })
        .await
        .unwrap();
        assert_eq!(backend.path(), path.as_path());
    }
}
