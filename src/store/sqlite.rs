//! SQLite-backed key-value store

use super::{check_quota, entry_size, KeyValueStore, StoreMap};
use crate::error::{LensError, LensResult};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
    quota: Option<u64>,
}

impl SqliteStore {
    pub fn new(db_path: impl Into<PathBuf>, quota: Option<u64>) -> LensResult<Self> {
        let store = Self {
            db_path: db_path.into(),
            quota,
        };
        store.init_db()?;
        info!("💾 Store opened at {}", store.db_path.display());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn init_db(&self) -> LensResult<()> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&self.db_path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Run blocking database work on the blocking thread pool
    async fn blocking<T, F>(&self, work: F) -> LensResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Connection, Option<u64>) -> LensResult<T> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        let quota = self.quota;
        tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            work(conn, quota)
        })
        .await
        .map_err(|e| LensError::Storage(format!("Task join error: {}", e)))?
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, keys: &[String]) -> LensResult<StoreMap> {
        let keys = keys.to_vec();
        self.blocking(move |conn, _| {
            let mut stmt = conn.prepare("SELECT key, value FROM kv")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            let mut out = StoreMap::new();
            for row in rows {
                let (key, raw) = row?;
                if keys.is_empty() || keys.contains(&key) {
                    out.insert(key, serde_json::from_str(&raw)?);
                }
            }
            Ok(out)
        })
        .await
    }

    async fn set(&self, data: StoreMap) -> LensResult<()> {
        let pending = data
            .into_iter()
            .map(|(k, v)| Ok((k, serde_json::to_string(&v)?)))
            .collect::<LensResult<Vec<_>>>()?;

        self.blocking(move |mut conn, quota| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare("SELECT key, value FROM kv")?;
                let existing: HashMap<String, u64> = stmt
                    .query_map([], |row| {
                        let key: String = row.get(0)?;
                        let value: String = row.get(1)?;
                        Ok((key, value))
                    })?
                    .map(|row| {
                        row.map(|(k, v)| {
                            let size = entry_size(&k, &v);
                            (k, size)
                        })
                    })
                    .collect::<Result<_, _>>()?;
                check_quota(&existing, &pending, quota)?;

                let mut insert = tx.prepare(
                    "INSERT INTO kv (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                )?;
                for (key, value_json) in &pending {
                    insert.execute(params![key, value_json])?;
                }
            }
            tx.commit()?;
            debug!("💾 Wrote {} entries", pending.len());
            Ok(())
        })
        .await
    }

    async fn remove(&self, keys: &[String]) -> LensResult<()> {
        let keys = keys.to_vec();
        self.blocking(move |conn, _| {
            for key in &keys {
                conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
            }
            Ok(())
        })
        .await
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_sqlite_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/store.db");

        let store = SqliteStore::new(&path, None).unwrap();
        let mut data = StoreMap::new();
        data.insert("settings".to_string(), json!({"autoSave": true}));
        store.set(data).await.unwrap();

        let reopened = SqliteStore::new(&path, None).unwrap();
        let got = reopened.get(&["settings".to_string()]).await.unwrap();
        assert_eq!(got["settings"]["autoSave"], json!(true));
    }

    #[tokio::test]
    async fn test_sqlite_store_overwrites_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("store.db"), None).unwrap();

        let mut first = StoreMap::new();
        first.insert("k".to_string(), json!(1));
        store.set(first).await.unwrap();

        let mut second = StoreMap::new();
        second.insert("k".to_string(), json!(2));
        store.set(second).await.unwrap();

        assert_eq!(store.get(&[]).await.unwrap()["k"], json!(2));

        store.remove(&["k".to_string()]).await.unwrap();
        assert!(store.get(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_store_quota() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("store.db"), Some(32)).unwrap();

        let mut data = StoreMap::new();
        data.insert("blob".to_string(), json!("x".repeat(64)));
        let err = store.set(data).await.unwrap_err();
        assert!(matches!(err, LensError::StorageQuotaExceeded(_)));
        assert!(store.get(&[]).await.unwrap().is_empty());
    }
}
