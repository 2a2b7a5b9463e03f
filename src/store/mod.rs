//! Key-Value Store
//!
//! Persistent storage shared by the coordinator and the popup. Layout:
//!
//! ```text
//! { "savedItems": { "<id>": SavedItem, ... },
//!   "settings":   { preferredLanguage, voicePreference, summaryLength, autoSave } }
//! ```
//!
//! There is no cross-component locking; the last write wins.

use crate::error::{LensError, LensResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

pub mod saved;
pub mod settings;
pub mod sqlite;

pub use saved::{SavedItem, SavedItems};
pub use settings::{Settings, SettingsStore, SummaryLength};
pub use sqlite::SqliteStore;

pub type StoreMap = serde_json::Map<String, Value>;

/// Trait for key-value storage backends
#[async_trait]
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// Read the given keys. An empty key list reads everything.
    async fn get(&self, keys: &[String]) -> LensResult<StoreMap>;

    /// Write all entries. Fails without writing anything if the quota would be exceeded.
    async fn set(&self, data: StoreMap) -> LensResult<()>;

    async fn remove(&self, keys: &[String]) -> LensResult<()>;

    /// Get the backend name
    fn name(&self) -> &str;
}

/// Stored size of one entry, as counted against the quota
pub(crate) fn entry_size(key: &str, value_json: &str) -> u64 {
    (key.len() + value_json.len()) as u64
}

/// Check a pending write against the quota.
/// `existing` maps every stored key to its stored size.
pub(crate) fn check_quota(
    existing: &HashMap<String, u64>,
    pending: &[(String, String)],
    quota: Option<u64>,
) -> LensResult<()> {
    let Some(quota) = quota else {
        return Ok(());
    };

    let mut sizes = existing.clone();
    for (key, value_json) in pending {
        sizes.insert(key.clone(), entry_size(key, value_json));
    }
    let total: u64 = sizes.values().sum();

    if total > quota {
        return Err(LensError::StorageQuotaExceeded(format!(
            "write would use {} bytes of a {} byte quota",
            total, quota
        )));
    }
    Ok(())
}

/// In-memory store, used by tests and as a scratch backend
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    quota: Option<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota: Some(quota),
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[String]) -> LensResult<StoreMap> {
        let entries = self.entries.lock()?;
        let mut out = StoreMap::new();
        for (key, raw) in entries.iter() {
            if keys.is_empty() || keys.contains(key) {
                out.insert(key.clone(), serde_json::from_str(raw)?);
            }
        }
        Ok(out)
    }

    async fn set(&self, data: StoreMap) -> LensResult<()> {
        let pending = data
            .into_iter()
            .map(|(k, v)| Ok((k, serde_json::to_string(&v)?)))
            .collect::<LensResult<Vec<_>>>()?;

        let mut entries = self.entries.lock()?;
        let existing = entries
            .iter()
            .map(|(k, v)| (k.clone(), entry_size(k, v)))
            .collect();
        check_quota(&existing, &pending, self.quota)?;

        for (key, value_json) in pending {
            entries.insert(key, value_json);
        }
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> LensResult<()> {
        let mut entries = self.entries.lock()?;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
