//! Saved items
//!
//! A saved item pairs a selection with the result produced from it. Items are
//! written once under the `savedItems` key and only ever deleted afterwards.

use super::{KeyValueStore, StoreMap};
use crate::error::LensResult;
use crate::processing::ProcessingResult;
use crate::selection::Selection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub const SAVED_ITEMS_KEY: &str = "savedItems";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedItem {
    pub id: String,
    pub selection: Selection,
    pub result: ProcessingResult,
    pub saved_at: DateTime<Utc>,
}

/// Repository of saved items in a key-value store
#[derive(Debug, Clone)]
pub struct SavedItems {
    store: Arc<dyn KeyValueStore>,
}

impl SavedItems {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    async fn load_map(&self) -> LensResult<StoreMap> {
        let mut data = self.store.get(&[SAVED_ITEMS_KEY.to_string()]).await?;
        match data.remove(SAVED_ITEMS_KEY) {
            Some(Value::Object(items)) => Ok(items),
            Some(_) => {
                warn!("⚠️ Stored saved items are not an object, treating as empty");
                Ok(StoreMap::new())
            }
            None => Ok(StoreMap::new()),
        }
    }

    async fn store_map(&self, items: StoreMap) -> LensResult<()> {
        let mut data = StoreMap::new();
        data.insert(SAVED_ITEMS_KEY.to_string(), Value::Object(items));
        self.store.set(data).await
    }

    /// Persist a new item with a generated id
    pub async fn save(
        &self,
        selection: Selection,
        result: ProcessingResult,
    ) -> LensResult<SavedItem> {
        let item = SavedItem {
            id: Uuid::new_v4().to_string(),
            selection,
            result,
            saved_at: Utc::now(),
        };

        let mut items = self.load_map().await?;
        items.insert(item.id.clone(), serde_json::to_value(&item)?);
        self.store_map(items).await?;

        info!("💾 Saved {} as {}", item.result.kind(), item.id);
        Ok(item)
    }

    pub async fn get(&self, id: &str) -> LensResult<Option<SavedItem>> {
        let mut items = self.load_map().await?;
        match items.remove(id) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// All items, newest first. Entries that no longer parse are skipped.
    pub async fn list(&self) -> LensResult<Vec<SavedItem>> {
        let items = self.load_map().await?;
        let mut out: Vec<SavedItem> = items
            .into_iter()
            .filter_map(|(id, value)| match serde_json::from_value(value) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!("⚠️ Skipping unreadable saved item {}: {}", id, e);
                    None
                }
            })
            .collect();
        out.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(out)
    }

    /// Delete an item. Returns false if it did not exist.
    pub async fn delete(&self, id: &str) -> LensResult<bool> {
        let mut items = self.load_map().await?;
        if items.remove(id).is_none() {
            return Ok(false);
        }
        self.store_map(items).await?;
        info!("🗑️ Deleted saved item {}", id);
        Ok(true)
    }
}
