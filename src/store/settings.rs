//! User settings persisted under the `settings` key

use super::{KeyValueStore, StoreMap};
use crate::error::{LensError, LensResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

pub const SETTINGS_KEY: &str = "settings";

/// Length of generated summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLength {
    #[default]
    Short,
    Medium,
    Long,
}

impl SummaryLength {
    /// Number of key points requested from the summarizer
    pub fn bullet_count(&self) -> usize {
        match self {
            SummaryLength::Short => 3,
            SummaryLength::Medium => 5,
            SummaryLength::Long => 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub preferred_language: String,
    pub voice_preference: Option<String>,
    pub summary_length: SummaryLength,
    pub auto_save: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            preferred_language: "en".to_string(),
            voice_preference: None,
            summary_length: SummaryLength::Short,
            auto_save: false,
        }
    }
}

impl Settings {
    /// Names of the individually addressable settings
    pub const KEYS: [&'static str; 4] = [
        "preferredLanguage",
        "voicePreference",
        "summaryLength",
        "autoSave",
    ];
}

/// Reads and writes [`Settings`] in a key-value store
#[derive(Debug, Clone)]
pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load settings. Missing or unreadable settings fall back to defaults.
    pub async fn load(&self) -> LensResult<Settings> {
        let data = self.store.get(&[SETTINGS_KEY.to_string()]).await?;
        match data.get(SETTINGS_KEY) {
            None => Ok(Settings::default()),
            Some(value) => match serde_json::from_value(value.clone()) {
                Ok(settings) => Ok(settings),
                Err(e) => {
                    warn!("⚠️ Stored settings invalid, using defaults: {}", e);
                    Ok(Settings::default())
                }
            },
        }
    }

    pub async fn save(&self, settings: &Settings) -> LensResult<()> {
        let mut data = StoreMap::new();
        data.insert(SETTINGS_KEY.to_string(), serde_json::to_value(settings)?);
        self.store.set(data).await
    }

    /// Read one setting by its camelCase name
    pub async fn get_field(&self, key: &str) -> LensResult<Option<Value>> {
        check_key(key)?;
        let settings = serde_json::to_value(self.load().await?)?;
        Ok(settings.get(key).cloned())
    }

    /// Update one setting by its camelCase name. The value must have the
    /// setting's type.
    pub async fn set_field(&self, key: &str, value: Value) -> LensResult<Settings> {
        check_key(key)?;
        let mut object = match serde_json::to_value(self.load().await?)? {
            Value::Object(object) => object,
            _ => StoreMap::new(),
        };
        object.insert(key.to_string(), value);

        let settings: Settings = serde_json::from_value(Value::Object(object))
            .map_err(|e| LensError::InvalidRequest(format!("invalid value for {}: {}", key, e)))?;
        self.save(&settings).await?;
        Ok(settings)
    }
}

fn check_key(key: &str) -> LensResult<()> {
    if Settings::KEYS.contains(&key) {
        Ok(())
    } else {
        Err(LensError::InvalidRequest(format!("unknown setting '{}'", key)))
    }
}
