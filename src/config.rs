use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bounds applied when classifying page events into selections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionLimits {
    /// Shortest text selection (in chars) that is tracked
    pub min_text_length: usize,
    /// Longer selections are truncated to this many chars
    pub max_text_length: usize,
    /// Chars of surrounding context kept on each side
    pub context_chars: usize,
    /// Smallest natural width/height (px) of a tracked image
    pub min_image_size: u32,
    /// How long a cleared selection stays current
    pub grace_period_ms: u64,
}

impl Default for SelectionLimits {
    fn default() -> Self {
        Self {
            min_text_length: 10,
            max_text_length: 10_000,
            context_chars: 200,
            min_image_size: 50,
            grace_period_ms: 3_000,
        }
    }
}

impl SelectionLimits {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Selection
    pub selection: SelectionLimits,

    // Storage
    pub store_path: String,
    pub storage_quota_bytes: u64,

    // AI
    pub ollama_url: String,
    pub ollama_model: String,
    pub ollama_vision_model: String,

    // Speech
    pub tts_engine: String,

    // Meta
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            selection: SelectionLimits::default(),
            store_path: dirs::data_dir()
                .unwrap_or_default()
                .join("pagelens/store.db")
                .to_string_lossy()
                .to_string(),
            storage_quota_bytes: 5 * 1024 * 1024,
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3.2".to_string(),
            ollama_vision_model: "llava".to_string(),
            tts_engine: "system".to_string(),
            log_level: "INFO".to_string(),
        }
    }
}

impl Config {
    /// Load config from the default location, or create default
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load config from a file. A corrupt file is moved aside and defaults are used.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!("⚠️ Config file corrupted or invalid, using defaults: {}", e);
                let backup_path = path.with_extension("json.corrupt");
                let _ = std::fs::rename(path, &backup_path);
                Ok(Self::default())
            }
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pagelens")
        .join("config.json")
}
