//! Ollama Capabilities
//!
//! Runs every capability against a local Ollama server through
//! `/api/generate`. Images are sent base64-encoded to the vision model.

use super::{
    ImageInput, ImagePrompter, RewriteOptions, Rewriter, Summarizer, SummaryOptions,
    Translator,
};
use crate::config::Config;
use crate::error::{LensError, LensResult};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use tracing::{debug, warn};

/// Ollama API response
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[derive(Clone)]
pub struct OllamaCapabilities {
    url: String,
    model: String,
    vision_model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OllamaCapabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaCapabilities")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("vision_model", &self.vision_model)
            .finish()
    }
}

impl OllamaCapabilities {
    pub fn new(config: &Config) -> Self {
        Self {
            url: config.ollama_url.trim_end_matches('/').to_string(),
            model: config.ollama_model.clone(),
            vision_model: config.ollama_vision_model.clone(),
            client: reqwest::Client::new(),
        }
    }

    /// Health check - verify Ollama is reachable
    pub async fn is_available(&self) -> bool {
        match self
            .client
            .get(format!("{}/api/tags", self.url))
            .timeout(std::time::Duration::from_secs(2))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// Fail early with `CapabilityUnavailable` when the server is down
    pub async fn ensure_available(&self) -> LensResult<()> {
        if self.is_available().await {
            Ok(())
        } else {
            Err(LensError::CapabilityUnavailable(format!(
                "Ollama is not reachable at {}",
                self.url
            )))
        }
    }

    /// One non-streaming generation. No timeout is applied.
    async fn generate(&self, model: &str, prompt: &str, images: Vec<String>) -> LensResult<String> {
        let mut body = serde_json::json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
        });
        if !images.is_empty() {
            body["images"] = serde_json::json!(images);
        }

        let response = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let body_text = response.text().await?;

        if !status.is_success() {
            warn!("❌ Ollama API Error ({}): {}", status, body_text);
            return Err(LensError::CapabilityUnavailable(format!(
                "Ollama returned {}",
                status
            )));
        }

        debug!("🧠 Ollama raw body: {}", body_text);

        let parsed: OllamaResponse = serde_json::from_str(&body_text).map_err(|e| {
            LensError::MalformedOutput(format!("unreadable Ollama response: {}", e))
        })?;

        Ok(parsed.response.trim().to_string())
    }

    /// Load an image as base64 for the vision model
    async fn load_image(&self, source_url: &str) -> LensResult<String> {
        if let Some(rest) = source_url.strip_prefix("data:") {
            return decode_data_url(rest);
        }

        if source_url.starts_with("blob:") {
            return Err(LensError::CapabilityUnavailable(
                "blob URLs can only be read inside the page".to_string(),
            ));
        }

        let response = self.client.get(source_url).send().await?;
        if !response.status().is_success() {
            return Err(LensError::CapabilityUnavailable(format!(
                "image fetch returned {}",
                response.status()
            )));
        }
        let bytes = response.bytes().await?;
        Ok(STANDARD.encode(bytes))
    }
}

/// Extract base64 image data from the part of a data URL after `data:`
fn decode_data_url(rest: &str) -> LensResult<String> {
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| LensError::InvalidSelection("data URL has no payload".to_string()))?;

    if meta.ends_with(";base64") {
        STANDARD
            .decode(payload)
            .map_err(|e| LensError::InvalidSelection(format!("bad base64 image: {}", e)))?;
        Ok(payload.to_string())
    } else {
        Ok(STANDARD.encode(payload.as_bytes()))
    }
}

fn summary_prompt(text: &str, options: &SummaryOptions) -> String {
    format!(
        r#"Summarize the following text as exactly {points} key points.
Write one point per line, each starting with "- ", each at most {words} words.
Respond with the key points only.

Text:
{text}"#,
        points = options.key_points(),
        words = SummaryOptions::MAX_WORDS_PER_POINT,
    )
}

fn rewrite_prompt(text: &str, options: &RewriteOptions) -> String {
    format!(
        "{context}\nRespond with the rewritten text only.\n\nText:\n{text}",
        context = options.context,
    )
}

fn translate_prompt(text: &str, source_lang: Option<&str>, target_lang: &str) -> String {
    let from = source_lang
        .map(|lang| format!(" from language code '{}'", lang))
        .unwrap_or_default();
    format!(
        "Translate the following text{from} into the language with code '{target_lang}'.\nRespond with the translation only.\n\nText:\n{text}"
    )
}

#[async_trait]
impl Summarizer for OllamaCapabilities {
    async fn summarize(&self, text: &str, options: &SummaryOptions) -> LensResult<String> {
        self.generate(&self.model, &summary_prompt(text, options), Vec::new())
            .await
    }
}

#[async_trait]
impl Rewriter for OllamaCapabilities {
    async fn rewrite(&self, text: &str, options: &RewriteOptions) -> LensResult<String> {
        self.generate(&self.model, &rewrite_prompt(text, options), Vec::new())
            .await
    }
}

#[async_trait]
impl Translator for OllamaCapabilities {
    async fn translate(
        &self,
        text: &str,
        source_lang: Option<&str>,
        target_lang: &str,
    ) -> LensResult<String> {
        self.generate(
            &self.model,
            &translate_prompt(text, source_lang, target_lang),
            Vec::new(),
        )
        .await
    }
}

#[async_trait]
impl ImagePrompter for OllamaCapabilities {
    async fn prompt_with_image(&self, image: &ImageInput, prompt: &str) -> LensResult<String> {
        let encoded = self.load_image(&image.source_url).await?;
        let prompt = if image.alt_text.is_empty() {
            prompt.to_string()
        } else {
            format!("{}\nThe page describes this image as: \"{}\"", prompt, image.alt_text)
        };
        self.generate(&self.vision_model, &prompt, vec![encoded])
            .await
    }
}
