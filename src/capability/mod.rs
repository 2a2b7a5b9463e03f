//! AI Capabilities
//!
//! The model runtime is an external collaborator. Each capability is a single
//! async call with one success or failure outcome; whatever text comes back is
//! treated as the result.

use crate::error::LensResult;
use crate::store::SummaryLength;
use async_trait::async_trait;
use std::sync::Arc;

pub mod ollama;

pub use ollama::OllamaCapabilities;

/// Options for the summarizer. Summaries are always key points in plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SummaryOptions {
    pub length: SummaryLength,
}

impl SummaryOptions {
    /// Upper bound on words per key point
    pub const MAX_WORDS_PER_POINT: usize = 20;

    pub fn key_points(&self) -> usize {
        self.length.bullet_count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOptions {
    /// Instruction describing the wanted register
    pub context: String,
}

impl RewriteOptions {
    /// Plain-language rewrite used by "simplify"
    pub fn plain_language() -> Self {
        Self {
            context: "Rewrite in plain language that is easy to understand. Use short sentences and common words in a casual tone.".to_string(),
        }
    }
}

/// Image handed to the multimodal prompt capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub source_url: String,
    pub alt_text: String,
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str, options: &SummaryOptions) -> LensResult<String>;
}

#[async_trait]
pub trait Rewriter: Send + Sync {
    async fn rewrite(&self, text: &str, options: &RewriteOptions) -> LensResult<String>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source_lang: Option<&str>,
        target_lang: &str,
    ) -> LensResult<String>;
}

#[async_trait]
pub trait ImagePrompter: Send + Sync {
    async fn prompt_with_image(&self, image: &ImageInput, prompt: &str) -> LensResult<String>;
}

/// The set of capabilities the popup can call
#[derive(Clone)]
pub struct Capabilities {
    pub summarizer: Arc<dyn Summarizer>,
    pub rewriter: Arc<dyn Rewriter>,
    pub translator: Arc<dyn Translator>,
    pub prompter: Arc<dyn ImagePrompter>,
}

impl Capabilities {
    /// Use one backend for every capability
    pub fn from_backend<T>(backend: Arc<T>) -> Self
    where
        T: Summarizer + Rewriter + Translator + ImagePrompter + 'static,
    {
        Self {
            summarizer: backend.clone(),
            rewriter: backend.clone(),
            translator: backend.clone(),
            prompter: backend,
        }
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}
