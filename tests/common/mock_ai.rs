//! Mock AI Capabilities for Testing
//!
//! Returns canned text, counts calls and can be made to fail or to block
//! until released.

use async_trait::async_trait;
use pagelens::capability::{
    Capabilities, ImageInput, ImagePrompter, RewriteOptions, Rewriter, Summarizer,
    SummaryOptions, Translator,
};
use pagelens::error::{LensError, LensResult};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const MOCK_SUMMARY: &str = "- a\n- b\n- c";

#[derive(Debug, Clone, Default)]
pub struct MockAi {
    /// Every call as "<capability>:<input>"
    pub calls: Arc<Mutex<Vec<String>>>,
    /// Fail every call with CapabilityUnavailable
    pub should_fail: Arc<Mutex<bool>>,
    /// When set, each call waits for a permit before answering
    pub gate: Option<Arc<Notify>>,
}

impl MockAi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let mock = Self {
            gate: Some(gate.clone()),
            ..Self::default()
        };
        (mock, gate)
    }

    pub fn set_failing(&self, fail: bool) {
        *self.should_fail.lock().unwrap() = fail;
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::from_backend(Arc::new(self.clone()))
    }

    async fn answer(&self, call: String, reply: String) -> LensResult<String> {
        self.calls.lock().unwrap().push(call);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if *self.should_fail.lock().unwrap() {
            return Err(LensError::CapabilityUnavailable("mock model offline".to_string()));
        }
        Ok(reply)
    }
}

#[async_trait]
impl Summarizer for MockAi {
    async fn summarize(&self, text: &str, _options: &SummaryOptions) -> LensResult<String> {
        self.answer(format!("summarize:{}", text), MOCK_SUMMARY.to_string())
            .await
    }
}

#[async_trait]
impl Rewriter for MockAi {
    async fn rewrite(&self, text: &str, _options: &RewriteOptions) -> LensResult<String> {
        self.answer(format!("rewrite:{}", text), format!("Simply: {}", text))
            .await
    }
}

#[async_trait]
impl Translator for MockAi {
    async fn translate(
        &self,
        text: &str,
        _source_lang: Option<&str>,
        target_lang: &str,
    ) -> LensResult<String> {
        self.answer(
            format!("translate:{}", text),
            format!("[{}] {}", target_lang, text),
        )
        .await
    }
}

#[async_trait]
impl ImagePrompter for MockAi {
    async fn prompt_with_image(&self, image: &ImageInput, _prompt: &str) -> LensResult<String> {
        self.answer(
            format!("image:{}", image.source_url),
            "Alt text: A cat.\nDescription: A grey cat asleep on a sofa.".to_string(),
        )
        .await
    }
}
