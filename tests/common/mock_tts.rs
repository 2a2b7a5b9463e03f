//! Mock TTS Engine for Testing
//!
//! Records all spoken text for verification.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Mock TTS engine that records spoken text
#[derive(Debug, Clone)]
pub struct MockTts {
    /// All text that was "spoken", with its language
    pub spoken: Arc<Mutex<Vec<(String, Option<String>)>>>,
    /// Number of stop calls
    pub stops: Arc<Mutex<usize>>,
    /// Simulate failure on next speak
    pub should_fail: Arc<Mutex<bool>>,
}

impl MockTts {
    pub fn new() -> Self {
        Self {
            spoken: Arc::new(Mutex::new(Vec::new())),
            stops: Arc::new(Mutex::new(0)),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    /// Get all spoken phrases
    pub fn get_spoken(&self) -> Vec<String> {
        self.spoken
            .lock()
            .unwrap()
            .iter()
            .map(|(text, _)| text.clone())
            .collect()
    }

    /// Check if a phrase was spoken
    pub fn was_spoken(&self, text: &str) -> bool {
        self.get_spoken().iter().any(|s| s.contains(text))
    }

    pub fn last_language(&self) -> Option<String> {
        self.spoken.lock().unwrap().last().and_then(|(_, lang)| lang.clone())
    }

    pub fn stop_count(&self) -> usize {
        *self.stops.lock().unwrap()
    }
}

impl Default for MockTts {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl pagelens::tts::TtsEngine for MockTts {
    async fn speak(&self, text: &str, lang: Option<&str>, _voice: Option<&str>) -> Result<()> {
        if *self.should_fail.lock().unwrap() {
            return Err(anyhow::anyhow!("Mock TTS failure"));
        }
        self.spoken
            .lock()
            .unwrap()
            .push((text.to_string(), lang.map(str::to_string)));
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        *self.stops.lock().unwrap() += 1;
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_tts_records_speech() {
        use pagelens::tts::TtsEngine;

        let mock = MockTts::new();
        mock.speak("hello", Some("en"), None).await.unwrap();
        mock.speak("world", None, None).await.unwrap();

        assert!(mock.was_spoken("hello"));
        assert!(mock.was_spoken("world"));
        assert_eq!(mock.get_spoken().len(), 2);
        assert_eq!(mock.last_language(), None);
    }
}
