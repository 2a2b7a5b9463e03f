//! TTS (Text-to-Speech) Module
//!
//! Speech is delegated to a host engine. [`Narrator`] keeps at most one
//! utterance playing: starting a new one stops the previous one.

use crate::config::Config;
use crate::error::{LensError, LensResult};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub mod system;

/// Trait for TTS engines
#[async_trait]
pub trait TtsEngine: Send + Sync + std::fmt::Debug {
    /// Start speaking the given text. Returns once playback has started.
    async fn speak(&self, text: &str, lang: Option<&str>, voice: Option<&str>) -> Result<()>;

    /// Stop the current utterance, if any
    async fn stop(&self) -> Result<()>;

    /// Get the engine name
    fn name(&self) -> &str;
}

/// Factory to create the configured TTS engine
pub fn create_engine(config: &Config) -> Arc<dyn TtsEngine> {
    info!("🛠️ Creating TTS engine: {}", config.tts_engine);
    let engine: Arc<dyn TtsEngine> = match config.tts_engine.as_str() {
        "system" => Arc::new(system::SystemEngine::new()),
        other => {
            warn!("  - Unknown engine '{}', falling back to System", other);
            Arc::new(system::SystemEngine::new())
        }
    };
    info!("✅ TTS engine '{}' initialized", engine.name());
    engine
}

/// Single-utterance front for a [`TtsEngine`]
#[derive(Debug)]
pub struct Narrator {
    engine: Arc<dyn TtsEngine>,
    speaking: AtomicBool,
    // Serializes stop-then-speak so two callers cannot interleave
    turn: Mutex<()>,
}

impl Narrator {
    pub fn new(engine: Arc<dyn TtsEngine>) -> Self {
        Self {
            engine,
            speaking: AtomicBool::new(false),
            turn: Mutex::new(()),
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    /// Speak `text`, cancelling any utterance already playing
    pub async fn speak(&self, text: &str, lang: Option<&str>, voice: Option<&str>) -> LensResult<()> {
        let _turn = self.turn.lock().await;

        if self.speaking.swap(false, Ordering::SeqCst) {
            debug!("Stopping previous utterance");
            if let Err(e) = self.engine.stop().await {
                warn!("⚠️ Failed to stop previous utterance: {}", e);
            }
        }

        self.engine
            .speak(text, lang, voice)
            .await
            .map_err(|e| LensError::Tts(e.to_string()))?;
        self.speaking.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub async fn stop(&self) -> LensResult<()> {
        let _turn = self.turn.lock().await;
        self.speaking.store(false, Ordering::SeqCst);
        self.engine
            .stop()
            .await
            .map_err(|e| LensError::Tts(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use tokio_test::{assert_err, assert_ok};

    #[derive(Debug, Default)]
    struct Recorder {
        log: StdMutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl TtsEngine for Recorder {
        async fn speak(&self, text: &str, _lang: Option<&str>, _voice: Option<&str>) -> Result<()> {
            if self.fail {
                return Err(anyhow::anyhow!("no audio device"));
            }
            self.log.lock().unwrap().push(format!("speak:{}", text));
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            self.log.lock().unwrap().push("stop".to_string());
            Ok(())
        }

        fn name(&self) -> &str {
            "recorder"
        }
    }

    #[tokio::test]
    async fn test_new_utterance_stops_previous() {
        let engine = Arc::new(Recorder::default());
        let narrator = Narrator::new(engine.clone());

        assert_ok!(narrator.speak("one", Some("en"), None).await);
        assert!(narrator.is_speaking());
        assert_ok!(narrator.speak("two", Some("en"), None).await);

        assert_eq!(
            *engine.log.lock().unwrap(),
            vec!["speak:one", "stop", "speak:two"]
        );
    }

    #[tokio::test]
    async fn test_engine_failure_is_tts_error() {
        let engine = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        let narrator = Narrator::new(engine);

        let err = assert_err!(narrator.speak("hello", None, None).await);
        assert!(matches!(err, LensError::Tts(_)));
        assert!(!narrator.is_speaking());
    }

    #[test]
    fn test_unknown_engine_falls_back_to_system() {
        let config = Config {
            tts_engine: "piper".to_string(),
            ..Config::default()
        };
        assert_eq!(create_engine(&config).name(), "system");
    }
}
