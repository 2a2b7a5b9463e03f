//! System TTS engine
//!
//! Speaks through `spd-say` (speech-dispatcher) or `espeak-ng`. The child
//! process lives for the length of the utterance so it can be stopped.

use super::TtsEngine;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::process::{Child, Command};
use tracing::debug;

#[derive(Debug)]
struct Utterance {
    program: &'static str,
    child: Child,
}

#[derive(Debug, Default)]
pub struct SystemEngine {
    current: Mutex<Option<Utterance>>,
}

impl SystemEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn command(program: &'static str, text: &str, lang: Option<&str>, voice: Option<&str>) -> Command {
        let mut cmd = Command::new(program);
        match program {
            "spd-say" => {
                // Wait so the child tracks the utterance
                cmd.arg("-w");
                if let Some(lang) = lang {
                    cmd.arg("-l").arg(lang);
                }
                if let Some(voice) = voice {
                    cmd.arg("-t").arg(voice);
                }
            }
            _ => {
                if let Some(voice) = voice.or(lang) {
                    cmd.arg("-v").arg(voice);
                }
            }
        }
        cmd.arg(text).kill_on_drop(true);
        cmd
    }

    fn kill_current(&self) -> Result<Option<&'static str>> {
        let mut current = self
            .current
            .lock()
            .map_err(|e| anyhow::anyhow!("TTS lock poisoned: {}", e))?;
        if let Some(mut utterance) = current.take() {
            let _ = utterance.child.start_kill();
            return Ok(Some(utterance.program));
        }
        Ok(None)
    }
}

#[async_trait]
impl TtsEngine for SystemEngine {
    async fn speak(&self, text: &str, lang: Option<&str>, voice: Option<&str>) -> Result<()> {
        debug!("System speaking: {}", text);
        self.kill_current()?;

        for program in ["spd-say", "espeak-ng"] {
            if let Ok(child) = Self::command(program, text, lang, voice).spawn() {
                let mut current = self
                    .current
                    .lock()
                    .map_err(|e| anyhow::anyhow!("TTS lock poisoned: {}", e))?;
                *current = Some(Utterance { program, child });
                return Ok(());
            }
        }

        Err(anyhow::anyhow!(
            "No system TTS command found (tried spd-say, espeak-ng)"
        ))
    }

    async fn stop(&self) -> Result<()> {
        if let Some("spd-say") = self.kill_current()? {
            // speech-dispatcher keeps speaking after the client exits
            let _ = Command::new("spd-say").arg("-S").status().await;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "system"
    }
}
