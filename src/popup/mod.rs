//! Popup
//!
//! Drives the user-visible workflow. Every action has the same shape:
//! validate the selection, call exactly one external capability, then show
//! the result or the uniform failure message with a retry action.
//!
//! Only one action runs at a time. A second action started while one is in
//! flight is rejected with [`LensError::ActionInFlight`] and never executes.

use crate::capability::{Capabilities, ImageInput, RewriteOptions, SummaryOptions};
use crate::error::{LensError, LensResult};
use crate::ipc::{Relay, Request, Response};
use crate::processing::ProcessingResult;
use crate::selection::Selection;
use crate::store::{KeyValueStore, SavedItem, SavedItems, Settings, SettingsStore};
use crate::tts::Narrator;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

pub mod view;

pub use view::{Action, Failure, Status, ViewState, FAILURE_MESSAGE};

/// Prompt sent with an image for "describe"
pub const DESCRIBE_PROMPT: &str = "Describe this image for someone who cannot see it. \
First give a short alt text of one sentence on a line starting with \"Alt text:\". \
Then give a longer description on a line starting with \"Description:\".";

/// What a completed action produced
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Ready(Option<Selection>),
    Processed(ProcessingResult),
    Spoken,
    Saved(SavedItem),
}

pub struct Popup {
    relay: Arc<dyn Relay>,
    capabilities: Capabilities,
    saved: SavedItems,
    settings_store: SettingsStore,
    narrator: Narrator,
    settings: Mutex<Settings>,
    view: Mutex<ViewState>,
    busy: AtomicBool,
}

/// Marks an action as in flight; re-enables the controls when dropped
struct InFlight<'a> {
    popup: &'a Popup,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Ok(mut view) = self.popup.view.lock() {
            view.finish();
        }
        self.popup.busy.store(false, Ordering::SeqCst);
    }
}

fn unexpected(response: Response) -> LensError {
    LensError::RelayUnreachable(format!("unexpected response: {:?}", response))
}

impl Popup {
    pub fn new(
        relay: Arc<dyn Relay>,
        capabilities: Capabilities,
        store: Arc<dyn KeyValueStore>,
        narrator: Narrator,
    ) -> Self {
        Self {
            relay,
            capabilities,
            saved: SavedItems::new(store.clone()),
            settings_store: SettingsStore::new(store),
            narrator,
            settings: Mutex::new(Settings::default()),
            view: Mutex::new(ViewState::default()),
            busy: AtomicBool::new(false),
        }
    }

    /// Snapshot of what the popup currently shows
    pub fn view(&self) -> LensResult<ViewState> {
        Ok(self.view.lock()?.clone())
    }

    pub fn settings(&self) -> LensResult<Settings> {
        Ok(self.settings.lock()?.clone())
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Load settings and the current selection
    pub async fn open(&self) -> LensResult<Option<Selection>> {
        match self.perform(Action::Refresh).await? {
            Outcome::Ready(selection) => Ok(selection),
            other => Err(LensError::Other(anyhow::anyhow!(
                "unexpected outcome {:?}",
                other
            ))),
        }
    }

    pub async fn summarize(&self) -> LensResult<ProcessingResult> {
        self.process(Action::Summarize).await
    }

    pub async fn simplify(&self) -> LensResult<ProcessingResult> {
        self.process(Action::Simplify).await
    }

    pub async fn describe(&self) -> LensResult<ProcessingResult> {
        self.process(Action::Describe).await
    }

    /// Translate the current result, or the selected text when there is none.
    /// `target_lang` defaults to the preferred language.
    pub async fn translate(&self, target_lang: Option<&str>) -> LensResult<ProcessingResult> {
        self.process(Action::Translate(target_lang.map(str::to_string)))
            .await
    }

    /// Read the current result (or the selected text) aloud
    pub async fn speak(&self) -> LensResult<()> {
        self.perform(Action::Speak).await.map(|_| ())
    }

    /// Stop reading aloud. Allowed while another action is in flight.
    pub async fn stop(&self) -> LensResult<()> {
        self.narrator.stop().await?;
        let mut view = self.view.lock()?;
        if view.status == Status::Speaking {
            view.status = Status::Idle;
        }
        Ok(())
    }

    pub async fn save(&self) -> LensResult<SavedItem> {
        match self.perform(Action::Save).await? {
            Outcome::Saved(item) => Ok(item),
            other => Err(LensError::Other(anyhow::anyhow!(
                "unexpected outcome {:?}",
                other
            ))),
        }
    }

    /// Re-issue the action that last failed
    pub async fn retry(&self) -> LensResult<Outcome> {
        let action = self
            .view
            .lock()?
            .pending_retry()
            .ok_or_else(|| LensError::InvalidRequest("nothing to retry".to_string()))?;
        info!("🔁 Retrying {}", action.label());
        self.perform(action).await
    }

    async fn process(&self, action: Action) -> LensResult<ProcessingResult> {
        match self.perform(action).await? {
            Outcome::Processed(result) => Ok(result),
            other => Err(LensError::Other(anyhow::anyhow!(
                "unexpected outcome {:?}",
                other
            ))),
        }
    }

    fn begin(&self, action: &Action) -> LensResult<InFlight<'_>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("{} rejected: another action is in flight", action.label());
            return Err(LensError::ActionInFlight);
        }
        let in_flight = InFlight { popup: self };
        self.view.lock()?.begin(action);
        Ok(in_flight)
    }

    /// Run one action with the controls disabled
    pub async fn perform(&self, action: Action) -> LensResult<Outcome> {
        let _in_flight = self.begin(&action)?;
        debug!("▶️ {}", action.label());

        // Shown unchanged if a translation fails
        let original = match action {
            Action::Translate(_) => self.translation_source().ok().map(|(text, _)| text),
            _ => None,
        };

        match self.execute(&action).await {
            Ok(outcome) => {
                self.apply(&outcome)?;
                if let Outcome::Processed(result) = &outcome {
                    self.auto_save(result).await?;
                }
                Ok(outcome)
            }
            Err(e) => {
                warn!("⚠️ {} failed: {}", action.label(), e);
                self.view
                    .lock()?
                    .show_failure(Failure::new(&e, action), original);
                Err(e)
            }
        }
    }

    async fn execute(&self, action: &Action) -> LensResult<Outcome> {
        match action {
            Action::Refresh => self.refresh().await.map(Outcome::Ready),
            Action::Summarize => {
                let text = self.require_text()?;
                let options = SummaryOptions {
                    length: self.settings()?.summary_length,
                };
                let content = self
                    .capabilities
                    .summarizer
                    .summarize(&text, &options)
                    .await?;
                Ok(Outcome::Processed(ProcessingResult::Summary {
                    content,
                    language: None,
                }))
            }
            Action::Simplify => {
                let text = self.require_text()?;
                let content = self
                    .capabilities
                    .rewriter
                    .rewrite(&text, &RewriteOptions::plain_language())
                    .await?;
                Ok(Outcome::Processed(ProcessingResult::Simplification {
                    content,
                    language: None,
                }))
            }
            Action::Describe => {
                let image = self.require_image()?;
                let content = self
                    .capabilities
                    .prompter
                    .prompt_with_image(&image, DESCRIBE_PROMPT)
                    .await?;
                Ok(Outcome::Processed(ProcessingResult::Description {
                    content,
                    language: None,
                }))
            }
            Action::Translate(target) => {
                let target = match target {
                    Some(lang) => lang.clone(),
                    None => self.settings()?.preferred_language,
                };
                let (text, source_lang) = self.translation_source()?;
                let content = self
                    .capabilities
                    .translator
                    .translate(&text, source_lang.as_deref(), &target)
                    .await?;
                Ok(Outcome::Processed(ProcessingResult::Translation {
                    content,
                    language: Some(target),
                }))
            }
            Action::Speak => {
                let (text, lang) = self.speech_source()?;
                let voice = self.settings()?.voice_preference;
                self.narrator
                    .speak(&text, Some(lang.as_str()), voice.as_deref())
                    .await?;
                Ok(Outcome::Spoken)
            }
            Action::Save => {
                let (selection, result) = {
                    let view = self.view.lock()?;
                    match (&view.selection, &view.result) {
                        (Some(selection), Some(result)) => (selection.clone(), result.clone()),
                        _ => {
                            return Err(LensError::InvalidSelection(
                                "nothing to save yet".to_string(),
                            ))
                        }
                    }
                };
                let item = self.saved.save(selection, result).await?;
                Ok(Outcome::Saved(item))
            }
        }
    }

    fn apply(&self, outcome: &Outcome) -> LensResult<()> {
        let mut view = self.view.lock()?;
        match outcome {
            Outcome::Ready(selection) => view.show_selection(selection.clone()),
            Outcome::Processed(result) => view.show_result(result.clone()),
            Outcome::Spoken => view.status = Status::Speaking,
            Outcome::Saved(item) => view.status = Status::Saved(item.id.clone()),
        }
        Ok(())
    }

    /// Save a fresh result when auto-save is on. A failed save is reported as
    /// a notice; the result stays on screen.
    async fn auto_save(&self, result: &ProcessingResult) -> LensResult<()> {
        if !self.settings()?.auto_save {
            return Ok(());
        }
        let Some(selection) = self.view.lock()?.selection.clone() else {
            return Ok(());
        };

        let notice = match self.saved.save(selection, result.clone()).await {
            Ok(item) => format!("Saved automatically ({})", item.id),
            Err(e) => {
                warn!("⚠️ Auto-save failed: {}", e);
                format!("Could not save automatically: {}", e)
            }
        };
        self.view.lock()?.notice = Some(notice);
        Ok(())
    }

    async fn refresh(&self) -> LensResult<Option<Selection>> {
        match self.relay.send(Request::Ping).await? {
            Response::Ready { ready: true } => {}
            other => return Err(unexpected(other)),
        }

        let settings = self.settings_store.load().await?;
        *self.settings.lock()? = settings;

        match self.relay.send(Request::GetSelectedContent).await? {
            Response::Selection { selection } => Ok(selection),
            other => Err(unexpected(other)),
        }
    }

    fn require_text(&self) -> LensResult<String> {
        match &self.view.lock()?.selection {
            Some(Selection::Text { content, .. }) => Ok(content.clone()),
            Some(Selection::Image { .. }) => Err(LensError::InvalidSelection(
                "this action needs selected text, not an image".to_string(),
            )),
            None => Err(LensError::InvalidSelection(
                "select some text first".to_string(),
            )),
        }
    }

    fn require_image(&self) -> LensResult<ImageInput> {
        match &self.view.lock()?.selection {
            Some(Selection::Image {
                source_url,
                alt_text,
                ..
            }) => Ok(ImageInput {
                source_url: source_url.clone(),
                alt_text: alt_text.clone(),
            }),
            Some(Selection::Text { .. }) => Err(LensError::InvalidSelection(
                "this action needs an image, not text".to_string(),
            )),
            None => Err(LensError::InvalidSelection(
                "right-click an image first".to_string(),
            )),
        }
    }

    /// Text to translate and its language: the current result if there is one,
    /// otherwise the selected text
    fn translation_source(&self) -> LensResult<(String, Option<String>)> {
        let view = self.view.lock()?;
        if let Some(result) = &view.result {
            return Ok((
                result.content().to_string(),
                result.language().map(str::to_string),
            ));
        }
        match view.selection.as_ref().and_then(|s| s.text()) {
            Some(text) => Ok((text.to_string(), None)),
            None => Err(LensError::InvalidSelection(
                "nothing to translate".to_string(),
            )),
        }
    }

    fn speech_source(&self) -> LensResult<(String, String)> {
        let preferred = self.settings()?.preferred_language;
        let view = self.view.lock()?;
        if let Some(result) = &view.result {
            let lang = result.language().map(str::to_string).unwrap_or(preferred);
            return Ok((result.content().to_string(), lang));
        }
        match view.selection.as_ref().and_then(|s| s.text()) {
            Some(text) => Ok((text.to_string(), preferred)),
            None => Err(LensError::InvalidSelection("nothing to read".to_string())),
        }
    }
}
