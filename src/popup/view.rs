//! Popup view state
//!
//! Everything the popup shows: the selection, the current result, whether the
//! action controls are enabled, and the last failure with its retry action.

use crate::error::{ErrorKind, LensError};
use crate::processing::{ProcessingKind, ProcessingResult};
use crate::selection::Selection;
use std::fmt::Write as _;

/// The one message shown for any failure
pub const FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

/// User actions the popup can perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Refresh,
    Summarize,
    Simplify,
    Describe,
    Translate(Option<String>),
    Speak,
    Save,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::Refresh => "Refresh",
            Action::Summarize => "Summarize",
            Action::Simplify => "Simplify",
            Action::Describe => "Describe",
            Action::Translate(_) => "Translate",
            Action::Speak => "Read aloud",
            Action::Save => "Save",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: String,
    pub retry: Action,
}

impl Failure {
    pub fn new(error: &LensError, retry: Action) -> Self {
        Self {
            kind: error.kind(),
            message: FAILURE_MESSAGE.to_string(),
            detail: error.to_string(),
            retry,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Status {
    #[default]
    Idle,
    Working(Action),
    Done(ProcessingKind),
    Speaking,
    Saved(String),
    Failed(Failure),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub selection: Option<Selection>,
    pub result: Option<ProcessingResult>,
    /// Text in the result area
    pub displayed_text: Option<String>,
    pub status: Status,
    pub controls_enabled: bool,
    /// Secondary notice shown under the result
    pub notice: Option<String>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            selection: None,
            result: None,
            displayed_text: None,
            status: Status::Idle,
            controls_enabled: true,
            notice: None,
        }
    }
}

impl ViewState {
    pub fn begin(&mut self, action: &Action) {
        self.controls_enabled = false;
        self.notice = None;
        self.status = Status::Working(action.clone());
    }

    pub fn finish(&mut self) {
        self.controls_enabled = true;
    }

    pub fn show_selection(&mut self, selection: Option<Selection>) {
        if self.selection != selection {
            self.result = None;
            self.displayed_text = None;
        }
        self.selection = selection;
        self.status = Status::Idle;
    }

    pub fn show_result(&mut self, result: ProcessingResult) {
        self.displayed_text = Some(result.content().to_string());
        self.status = Status::Done(result.kind());
        self.result = Some(result);
    }

    /// Show a failure. `original` replaces the result area when given.
    pub fn show_failure(&mut self, failure: Failure, original: Option<String>) {
        if original.is_some() {
            self.displayed_text = original;
        }
        self.notice = Some(format!("{} ({})", failure.message, failure.detail));
        self.status = Status::Failed(failure);
    }

    /// The retry action of the last failure, if the view is showing one
    pub fn pending_retry(&self) -> Option<Action> {
        match &self.status {
            Status::Failed(failure) => Some(failure.retry.clone()),
            _ => None,
        }
    }

    /// Plain-text rendering of the popup
    pub fn render(&self) -> String {
        let mut out = String::new();

        match &self.selection {
            Some(selection) => {
                let _ = writeln!(out, "Selection: {}", selection.preview(80));
            }
            None => {
                let _ = writeln!(out, "Select text or right-click an image on the page.");
            }
        }

        if let Some(text) = &self.displayed_text {
            let heading = self
                .result
                .as_ref()
                .map(|r| r.kind().to_string())
                .unwrap_or_else(|| "Original".to_string());
            let _ = writeln!(out, "\n{}:\n{}", heading, text);
        }

        match &self.status {
            Status::Idle | Status::Done(_) => {}
            Status::Working(action) => {
                let _ = writeln!(out, "\n{}…", action.label());
            }
            Status::Speaking => {
                let _ = writeln!(out, "\n🔊 Reading aloud");
            }
            Status::Saved(id) => {
                let _ = writeln!(out, "\nSaved ({})", id);
            }
            Status::Failed(failure) => {
                let _ = writeln!(
                    out,
                    "\n{} [Retry: {}]",
                    failure.message,
                    failure.retry.label()
                );
            }
        }

        if let Some(notice) = &self.notice {
            if !matches!(self.status, Status::Failed(_)) {
                let _ = writeln!(out, "{}", notice);
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controls_disabled_while_working() {
        let mut view = ViewState::default();
        assert!(view.controls_enabled);
        view.begin(&Action::Summarize);
        assert!(!view.controls_enabled);
        assert_eq!(view.status, Status::Working(Action::Summarize));
        view.finish();
        assert!(view.controls_enabled);
    }

    #[test]
    fn test_failure_keeps_original_text() {
        let mut view = ViewState::default();
        let err = LensError::CapabilityUnavailable("translator offline".to_string());
        view.show_failure(
            Failure::new(&err, Action::Translate(Some("fr".to_string()))),
            Some("Hello there".to_string()),
        );

        assert_eq!(view.displayed_text.as_deref(), Some("Hello there"));
        assert_eq!(
            view.pending_retry(),
            Some(Action::Translate(Some("fr".to_string())))
        );
        let rendered = view.render();
        assert!(rendered.contains("Hello there"));
        assert!(rendered.contains(FAILURE_MESSAGE));
        assert!(rendered.contains("Retry: Translate"));
    }

    #[test]
    fn test_new_selection_clears_result() {
        let mut view = ViewState::default();
        let selection = Selection::Text {
            content: "The quick brown fox jumps".to_string(),
            surrounding_context_before: String::new(),
            surrounding_context_after: String::new(),
            source_element_tag: "p".to_string(),
            page_url: "https://example.com".to_string(),
            captured_at: chrono::Utc::now(),
        };
        view.show_selection(Some(selection.clone()));
        view.show_result(ProcessingResult::new(
            ProcessingKind::Summary,
            "- one".to_string(),
            None,
        ));
        assert!(view.result.is_some());

        view.show_selection(Some(selection));
        assert!(view.result.is_some());

        view.show_selection(None);
        assert!(view.result.is_none());
        assert!(view.displayed_text.is_none());
    }
}
