//! Selection Tracking
//!
//! Types for what the user has selected on a page, the raw page events that
//! produce them, and the state machine that decides which selection is current.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod classify;
pub mod tracker;

pub use classify::classify;
pub use tracker::{SelectionTracker, TrackerState, Transition};

/// The text or image currently targeted by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum Selection {
    Text {
        content: String,
        surrounding_context_before: String,
        surrounding_context_after: String,
        source_element_tag: String,
        page_url: String,
        captured_at: DateTime<Utc>,
    },
    Image {
        source_url: String,
        alt_text: String,
        width: u32,
        height: u32,
        source_element_tag: String,
        page_url: String,
        captured_at: DateTime<Utc>,
    },
}

impl Selection {
    pub fn is_text(&self) -> bool {
        matches!(self, Selection::Text { .. })
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Selection::Image { .. })
    }

    /// Selected text, if this is a text selection
    pub fn text(&self) -> Option<&str> {
        match self {
            Selection::Text { content, .. } => Some(content),
            Selection::Image { .. } => None,
        }
    }

    pub fn page_url(&self) -> &str {
        match self {
            Selection::Text { page_url, .. } | Selection::Image { page_url, .. } => page_url,
        }
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        match self {
            Selection::Text { captured_at, .. } | Selection::Image { captured_at, .. } => {
                *captured_at
            }
        }
    }

    /// Short one-line description for logs and the popup header
    pub fn preview(&self, max_chars: usize) -> String {
        match self {
            Selection::Text { content, .. } => {
                if content.chars().count() <= max_chars {
                    content.clone()
                } else {
                    let cut: String = content.chars().take(max_chars).collect();
                    format!("{}…", cut)
                }
            }
            Selection::Image {
                source_url,
                width,
                height,
                ..
            } => format!("Image {}x{} ({})", width, height, source_url),
        }
    }
}

/// Raw interaction events observed on a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum PageEvent {
    /// Mouse-up or key-up that ended with a non-empty text selection
    TextSelected {
        text: String,
        #[serde(default)]
        context_before: String,
        #[serde(default)]
        context_after: String,
        element_tag: String,
        page_url: String,
    },
    /// Right-click on an image element
    ImageContextMenu {
        src: String,
        #[serde(default)]
        alt: Option<String>,
        natural_width: u32,
        natural_height: u32,
        rendered_width: u32,
        rendered_height: u32,
        visible: bool,
        element_tag: String,
        page_url: String,
    },
    /// The selection collapsed
    SelectionCleared,
    /// The page navigated away or unloaded
    Navigated { page_url: String },
}

/// Event kinds handlers can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageEventKind {
    TextSelected,
    ImageContextMenu,
    SelectionCleared,
    Navigated,
}

impl PageEventKind {
    pub const ALL: [PageEventKind; 4] = [
        PageEventKind::TextSelected,
        PageEventKind::ImageContextMenu,
        PageEventKind::SelectionCleared,
        PageEventKind::Navigated,
    ];
}

impl PageEvent {
    pub fn kind(&self) -> PageEventKind {
        match self {
            PageEvent::TextSelected { .. } => PageEventKind::TextSelected,
            PageEvent::ImageContextMenu { .. } => PageEventKind::ImageContextMenu,
            PageEvent::SelectionCleared => PageEventKind::SelectionCleared,
            PageEvent::Navigated { .. } => PageEventKind::Navigated,
        }
    }
}
