//! Processing results produced by the AI capabilities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which kind of processing produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingKind {
    Summary,
    Simplification,
    Description,
    Translation,
}

impl fmt::Display for ProcessingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProcessingKind::Summary => "Summary",
            ProcessingKind::Simplification => "Simplified",
            ProcessingKind::Description => "Description",
            ProcessingKind::Translation => "Translation",
        };
        f.write_str(label)
    }
}

/// Output of one capability call, held by the popup for display, speech and saving
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProcessingResult {
    Summary {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    Simplification {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    Description {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    Translation {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
}

impl ProcessingResult {
    pub fn new(kind: ProcessingKind, content: String, language: Option<String>) -> Self {
        match kind {
            ProcessingKind::Summary => ProcessingResult::Summary { content, language },
            ProcessingKind::Simplification => {
                ProcessingResult::Simplification { content, language }
            }
            ProcessingKind::Description => ProcessingResult::Description { content, language },
            ProcessingKind::Translation => ProcessingResult::Translation { content, language },
        }
    }

    pub fn kind(&self) -> ProcessingKind {
        match self {
            ProcessingResult::Summary { .. } => ProcessingKind::Summary,
            ProcessingResult::Simplification { .. } => ProcessingKind::Simplification,
            ProcessingResult::Description { .. } => ProcessingKind::Description,
            ProcessingResult::Translation { .. } => ProcessingKind::Translation,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            ProcessingResult::Summary { content, .. }
            | ProcessingResult::Simplification { content, .. }
            | ProcessingResult::Description { content, .. }
            | ProcessingResult::Translation { content, .. } => content,
        }
    }

    pub fn language(&self) -> Option<&str> {
        match self {
            ProcessingResult::Summary { language, .. }
            | ProcessingResult::Simplification { language, .. }
            | ProcessingResult::Description { language, .. }
            | ProcessingResult::Translation { language, .. } => language.as_deref(),
        }
    }
}
