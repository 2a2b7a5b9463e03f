//! IPC Message Types
//!
//! The closed set of messages exchanged between the content script, the
//! coordinator and the popup. JSON-serializable, tagged by `kind`.

use crate::error::{ErrorKind, LensError, LensResult};
use crate::processing::ProcessingKind;
use crate::selection::{PageEvent, Selection};
use crate::store::{SavedItem, StoreMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Requests handled by the coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Request {
    /// The content script tracked a new selection
    ContentSelected { selection: Selection },

    /// A raw page event for the content script
    PageEvent { event: PageEvent },

    /// Ask for the current selection
    GetSelectedContent,

    /// Liveness check
    Ping,

    /// Read raw store keys (all keys when empty)
    GetStorage {
        #[serde(default)]
        keys: Vec<String>,
    },

    /// Write raw store entries
    SetStorage { data: StoreMap },

    /// Read one user setting
    GetSetting { key: String },

    /// Update one user setting
    SetSetting { key: String, value: Value },

    /// List saved items
    GetSavedItems,

    /// Delete one saved item
    DeleteSavedItem { id: String },

    /// Brokered AI processing (not provided by the coordinator)
    ProcessContent {
        action: ProcessingKind,
        #[serde(default)]
        selection: Option<Selection>,
    },
}

/// Responses sent back by the coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Response {
    Selection { selection: Option<Selection> },

    Ready { ready: bool },

    Data { data: StoreMap },

    Ok { ok: bool },

    Setting { key: String, value: Option<Value> },

    SavedItems { items: Vec<SavedItem> },

    NotAvailable { message: String },

    Error { error: ErrorKind, message: String },
}

impl Response {
    pub fn from_error(err: &LensError) -> Self {
        Response::Error {
            error: err.kind(),
            message: err.to_string(),
        }
    }

    /// Turn an `error` response back into a [`LensError`]
    pub fn into_result(self) -> LensResult<Response> {
        match self {
            Response::Error { error, message } => Err(LensError::from_kind(error, message)),
            other => Ok(other),
        }
    }
}
