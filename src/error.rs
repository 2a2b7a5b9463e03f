//! PageLens Error Types
//!
//! Centralized error handling. Every failure that can reach the user maps to
//! one [`ErrorKind`], which is what travels over the relay and what the popup
//! renders.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Central error type for PageLens
#[derive(Error, Debug)]
pub enum LensError {
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    #[error("Capability timed out: {0}")]
    CapabilityTimeout(String),

    #[error("Malformed capability output: {0}")]
    MalformedOutput(String),

    #[error("Storage quota exceeded: {0}")]
    StorageQuotaExceeded(String),

    #[error("Relay unreachable: {0}")]
    RelayUnreachable(String),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Another action is already in progress")]
    ActionInFlight,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Too many requests: {0}")]
    RateLimited(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TTS engine error: {0}")]
    Tts(String),

    #[error("Lock poisoned: {0}")]
    Lock(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for PageLens operations
pub type LensResult<T> = Result<T, LensError>;

/// Serializable error classification, shared by the relay protocol and the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    CapabilityUnavailable,
    CapabilityTimeout,
    MalformedOutput,
    StorageQuotaExceeded,
    RelayUnreachable,
    InvalidSelection,
    ActionInFlight,
    InvalidRequest,
    RateLimited,
    Internal,
}

impl LensError {
    /// Classify this error for the wire and for display
    pub fn kind(&self) -> ErrorKind {
        match self {
            LensError::CapabilityUnavailable(_) => ErrorKind::CapabilityUnavailable,
            LensError::CapabilityTimeout(_) => ErrorKind::CapabilityTimeout,
            LensError::MalformedOutput(_) => ErrorKind::MalformedOutput,
            LensError::StorageQuotaExceeded(_) => ErrorKind::StorageQuotaExceeded,
            LensError::RelayUnreachable(_) => ErrorKind::RelayUnreachable,
            LensError::InvalidSelection(_) => ErrorKind::InvalidSelection,
            LensError::ActionInFlight => ErrorKind::ActionInFlight,
            LensError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            LensError::RateLimited(_) => ErrorKind::RateLimited,
            LensError::Storage(_)
            | LensError::Config(_)
            | LensError::Tts(_)
            | LensError::Lock(_)
            | LensError::Io(_)
            | LensError::Json(_)
            | LensError::Sqlite(_)
            | LensError::Other(_) => ErrorKind::Internal,
        }
    }

    /// Rebuild an error from its wire form
    pub fn from_kind(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::CapabilityUnavailable => LensError::CapabilityUnavailable(message),
            ErrorKind::CapabilityTimeout => LensError::CapabilityTimeout(message),
            ErrorKind::MalformedOutput => LensError::MalformedOutput(message),
            ErrorKind::StorageQuotaExceeded => LensError::StorageQuotaExceeded(message),
            ErrorKind::RelayUnreachable => LensError::RelayUnreachable(message),
            ErrorKind::InvalidSelection => LensError::InvalidSelection(message),
            ErrorKind::ActionInFlight => LensError::ActionInFlight,
            ErrorKind::InvalidRequest => LensError::InvalidRequest(message),
            ErrorKind::RateLimited => LensError::RateLimited(message),
            ErrorKind::Internal => LensError::Other(anyhow::anyhow!(message)),
        }
    }
}

/// Helper to convert Mutex poison errors
impl<T> From<std::sync::PoisonError<T>> for LensError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        LensError::Lock(err.to_string())
    }
}

/// Any transport failure reaching a capability is treated as the capability
/// being unavailable; timeouts keep their own kind.
impl From<reqwest::Error> for LensError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LensError::CapabilityTimeout(err.to_string())
        } else {
            LensError::CapabilityUnavailable(err.to_string())
        }
    }
}
