//! PageLens Library
//!
//! Core modules for the PageLens reading assistant: selection tracking on a
//! page, the coordinator relay, persistent storage and the popup workflow.

pub mod capability;
pub mod config;
pub mod content;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod ipc;
pub mod popup;
pub mod processing;
pub mod selection;
pub mod store;
pub mod tts;
