//! IPC (Inter-Process Communication) Module
//!
//! Message passing between the popup and the coordinator. The coordinator can
//! be reached in-process or over a Unix socket.
//! Protocol: JSON over newline-delimited messages, one request per connection.

pub mod client;
pub mod messages;
pub mod server;

pub use client::IpcClient;
pub use messages::*;
pub use server::IpcServer;

use crate::error::LensResult;
use async_trait::async_trait;
use std::path::PathBuf;

/// Anything that can carry a request to the coordinator and bring back its response
#[async_trait]
pub trait Relay: Send + Sync {
    async fn send(&self, request: Request) -> LensResult<Response>;
}

/// Get the Unix socket path for IPC
pub fn socket_path() -> PathBuf {
    let user = std::env::var("USER").unwrap_or_else(|_| "pagelens".to_string());
    PathBuf::from(format!("/tmp/pagelens-{}.sock", user))
}
