//! IPC Client
//!
//! Unix socket client used by the popup and the CLI to reach the coordinator.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::debug;

use super::{socket_path, Relay, Request, Response};
use crate::error::{LensError, LensResult};

/// IPC Client for the coordinator socket
#[derive(Debug, Clone)]
pub struct IpcClient {
    path: PathBuf,
}

impl Default for IpcClient {
    fn default() -> Self {
        Self::new(socket_path())
    }
}

impl IpcClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the coordinator is accepting connections
    pub async fn is_daemon_running(&self) -> bool {
        if !self.path.exists() {
            return false;
        }
        UnixStream::connect(&self.path).await.is_ok()
    }

    async fn roundtrip(&self, request: &Request) -> LensResult<Response> {
        let unreachable =
            |e: std::io::Error| LensError::RelayUnreachable(format!("{}: {}", self.path.display(), e));

        let mut stream = UnixStream::connect(&self.path).await.map_err(unreachable)?;

        let request_json = serde_json::to_string(request)? + "\n";
        stream
            .write_all(request_json.as_bytes())
            .await
            .map_err(unreachable)?;

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line).await.map_err(unreachable)?;

        if line.trim().is_empty() {
            return Err(LensError::RelayUnreachable(
                "coordinator closed the connection without replying".to_string(),
            ));
        }

        let response: Response = serde_json::from_str(line.trim())?;
        debug!("📨 IPC response: {:?}", response);
        Ok(response)
    }
}

#[async_trait]
impl Relay for IpcClient {
    async fn send(&self, request: Request) -> LensResult<Response> {
        self.roundtrip(&request).await?.into_result()
    }
}
