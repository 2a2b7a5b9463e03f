//! IPC Server
//!
//! Unix socket server exposing a [`Relay`] (normally the coordinator) to
//! other processes.

use anyhow::Result;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{Relay, Request, Response};
use crate::error::{LensError, LensResult};

/// Largest accepted request line
const MAX_REQUEST_BYTES: u64 = 64 * 1024;

/// Oversized input discarded before replying; past this the connection is dropped
const MAX_DRAIN_BYTES: usize = 16 * 1024 * 1024;

/// Requests accepted back to back before throttling starts
pub const DEFAULT_BURST: u32 = 64;

/// Sustained requests per second once the burst is spent
pub const DEFAULT_PER_SECOND: u32 = 32;

/// Token bucket shared by all connections of one server
#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    per_second: f64,
    bucket: Mutex<(f64, Instant)>,
}

impl RateLimiter {
    pub fn new(burst: u32, per_second: u32) -> Self {
        Self {
            capacity: f64::from(burst),
            per_second: f64::from(per_second),
            bucket: Mutex::new((f64::from(burst), Instant::now())),
        }
    }

    /// Take one token if available
    pub fn try_acquire(&self) -> LensResult<bool> {
        let mut bucket = self.bucket.lock()?;
        let (tokens, last) = &mut *bucket;
        let now = Instant::now();
        let refill = now.duration_since(*last).as_secs_f64() * self.per_second;
        *tokens = (*tokens + refill).min(self.capacity);
        *last = now;

        if *tokens >= 1.0 {
            *tokens -= 1.0;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_BURST, DEFAULT_PER_SECOND)
    }
}

/// IPC Server for the coordinator
pub struct IpcServer {
    path: PathBuf,
    shutdown: Arc<Notify>,
    limiter: Arc<RateLimiter>,
    task: Option<JoinHandle<()>>,
}

impl IpcServer {
    /// Create new IPC server bound to `path` once started
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            shutdown: Arc::new(Notify::new()),
            limiter: Arc::new(RateLimiter::default()),
            task: None,
        }
    }

    /// Replace the default throttle
    pub fn with_rate_limit(mut self, burst: u32, per_second: u32) -> Self {
        self.limiter = Arc::new(RateLimiter::new(burst, per_second));
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start serving requests with the given relay. Must be called inside a tokio runtime.
    pub fn start(&mut self, relay: Arc<dyn Relay>) -> Result<()> {
        // Clean up stale socket
        if self.path.exists() {
            let _ = fs::remove_file(&self.path);
        }

        let listener = UnixListener::bind(&self.path)?;

        // User only: rw-------
        if let Ok(metadata) = fs::metadata(&self.path) {
            let mut perms = metadata.permissions();
            perms.set_mode(0o600);
            if let Err(e) = fs::set_permissions(&self.path, perms) {
                warn!("⚠️ Failed to set strict IPC socket permissions: {}", e);
            } else {
                debug!("🔒 IPC socket permissions set to 0600");
            }
        }

        info!("🔌 IPC server listening on {:?}", self.path);

        let shutdown = self.shutdown.clone();
        let limiter = self.limiter.clone();
        let path = self.path.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.notified() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, _)) => {
                            let relay = relay.clone();
                            let limiter = limiter.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_client(stream, relay, limiter).await {
                                    warn!("IPC client error: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            warn!("IPC accept error: {}", e);
                        }
                    },
                }
            }

            let _ = fs::remove_file(&path);
            info!("🔌 IPC server stopped");
        });

        self.task = Some(task);
        Ok(())
    }

    /// Stop the server and remove the socket
    pub async fn stop(&mut self) {
        self.shutdown.notify_one();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Check if server is running
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Handle a single client connection: one request line, one response line
async fn handle_client(
    stream: UnixStream,
    relay: Arc<dyn Relay>,
    limiter: Arc<RateLimiter>,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let response = match read_request(&mut reader).await {
        Ok(None) => return Ok(()),
        Ok(Some(request)) => {
            if limiter.try_acquire()? {
                debug!("📨 IPC request: {:?}", request);
                match relay.send(request).await {
                    Ok(response) => response,
                    Err(e) => Response::from_error(&e),
                }
            } else {
                warn!("⚠️ IPC rate limit triggered - rejecting request");
                Response::from_error(&LensError::RateLimited(
                    "slow down and try again".to_string(),
                ))
            }
        }
        Err(LensError::Io(e)) => return Err(e.into()),
        Err(e) => {
            warn!("⚠️ Rejecting malformed IPC request: {}", e);
            Response::from_error(&e)
        }
    };

    let response_json = serde_json::to_string(&response)? + "\n";
    write_half.write_all(response_json.as_bytes()).await?;
    write_half.shutdown().await?;

    Ok(())
}

/// Read one request line. `None` means the peer sent nothing.
async fn read_request<R>(reader: &mut R) -> LensResult<Option<Request>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    (&mut *reader)
        .take(MAX_REQUEST_BYTES + 1)
        .read_until(b'\n', &mut buf)
        .await?;

    if buf.last() != Some(&b'\n') && buf.len() as u64 > MAX_REQUEST_BYTES {
        // Drain the rest so the peer can read the reply
        drain_line(reader).await?;
        return Err(LensError::InvalidRequest(format!(
            "request exceeds {} KiB",
            MAX_REQUEST_BYTES / 1024
        )));
    }

    let line = String::from_utf8(buf)
        .map_err(|e| LensError::InvalidRequest(format!("request is not UTF-8: {}", e)))?;
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    serde_json::from_str(line)
        .map(Some)
        .map_err(|e| LensError::InvalidRequest(e.to_string()))
}

async fn drain_line<R>(reader: &mut R) -> LensResult<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut drained = 0;
    let mut scratch = Vec::new();
    loop {
        scratch.clear();
        let n = (&mut *reader)
            .take(MAX_REQUEST_BYTES)
            .read_until(b'\n', &mut scratch)
            .await?;
        drained += n;
        if n == 0 || scratch.last() == Some(&b'\n') {
            return Ok(());
        }
        if drained > MAX_DRAIN_BYTES {
            return Err(LensError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "oversized request never ended",
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::IpcClient;
    use crate::error::ErrorKind;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Echo;

    #[async_trait]
    impl Relay for Echo {
        async fn send(&self, request: Request) -> LensResult<Response> {
            match request {
                Request::Ping => Ok(Response::Ready { ready: true }),
                _ => Ok(Response::Ok { ok: true }),
            }
        }
    }

    fn server(dir: &tempfile::TempDir, burst: u32, per_second: u32) -> (IpcServer, IpcClient) {
        let path = dir.path().join("lens.sock");
        let mut server = IpcServer::new(&path).with_rate_limit(burst, per_second);
        server.start(Arc::new(Echo)).unwrap();
        (server, IpcClient::new(path))
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_refills_over_time() {
        let limiter = RateLimiter::new(3, 1);
        for _ in 0..3 {
            assert!(limiter.try_acquire().unwrap());
        }
        assert!(!limiter.try_acquire().unwrap());

        tokio::time::advance(Duration::from_millis(1100)).await;
        assert!(limiter.try_acquire().unwrap());
        assert!(!limiter.try_acquire().unwrap());
    }

    #[tokio::test]
    async fn test_burst_of_requests_is_throttled() {
        let dir = tempfile::tempdir().unwrap();
        let (mut server, client) = server(&dir, 10, 1);

        let mut served = 0;
        let mut throttled = 0;
        for _ in 0..50 {
            match client.send(Request::Ping).await {
                Ok(Response::Ready { ready: true }) => served += 1,
                Err(LensError::RateLimited(_)) => throttled += 1,
                other => panic!("Unexpected result: {:?}", other),
            }
        }

        assert!(served >= 10, "burst should be served, got {}", served);
        assert!(throttled > 0, "expected throttling after the burst");
        assert_eq!(served + throttled, 50);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_oversized_request_gets_invalid_request() {
        let dir = tempfile::tempdir().unwrap();
        let (mut server, client) = server(&dir, DEFAULT_BURST, DEFAULT_PER_SECOND);

        let data = serde_json::json!({ "big": "é".repeat(40_000) })
            .as_object()
            .cloned()
            .unwrap();
        let err = client.send(Request::SetStorage { data }).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(err.to_string().contains("64 KiB"));

        // The server keeps serving afterwards
        assert_eq!(
            client.send(Request::Ping).await.unwrap(),
            Response::Ready { ready: true }
        );
        server.stop().await;
    }

    #[tokio::test]
    async fn test_request_under_limit_with_multibyte_text_is_served() {
        let dir = tempfile::tempdir().unwrap();
        let (mut server, client) = server(&dir, DEFAULT_BURST, DEFAULT_PER_SECOND);

        let data = serde_json::json!({ "text": "é".repeat(20_000) })
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(
            client.send(Request::SetStorage { data }).await.unwrap(),
            Response::Ok { ok: true }
        );
        server.stop().await;
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_invalid_request() {
        let mut input: &[u8] = b"{\"kind\":\"ping\xff\"}\n";
        let err = read_request(&mut input).await.unwrap_err();
        assert!(matches!(err, LensError::InvalidRequest(_)));
    }
}
