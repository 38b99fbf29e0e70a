//! IPC (Inter-Process Communication) via Unix sockets
//!
//! UI surfaces and the CLI talk to the coordinator daemon with
//! length-prefixed JSON over a Unix domain socket.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::debug;

use crate::constants::config::{APP_DIR, SOCKET_FILE};
use crate::constants::ipc::MAX_MESSAGE_SIZE;
use crate::display_mode::{DisplayMode, SourceHost};

pub mod handler;
mod messages;

pub use handler::{RequestHandler, serve};
pub use messages::{
    AckResponse, ActivateResponse, ApplyResponse, CommandResponse, CoordinatorRequest,
    CoordinatorResponse,
};

/// Get default socket path (XDG_RUNTIME_DIR with fallback to cache)
pub fn default_socket_path() -> Result<PathBuf> {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return Ok(PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILE));
    }

    let cache = dirs::cache_dir()
        .context("Failed to determine cache directory (no XDG_RUNTIME_DIR or HOME)")?;
    Ok(cache.join(APP_DIR).join(SOCKET_FILE))
}

/// Client connection to the coordinator daemon
pub struct CoordinatorClient {
    stream: UnixStream,
}

impl CoordinatorClient {
    pub async fn connect_to(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path)
            .await
            .with_context(|| format!("Failed to connect to coordinator at {}", path.display()))?;
        Ok(Self { stream })
    }

    pub async fn send_request(&mut self, request: &CoordinatorRequest) -> Result<()> {
        write_message(&mut self.stream, request).await
    }

    pub async fn recv_response<T: DeserializeOwned>(&mut self) -> Result<T> {
        read_message(&mut self.stream).await
    }

    /// Send request and wait for the matching response
    pub async fn request<T: DeserializeOwned>(
        &mut self,
        request: &CoordinatorRequest,
    ) -> Result<T> {
        self.send_request(request).await?;
        self.recv_response().await
    }
}

/// Tell the daemon a new preference was chosen
///
/// Returns `false` when the daemon is unreachable or reports a failure.
pub async fn notify_display_mode_applied(socket_path: &Path, mode: DisplayMode) -> bool {
    let request = CoordinatorRequest::ApplyDisplayModeNow { mode };
    let result = async {
        let mut client = CoordinatorClient::connect_to(socket_path).await?;
        client.request::<ApplyResponse>(&request).await
    }
    .await;

    match result {
        Ok(response) => response.ok,
        Err(e) => {
            debug!(error = %e, "Display mode notification not delivered");
            false
        }
    }
}

/// Ask the daemon to switch surfaces now; `None` when it cannot be reached
pub async fn request_display_mode_activation(
    socket_path: &Path,
    mode: DisplayMode,
    source_host: SourceHost,
    target_window_id: Option<i64>,
    sender_tab_id: Option<i64>,
) -> Option<ActivateResponse> {
    let request = CoordinatorRequest::ActivateDisplayModeNow {
        mode,
        source_host,
        target_window_id,
        sender_tab_id,
    };
    let result = async {
        let mut client = CoordinatorClient::connect_to(socket_path).await?;
        client.request::<ActivateResponse>(&request).await
    }
    .await;

    match result {
        Ok(response) => Some(response),
        Err(e) => {
            debug!(error = %e, "Display mode activation request not delivered");
            None
        }
    }
}

/// Server listener for the coordinator daemon
pub struct CoordinatorServer {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl CoordinatorServer {
    /// Bind to a socket path, replacing a stale socket file
    pub fn bind_to(socket_path: PathBuf) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| {
                    format!("Failed to create socket directory: {}", parent.display())
                })?;
        }

        if socket_path.exists() {
            std::fs::remove_file(&socket_path)
                .with_context(|| {
                    format!("Failed to remove stale socket: {}", socket_path.display())
                })?;
        }

        let listener = UnixListener::bind(&socket_path)
            .with_context(|| format!("Failed to bind socket at {}", socket_path.display()))?;

        // Owner only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o700))
                .context("Failed to set socket permissions")?;
        }

        Ok(Self {
            listener,
            socket_path,
        })
    }

    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .context("Failed to accept IPC connection")?;
        Ok(stream)
    }

    pub fn path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for CoordinatorServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Write length-prefixed message to stream
pub(crate) async fn write_message<W, T>(stream: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let json = serde_json::to_vec(msg).context("Failed to serialize message to JSON")?;
    if json.len() > MAX_MESSAGE_SIZE {
        bail!("Message too large: {} bytes (max: {})", json.len(), MAX_MESSAGE_SIZE);
    }

    // u32 little-endian length prefix
    let len = json.len() as u32;
    stream
        .write_all(&len.to_le_bytes())
        .await
        .context("Failed to write message length")?;
    stream
        .write_all(&json)
        .await
        .context("Failed to write message payload")?;
    stream.flush().await.context("Failed to flush stream")?;

    Ok(())
}

/// Read one frame; `None` when the peer closed the connection cleanly
pub(crate) async fn read_frame<R>(stream: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e).context("Failed to read message length"),
    }
    let len = u32::from_le_bytes(len_buf) as usize;

    // Refuse huge allocations
    if len > MAX_MESSAGE_SIZE {
        bail!("Message too large: {} bytes (max: {})", len, MAX_MESSAGE_SIZE);
    }

    let mut json_buf = vec![0u8; len];
    stream
        .read_exact(&mut json_buf)
        .await
        .context("Failed to read message payload")?;
    Ok(Some(json_buf))
}

/// Read length-prefixed message from stream
pub(crate) async fn read_message<R, T>(stream: &mut R) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let frame = read_frame(stream)
        .await?
        .context("Connection closed before a message arrived")?;
    serde_json::from_slice(&frame).context("Failed to deserialize message from JSON")
}
