//! Cross-boundary call bridge.
//!
//! The hosted side has no filesystem. It reaches the host through a fixed
//! set of string-argument calls ([`BridgeCall`]) sent over one FIFO mailbox.
//! The host executes them in arrival order; appends for the same file are
//! handed to one sequential [`writer`] task, so per-file order always
//! matches call order.
//!
//! ```text
//! BridgeClient ──mpsc──▶ BridgeHost ──mpsc──▶ ChunkWriter (per file)
//!                            ▲
//! BridgeHostHandle ──close───┘
//! ```

mod client;
mod host;
mod messages;
pub mod writer;

pub use client::BridgeClient;
pub use host::BridgeHost;
pub use messages::BridgeCall;
pub use writer::WriterStats;

use media_chunk::CodecError;
use messages::HostControl;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Mailbox size of the hosted side to host channel.
const BRIDGE_CHANNEL_BUFFER: usize = 512;

/// Shortest time a file writer waits for a chunk before closing the file.
pub const DEFAULT_WRITER_IDLE_TIMEOUT: Duration = Duration::from_secs(1);

/// Timeslices without a chunk after which a file writer closes the file.
const WRITER_IDLE_TIMESLICES: u32 = 10;

/// Bridge host settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    /// How long a file writer waits for a chunk before closing the file.
    pub writer_idle_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            writer_idle_timeout: DEFAULT_WRITER_IDLE_TIMEOUT,
        }
    }
}

impl BridgeConfig {
    /// Settings for recordings captured every `timeslice`.
    #[must_use]
    pub fn for_timeslice(timeslice: Duration) -> Self {
        Self {
            writer_idle_timeout: timeslice
                .saturating_mul(WRITER_IDLE_TIMESLICES)
                .max(DEFAULT_WRITER_IDLE_TIMEOUT),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// The host has shut down or the mailbox is gone.
    #[error("Bridge is closed")]
    Closed,

    /// A path segment would escape or confuse the recordings root.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Decode error: {0}")]
    Decode(#[from] CodecError),
}

/// Totals reported when the bridge host closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeSummary {
    pub files: usize,
    pub chunks_written: u64,
    pub bytes_written: u64,
    pub failures: u64,
}

/// Check that `segments` name a file strictly below the recordings root.
///
/// # Errors
///
/// Returns `BridgeError::InvalidPath` for an empty path or a segment that is
/// empty, `.`, `..`, or contains a separator or NUL.
pub fn validate_segments(segments: &[String]) -> Result<(), BridgeError> {
    if segments.is_empty() {
        return Err(BridgeError::InvalidPath("empty path".to_string()));
    }
    for segment in segments {
        if segment.is_empty()
            || segment == "."
            || segment == ".."
            || segment.contains(['/', '\\', '\0'])
        {
            return Err(BridgeError::InvalidPath(format!(
                "bad segment {segment:?} in {}",
                segments.join("/")
            )));
        }
    }
    Ok(())
}

/// Resolve validated `segments` under `root`.
pub(crate) fn resolve(root: &Path, segments: &[String]) -> PathBuf {
    segments.iter().fold(root.to_path_buf(), |path, s| path.join(s))
}

/// Orchestrator side of the bridge.
pub struct BridgeHostHandle {
    control: mpsc::Sender<HostControl>,
    task: JoinHandle<()>,
}

impl BridgeHostHandle {
    /// Execute pending calls, finish every writer and stop accepting calls.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Closed` if the host already closed.
    pub async fn close(&self) -> Result<BridgeSummary, BridgeError> {
        let (tx, rx) = oneshot::channel();
        self.control
            .send(HostControl::Close { respond_to: tx })
            .await
            .map_err(|_| BridgeError::Closed)?;
        rx.await.map_err(|_| BridgeError::Closed)
    }

    /// Number of files with a live writer, after retiring idle ones.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Closed` if the host already closed.
    pub async fn open_writers(&self) -> Result<usize, BridgeError> {
        let (tx, rx) = oneshot::channel();
        self.control
            .send(HostControl::OpenWriters { respond_to: tx })
            .await
            .map_err(|_| BridgeError::Closed)?;
        rx.await.map_err(|_| BridgeError::Closed)
    }

    /// Wait for the host task to exit, aborting it after `timeout`.
    pub async fn join(self, timeout: Duration) {
        let abort = self.task.abort_handle();
        if tokio::time::timeout(timeout, self.task).await.is_err() {
            abort.abort();
        }
    }
}

/// Spawn a bridge host writing under `root` with default settings.
pub fn spawn_bridge(root: impl Into<PathBuf>) -> (BridgeClient, BridgeHostHandle) {
    spawn_bridge_with_config(root, BridgeConfig::default())
}

/// Spawn a bridge host writing under `root`.
pub fn spawn_bridge_with_config(
    root: impl Into<PathBuf>,
    config: BridgeConfig,
) -> (BridgeClient, BridgeHostHandle) {
    let (call_tx, call_rx) = mpsc::channel(BRIDGE_CHANNEL_BUFFER);
    let (control_tx, control_rx) = mpsc::channel(1);

    let host = BridgeHost::new(root.into(), config, call_rx, control_rx);
    let task = tokio::spawn(host.run());

    (
        BridgeClient::new(call_tx),
        BridgeHostHandle {
            control: control_tx,
            task,
        },
    )
}
