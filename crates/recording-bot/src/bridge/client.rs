//! Hosted side of the bridge.

use super::messages::BridgeCall;
use super::BridgeError;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

/// Cloneable handle the hosted side uses to call the host.
///
/// Log calls never fail the caller; once the host is gone they are dropped.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    sender: mpsc::Sender<BridgeCall>,
}

impl BridgeClient {
    pub(crate) fn new(sender: mpsc::Sender<BridgeCall>) -> Self {
        Self { sender }
    }

    pub async fn debug(&self, text: impl Into<String>) {
        let _ = self.sender.send(BridgeCall::Debug { text: text.into() }).await;
    }

    pub async fn info(&self, text: impl Into<String>) {
        let _ = self.sender.send(BridgeCall::Info { text: text.into() }).await;
    }

    pub async fn error(&self, text: impl Into<String>) {
        let _ = self.sender.send(BridgeCall::Error { text: text.into() }).await;
    }

    /// Create the directories for `path` and wait for the host to confirm.
    ///
    /// # Errors
    ///
    /// Returns the host's error, or `BridgeError::Closed` if it is gone.
    pub async fn ensure_directory(&self, path: Vec<String>) -> Result<(), BridgeError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(BridgeCall::EnsureDirectory {
                path,
                respond_to: tx,
            })
            .await
            .map_err(|_| BridgeError::Closed)?;
        rx.await.map_err(|_| BridgeError::Closed)?
    }

    /// Queue an encoded chunk for appending to `path`.
    ///
    /// Delivery failures on the host are logged there and not reported back.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Closed` if the host no longer accepts calls.
    pub async fn append_chunk(&self, path: Vec<String>, chunk: String) -> Result<(), BridgeError> {
        self.sender
            .send(BridgeCall::AppendChunk { path, chunk })
            .await
            .map_err(|e| {
                if let BridgeCall::AppendChunk { path, .. } = e.0 {
                    warn!(
                        target: "rb.hosted.capture",
                        path = %path.join("/"),
                        "Bridge closed, dropping chunk"
                    );
                }
                BridgeError::Closed
            })
    }

    /// Whether the host has stopped accepting calls.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
