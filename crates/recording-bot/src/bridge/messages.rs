//! Message types crossing the bridge.
//!
//! Calls from the hosted side carry only strings, mirroring what an
//! automation-exposed function can receive.

use super::{BridgeError, BridgeSummary};
use tokio::sync::oneshot;

/// Calls the hosted side can make on the host.
#[derive(Debug)]
pub enum BridgeCall {
    Debug {
        text: String,
    },

    Info {
        text: String,
    },

    Error {
        text: String,
    },

    /// Create every directory of `path` except the last segment.
    EnsureDirectory {
        path: Vec<String>,
        /// Acknowledged once the directories exist.
        respond_to: oneshot::Sender<Result<(), BridgeError>>,
    },

    /// Decode `chunk` and append it to the file at `path`.
    AppendChunk {
        path: Vec<String>,
        chunk: String,
    },
}

impl BridgeCall {
    /// Name of the call as exposed to the hosted side.
    #[must_use]
    pub fn method_name(&self) -> &'static str {
        match self {
            BridgeCall::Debug { .. } => "debug",
            BridgeCall::Info { .. } => "info",
            BridgeCall::Error { .. } => "error",
            BridgeCall::EnsureDirectory { .. } => "ensureDirectory",
            BridgeCall::AppendChunk { .. } => "appendChunk",
        }
    }
}

/// Messages from the orchestrator to the bridge host.
#[derive(Debug)]
pub(crate) enum HostControl {
    /// Retire idle writers and report how many are still open.
    OpenWriters { respond_to: oneshot::Sender<usize> },

    /// Execute pending calls, finish all writers and refuse later calls.
    Close {
        respond_to: oneshot::Sender<BridgeSummary>,
    },
}
