//! Top-level handler for faults in hosted-side tasks.
//!
//! Every task the hosted side spawns goes through [`FaultReporter::spawn`].
//! An error or panic in the task is reported to the host over the bridge
//! `error` call and goes no further; the session keeps running.

use super::CaptureError;
use crate::bridge::BridgeClient;
use std::any::Any;
use std::future::Future;
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::debug;

/// A task spawned under a [`FaultReporter`].
pub struct SupervisedTask {
    name: String,
    supervisor: JoinHandle<()>,
    inner: AbortHandle,
}

impl SupervisedTask {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.supervisor.is_finished()
    }

    pub fn abort(&self) {
        self.inner.abort();
        self.supervisor.abort();
    }

    /// Wait for the task to finish. Returns false if it was aborted after
    /// `timeout`.
    pub async fn join(self, timeout: Duration) -> bool {
        let inner = self.inner;
        let supervisor_abort = self.supervisor.abort_handle();
        match tokio::time::timeout(timeout, self.supervisor).await {
            Ok(_) => true,
            Err(_) => {
                debug!(
                    target: "rb.hosted.agent",
                    task = %self.name,
                    "Task did not finish in time, aborting"
                );
                inner.abort();
                supervisor_abort.abort();
                false
            }
        }
    }
}

/// Reports task faults over the bridge.
#[derive(Debug, Clone)]
pub struct FaultReporter {
    bridge: BridgeClient,
}

impl FaultReporter {
    #[must_use]
    pub fn new(bridge: BridgeClient) -> Self {
        Self { bridge }
    }

    /// Spawn `task` and report its error or panic, if any.
    pub fn spawn<F>(&self, name: impl Into<String>, task: F) -> SupervisedTask
    where
        F: Future<Output = Result<(), CaptureError>> + Send + 'static,
    {
        let name = name.into();
        let inner = tokio::spawn(task);
        let inner_abort = inner.abort_handle();

        let bridge = self.bridge.clone();
        let task_name = name.clone();
        let supervisor = tokio::spawn(async move {
            let fault = match inner.await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(e) if e.is_panic() => Some(panic_message(e.into_panic())),
                Err(_) => None,
            };
            if let Some(fault) = fault {
                bridge
                    .error(format!("\n\nFault in {task_name}:\n{}\n", indent(&fault)))
                    .await;
            }
        });

        SupervisedTask {
            name,
            supervisor,
            inner: inner_abort,
        }
    }
}

/// Render a panic payload for a fault report.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

/// Indent every line by two spaces.
fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::bridge::BridgeCall;
    use tokio::sync::mpsc;

    fn reporter() -> (FaultReporter, mpsc::Receiver<BridgeCall>) {
        let (tx, rx) = mpsc::channel(8);
        (FaultReporter::new(BridgeClient::new(tx)), rx)
    }

    async fn next_error(rx: &mut mpsc::Receiver<BridgeCall>) -> String {
        match rx.recv().await.unwrap() {
            BridgeCall::Error { text } => text,
            other => format!("unexpected {}", other.method_name()),
        }
    }

    async fn explode() -> Result<(), CaptureError> {
        panic!("boom")
    }

    #[test]
    fn test_indent() {
        assert_eq!(indent("a\nb"), "  a\n  b");
    }

    #[tokio::test]
    async fn test_error_is_reported() {
        let (faults, mut rx) = reporter();

        let task = faults.spawn("recording MT1", async {
            Err(CaptureError::Encoder("device lost".to_string()))
        });
        assert!(task.join(Duration::from_secs(1)).await);

        let text = next_error(&mut rx).await;
        assert!(text.contains("Fault in recording MT1"));
        assert!(text.contains("  Encoder failed: device lost"));
    }

    #[tokio::test]
    async fn test_panic_is_reported() {
        let (faults, mut rx) = reporter();

        let task = faults.spawn("recording MT2", explode());
        assert!(task.join(Duration::from_secs(1)).await);

        let text = next_error(&mut rx).await;
        assert!(text.contains("panicked: boom"));
    }

    #[tokio::test]
    async fn test_success_reports_nothing() {
        let (faults, mut rx) = reporter();

        let task = faults.spawn("recording MT3", async { Ok(()) });
        assert!(task.join(Duration::from_secs(1)).await);

        drop(faults);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_times_out_and_aborts() {
        let (faults, _rx) = reporter();

        let task = faults.spawn("stuck", std::future::pending());
        assert!(!task.join(Duration::from_secs(5)).await);
    }
}
