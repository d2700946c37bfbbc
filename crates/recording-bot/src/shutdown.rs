//! Shutdown coordination.
//!
//! Three things can end the process: a termination signal, a failed startup
//! step, or the hosted side reporting that the session ended. All of them go
//! through [`ShutdownCoordinator::request_shutdown`]; the first reason
//! recorded decides the exit status and later requests are ignored.

use std::sync::{Arc, OnceLock};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Why the process is shutting down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Operator sent a termination signal.
    Signal,
    /// A startup step failed.
    StartupFailed(String),
    /// The session ended, optionally with an error.
    SessionEnded { error: Option<String> },
}

impl ShutdownReason {
    /// Whether this shutdown should be reported as a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        match self {
            ShutdownReason::Signal => false,
            ShutdownReason::StartupFailed(_) => true,
            ShutdownReason::SessionEnded { error } => error.is_some(),
        }
    }

    /// Process exit status: 0 for a clean shutdown, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        u8::from(self.is_error())
    }
}

#[derive(Debug, Default)]
struct Inner {
    token: CancellationToken,
    reason: OnceLock<ShutdownReason>,
}

/// Process-wide shutdown state, shared by cloning.
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    inner: Arc<Inner>,
}

impl ShutdownCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Returns `true` if this call recorded the reason.
    pub fn request_shutdown(&self, reason: ShutdownReason) -> bool {
        let recorded = self.inner.reason.set(reason.clone()).is_ok();
        if recorded {
            info!(target: "rb.orchestrator", reason = ?reason, "Shutdown requested");
        } else {
            debug!(
                target: "rb.orchestrator",
                reason = ?reason,
                "Shutdown already requested, ignoring"
            );
        }
        self.inner.token.cancel();
        recorded
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Resolves once shutdown has been requested.
    pub async fn wait(&self) {
        self.inner.token.cancelled().await;
    }

    /// First recorded reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&ShutdownReason> {
        self.inner.reason.get()
    }

    /// Token cancelled together with the coordinator.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.inner.token.child_token()
    }

    /// Exit status for the recorded reason. No reason means a clean exit.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        self.reason().map_or(0, ShutdownReason::exit_code)
    }
}

/// Wait for a termination signal (SIGUSR2, SIGTERM or Ctrl+C).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. Without them the process
/// has no way to shut down gracefully.
pub async fn wait_for_termination_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let user_defined2 = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::user_defined2())
            .expect("Failed to install SIGUSR2 handler")
            .recv()
            .await;
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let user_defined2 = std::future::pending::<()>();
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = user_defined2 => {}
        () = terminate => {}
    }
}
