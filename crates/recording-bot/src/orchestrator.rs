//! Host orchestrator.
//!
//! Owns the process lifecycle. Startup is strictly ordered and checks for a
//! pending shutdown between steps:
//!
//! 1. Start the serving surface
//! 2. Launch the hosting environment and open a page
//! 3. Navigate the page to the serving surface (loads the capture bundle)
//! 4. Expose the bridge
//! 5. Join the session
//!
//! Once joined the orchestrator waits for a shutdown request or for the page
//! to report that the session ended. [`Orchestrator::close`] tears down in
//! reverse: stop serving, finish the page, close the environment, close the
//! bridge. It runs exactly once; later calls only return the exit status.

use crate::bridge::{spawn_bridge_with_config, BridgeConfig, BridgeHostHandle};
use crate::config::Config;
use crate::errors::RecorderError;
use crate::hosted::{CaptureProfile, JoinedSession};
use crate::hosting::{HostedPage, HostingEnvironment, HostingLauncher};
use crate::http::build_routes;
use crate::observability::HealthState;
use crate::shutdown::{ShutdownCoordinator, ShutdownReason};
use common::secret::SecretString;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// How long the serving surface gets to finish in-flight requests.
const SERVER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// How long the page gets to stop captures and leave the session.
const PAGE_FINISH_TIMEOUT: Duration = Duration::from_secs(10);

/// How long the bridge host task gets to exit after closing.
const BRIDGE_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Inputs of an [`Orchestrator`] that come from configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Address the serving surface binds to. Port 0 picks a free port.
    pub bind_address: String,
    pub recordings_dir: PathBuf,
    pub session_name: Option<String>,
    pub profile: CaptureProfile,
}

impl OrchestratorSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            bind_address: config.http_bind_address(),
            recordings_dir: config.recordings_dir.clone(),
            session_name: config.session_name.clone(),
            profile: CaptureProfile::new(config.timeslice()),
        }
    }
}

struct ServingSurface {
    url: String,
    cancel_token: CancellationToken,
    task: JoinHandle<()>,
}

impl ServingSurface {
    async fn stop(self) {
        self.cancel_token.cancel();
        let abort = self.task.abort_handle();
        match tokio::time::timeout(SERVER_SHUTDOWN_TIMEOUT, self.task).await {
            Ok(Ok(())) => debug!(target: "rb.orchestrator", "Serving surface stopped"),
            Ok(Err(e)) => {
                warn!(target: "rb.orchestrator", error = %e, "Serving surface task failed");
            }
            Err(_) => {
                warn!(target: "rb.orchestrator", "Serving surface did not stop in time, aborting");
                abort.abort();
            }
        }
    }
}

/// Drives startup, the joined session and teardown.
pub struct Orchestrator {
    settings: OrchestratorSettings,
    launcher: Arc<dyn HostingLauncher>,
    shutdown: ShutdownCoordinator,
    health_state: Arc<HealthState>,
    metrics_handle: Option<PrometheusHandle>,
    server: Option<ServingSurface>,
    environment: Option<Box<dyn HostingEnvironment>>,
    page: Option<Box<dyn HostedPage>>,
    bridge: Option<BridgeHostHandle>,
    closed: bool,
}

impl Orchestrator {
    pub fn new(
        settings: OrchestratorSettings,
        launcher: Arc<dyn HostingLauncher>,
        shutdown: ShutdownCoordinator,
        health_state: Arc<HealthState>,
        metrics_handle: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            settings,
            launcher,
            shutdown,
            health_state,
            metrics_handle,
            server: None,
            environment: None,
            page: None,
            bridge: None,
            closed: false,
        }
    }

    /// URL of the serving surface, once started.
    #[must_use]
    pub fn server_url(&self) -> Option<&str> {
        self.server.as_ref().map(|server| server.url.as_str())
    }

    /// Run to completion and return the process exit status.
    pub async fn run(mut self, token: SecretString) -> u8 {
        match self.start(token).await {
            Ok(Some(_)) => self.wait_for_end().await,
            Ok(None) => info!(target: "rb.orchestrator", "Shutdown requested during startup"),
            Err(e) => {
                error!(target: "rb.orchestrator", error = %e, kind = e.kind(), "Startup failed");
                self.shutdown
                    .request_shutdown(ShutdownReason::StartupFailed(e.to_string()));
            }
        }
        self.close().await
    }

    /// Run the startup steps.
    ///
    /// Returns `Ok(None)` if shutdown was requested before the join finished.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failed step.
    #[instrument(skip_all, name = "rb.orchestrator.start")]
    pub async fn start(
        &mut self,
        token: SecretString,
    ) -> Result<Option<JoinedSession>, RecorderError> {
        let shutdown = self.shutdown.clone();

        if shutdown.is_shutting_down() {
            return Ok(None);
        }
        let url = self.start_serving().await?;

        if shutdown.is_shutting_down() {
            return Ok(None);
        }
        debug!(target: "rb.orchestrator", "Launching hosting environment");
        let launched = self.launcher.launch().await?;
        let environment = self.environment.insert(launched);

        if shutdown.is_shutting_down() {
            return Ok(None);
        }
        let opened = environment.open_page().await?;
        let page = self.page.insert(opened);

        if shutdown.is_shutting_down() {
            return Ok(None);
        }
        debug!(target: "rb.orchestrator", url = %url, "Navigating page");
        page.navigate(&url).await?;

        if shutdown.is_shutting_down() {
            return Ok(None);
        }
        let (client, host) = spawn_bridge_with_config(
            self.settings.recordings_dir.clone(),
            BridgeConfig::for_timeslice(self.settings.profile.timeslice()),
        );
        self.bridge = Some(host);
        page.expose_bridge(client).await?;

        if shutdown.is_shutting_down() {
            return Ok(None);
        }
        info!(
            target: "rb.orchestrator",
            session = self.settings.session_name.as_deref().unwrap_or("<any>"),
            "Joining session"
        );
        let joined = tokio::select! {
            result = page.join(token, self.settings.session_name.clone()) => result?,
            () = shutdown.wait() => return Ok(None),
        };

        info!(
            target: "rb.orchestrator",
            session_sid = %joined.session_sid,
            local_participant_sid = %joined.local_participant_sid,
            "Connected to Room {} as LocalParticipant {}",
            joined.session_sid,
            joined.local_participant_sid
        );
        self.health_state.set_ready();
        Ok(Some(joined))
    }

    /// Wait until shutdown is requested or the session ends on its own.
    pub async fn wait_for_end(&mut self) {
        let shutdown = self.shutdown.clone();
        let Some(page) = self.page.as_mut() else {
            shutdown.wait().await;
            return;
        };

        tokio::select! {
            () = shutdown.wait() => {}
            end = page.session_ended() => {
                match &end.error {
                    Some(e) => {
                        warn!(target: "rb.orchestrator", error = %e, "Session ended with error");
                    }
                    None => info!(target: "rb.orchestrator", "Session ended"),
                }
                shutdown.request_shutdown(ShutdownReason::SessionEnded { error: end.error });
            }
        }
    }

    /// Tear everything down and return the exit status. Runs once.
    pub async fn close(&mut self) -> u8 {
        if self.closed {
            debug!(target: "rb.orchestrator", "Already closed");
            return self.shutdown.exit_code();
        }
        self.closed = true;
        info!(target: "rb.orchestrator", "Shutting down");

        self.health_state.set_not_ready();

        if let Some(server) = self.server.take() {
            server.stop().await;
        }

        if let Some(mut page) = self.page.take() {
            match tokio::time::timeout(PAGE_FINISH_TIMEOUT, page.finish()).await {
                Ok(Ok(summary)) => debug!(
                    target: "rb.orchestrator",
                    recordings_stopped = summary.recordings_stopped,
                    tasks_aborted = summary.tasks_aborted,
                    "Page finished"
                ),
                Ok(Err(e)) => warn!(target: "rb.orchestrator", error = %e, "Page finish failed"),
                Err(_) => warn!(target: "rb.orchestrator", "Page did not finish in time"),
            }
        }

        if let Some(mut environment) = self.environment.take() {
            if let Err(e) = environment.close().await {
                warn!(target: "rb.orchestrator", error = %e, "Failed to close hosting environment");
            }
        }

        if let Some(bridge) = self.bridge.take() {
            match bridge.close().await {
                Ok(summary) => info!(
                    target: "rb.orchestrator",
                    files = summary.files,
                    chunks_written = summary.chunks_written,
                    bytes_written = summary.bytes_written,
                    failures = summary.failures,
                    "Bridge closed"
                ),
                Err(e) => warn!(target: "rb.orchestrator", error = %e, "Failed to close bridge"),
            }
            bridge.join(BRIDGE_JOIN_TIMEOUT).await;
        }

        let exit_code = self.shutdown.exit_code();
        info!(target: "rb.orchestrator", exit_code, "Shutdown complete");
        exit_code
    }

    async fn start_serving(&mut self) -> Result<String, RecorderError> {
        let addr = self.settings.bind_address.clone();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| RecorderError::Bind {
                addr: addr.clone(),
                reason: e.to_string(),
            })?;
        let local_addr = listener.local_addr().map_err(|e| RecorderError::Bind {
            addr: addr.clone(),
            reason: e.to_string(),
        })?;
        let url = page_url(local_addr);
        info!(target: "rb.orchestrator", addr = %local_addr, "Serving surface bound");

        let app = build_routes(
            self.settings.profile.clone(),
            Arc::clone(&self.health_state),
            self.metrics_handle.clone(),
        );
        let cancel_token = CancellationToken::new();
        let server_token = cancel_token.clone();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_token.cancelled().await });
            if let Err(e) = server.await {
                error!(target: "rb.orchestrator", error = %e, "Serving surface failed");
            }
        });

        self.server = Some(ServingSurface {
            url: url.clone(),
            cancel_token,
            task,
        });
        Ok(url)
    }
}

/// URL the page navigates to. A wildcard bind is reached over loopback.
fn page_url(addr: SocketAddr) -> String {
    let ip = if addr.ip().is_unspecified() {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    } else {
        addr.ip()
    };
    format!("http://{}/", SocketAddr::new(ip, addr.port()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::hosted::UnlinkedSessionConnector;
    use crate::hosting::InProcessLauncher;

    fn settings(root: &std::path::Path) -> OrchestratorSettings {
        OrchestratorSettings {
            bind_address: "127.0.0.1:0".to_string(),
            recordings_dir: root.to_path_buf(),
            session_name: Some("RM1".to_string()),
            profile: CaptureProfile::default(),
        }
    }

    fn orchestrator(root: &std::path::Path, shutdown: ShutdownCoordinator) -> Orchestrator {
        let launcher = InProcessLauncher::new(Arc::new(UnlinkedSessionConnector)).unwrap();
        Orchestrator::new(
            settings(root),
            Arc::new(launcher),
            shutdown,
            Arc::new(HealthState::new()),
            None,
        )
    }

    #[test]
    fn test_page_url() {
        assert_eq!(
            page_url("127.0.0.1:8080".parse().unwrap()),
            "http://127.0.0.1:8080/"
        );
        assert_eq!(
            page_url("0.0.0.0:8080".parse().unwrap()),
            "http://127.0.0.1:8080/"
        );
    }

    #[tokio::test]
    async fn test_shutdown_before_start_skips_every_step() {
        let root = tempfile::tempdir().unwrap();
        let shutdown = ShutdownCoordinator::new();
        shutdown.request_shutdown(ShutdownReason::Signal);

        let mut orchestrator = orchestrator(root.path(), shutdown);
        let joined = orchestrator
            .start(SecretString::from("token"))
            .await
            .unwrap();

        assert!(joined.is_none());
        assert!(orchestrator.server_url().is_none());
        assert_eq!(orchestrator.close().await, 0);
    }

    #[tokio::test]
    async fn test_unlinked_session_library_fails_startup() {
        let root = tempfile::tempdir().unwrap();
        let shutdown = ShutdownCoordinator::new();

        let exit_code = orchestrator(root.path(), shutdown.clone())
            .run(SecretString::from("token"))
            .await;

        assert_eq!(exit_code, 1);
        assert!(matches!(
            shutdown.reason(),
            Some(ShutdownReason::StartupFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let mut orchestrator = orchestrator(root.path(), ShutdownCoordinator::new());

        assert_eq!(orchestrator.close().await, 0);
        assert_eq!(orchestrator.close().await, 0);
    }
}
