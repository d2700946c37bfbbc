//! In-process hosting environment.
//!
//! Each page is a [`SessionAgent`] task. Navigating a page fetches the
//! bootstrap page and the capture bundle from the serving surface over HTTP,
//! exactly as a browser page would.
//!
//! Page tasks are supervised: a panic in the agent is logged under the
//! `rb.hosted` target and ends the page's session with the fault as its
//! error.

use super::{HostedPage, HostingEnvironment, HostingError, HostingLauncher};
use crate::bridge::BridgeClient;
use crate::hosted::faults::panic_message;
use crate::hosted::{
    AgentHandle, CaptureProfile, FinishSummary, JoinedSession, SessionAgent, SessionConnector,
    SessionEnd,
};
use async_trait::async_trait;
use common::secret::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// How long closing the environment waits for page tasks before aborting.
const PAGE_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Launches in-process hosting environments.
pub struct InProcessLauncher {
    connector: Arc<dyn SessionConnector>,
    http: reqwest::Client,
}

impl InProcessLauncher {
    /// # Errors
    ///
    /// Returns `HostingError::Launch` if the HTTP client cannot be built.
    pub fn new(connector: Arc<dyn SessionConnector>) -> Result<Self, HostingError> {
        // Idle keep-alive connections would hold the server's graceful
        // shutdown open.
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| HostingError::Launch(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { connector, http })
    }
}

#[async_trait]
impl HostingLauncher for InProcessLauncher {
    async fn launch(&self) -> Result<Box<dyn HostingEnvironment>, HostingError> {
        Ok(Box::new(InProcessEnvironment {
            connector: Arc::clone(&self.connector),
            http: self.http.clone(),
            cancel_token: CancellationToken::new(),
            pages: Vec::new(),
            closed: false,
        }))
    }
}

struct InProcessEnvironment {
    connector: Arc<dyn SessionConnector>,
    http: reqwest::Client,
    cancel_token: CancellationToken,
    pages: Vec<PageTask>,
    closed: bool,
}

/// An agent task and the supervisor watching it.
struct PageTask {
    supervisor: JoinHandle<()>,
    agent: AbortHandle,
}

impl PageTask {
    /// Watch `task`; a panic is logged and sent on `fault`.
    fn supervise(task: JoinHandle<()>, fault: oneshot::Sender<String>) -> Self {
        let agent = task.abort_handle();
        let supervisor = tokio::spawn(async move {
            match task.await {
                Err(e) if e.is_panic() => {
                    let message = panic_message(e.into_panic());
                    error!(target: "rb.hosted", "\n\nFault in session agent:\n  {message}\n");
                    let _ = fault.send(message);
                }
                Ok(()) | Err(_) => {}
            }
        });
        Self { supervisor, agent }
    }
}

#[async_trait]
impl HostingEnvironment for InProcessEnvironment {
    async fn open_page(&mut self) -> Result<Box<dyn HostedPage>, HostingError> {
        if self.closed {
            return Err(HostingError::Closed);
        }

        let (agent, session_end, task) =
            SessionAgent::spawn(Arc::clone(&self.connector), self.cancel_token.child_token());
        let (fault_tx, fault_rx) = oneshot::channel();
        self.pages.push(PageTask::supervise(task, fault_tx));

        Ok(Box::new(InProcessPage {
            agent,
            session_end: Some(session_end),
            fault: Some(fault_rx),
            http: self.http.clone(),
        }))
    }

    async fn close(&mut self) -> Result<(), HostingError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.cancel_token.cancel();

        for page in self.pages.drain(..) {
            let supervisor = page.supervisor.abort_handle();
            match tokio::time::timeout(PAGE_CLOSE_TIMEOUT, page.supervisor).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(target: "rb.orchestrator", error = %e, "Page supervisor failed");
                }
                Err(_) => {
                    warn!(target: "rb.orchestrator", "Page did not close in time, aborting");
                    page.agent.abort();
                    supervisor.abort();
                }
            }
        }
        Ok(())
    }
}

struct InProcessPage {
    agent: AgentHandle,
    session_end: Option<oneshot::Receiver<SessionEnd>>,
    fault: Option<oneshot::Receiver<String>>,
    http: reqwest::Client,
}

impl InProcessPage {
    async fn get(&self, url: &str) -> Result<reqwest::Response, String> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| format!("GET {url}: {e}"))?;
        if !response.status().is_success() {
            return Err(format!("GET {url}: status {}", response.status()));
        }
        Ok(response)
    }
}

#[async_trait]
impl HostedPage for InProcessPage {
    async fn navigate(&mut self, url: &str) -> Result<(), HostingError> {
        let page = self
            .get(url)
            .await
            .map_err(HostingError::Navigation)?
            .text()
            .await
            .map_err(|e| HostingError::Navigation(e.to_string()))?;
        debug!(target: "rb.orchestrator", url, bytes = page.len(), "Loaded bootstrap page");

        let bundle_url = format!("{}/bundle.json", url.trim_end_matches('/'));
        let profile: CaptureProfile = self
            .get(&bundle_url)
            .await
            .map_err(HostingError::Bundle)?
            .json()
            .await
            .map_err(|e| HostingError::Bundle(e.to_string()))?;

        self.agent.load_profile(profile).await?;
        Ok(())
    }

    async fn expose_bridge(&mut self, bridge: BridgeClient) -> Result<(), HostingError> {
        Ok(self.agent.expose_bridge(bridge).await?)
    }

    async fn join(
        &mut self,
        token: SecretString,
        session_name: Option<String>,
    ) -> Result<JoinedSession, HostingError> {
        Ok(self.agent.join(token, session_name).await?)
    }

    async fn session_ended(&mut self) -> SessionEnd {
        if let Some(receiver) = self.session_end.as_mut() {
            let result = receiver.await;
            self.session_end = None;
            if let Ok(end) = result {
                return end;
            }
        }
        // The agent exited without a report; only a crash ends the session.
        if let Some(fault) = self.fault.as_mut() {
            let result = fault.await;
            self.fault = None;
            if let Ok(message) = result {
                return SessionEnd {
                    error: Some(format!("Session agent crashed: {message}")),
                };
            }
        }
        std::future::pending().await
    }

    async fn finish(&mut self) -> Result<FinishSummary, HostingError> {
        Ok(self.agent.finish().await?)
    }
}
