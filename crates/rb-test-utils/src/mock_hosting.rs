//! Mock hosting environment.
//!
//! Records every call the orchestrator makes, in order, so tests can check
//! startup ordering and that teardown runs once. Steps can be made to fail
//! and the join can be held open to simulate a stalled session library.
//!
//! # Example
//!
//! ```rust,ignore
//! use rb_test_utils::MockHostingLauncher;
//!
//! let launcher = MockHostingLauncher::builder().hang_join().build();
//! let hosting = launcher.controller();
//!
//! // ... run the orchestrator with `launcher`, signal shutdown ...
//! assert_eq!(hosting.count("finish"), 1);
//! ```

use async_trait::async_trait;
use common::secret::SecretString;
use common::types::{ParticipantSid, SessionSid};
use recording_bot::bridge::BridgeClient;
use recording_bot::hosted::{FinishSummary, JoinedSession, SessionEnd};
use recording_bot::hosting::{HostedPage, HostingEnvironment, HostingError, HostingLauncher};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Calls recorded by the mock, by name.
pub const HOSTING_CALLS: [&str; 7] = [
    "launch",
    "open_page",
    "navigate",
    "expose_bridge",
    "join",
    "finish",
    "close",
];

#[derive(Debug)]
struct State {
    calls: Vec<String>,
    navigated_to: Option<String>,
    bridge: Option<BridgeClient>,
    session_end: Option<mpsc::UnboundedReceiver<SessionEnd>>,
}

#[derive(Debug)]
struct Shared {
    fail_at: Option<&'static str>,
    hang_join: bool,
    joined: JoinedSession,
    session_end: mpsc::UnboundedSender<SessionEnd>,
    state: Mutex<State>,
}

impl Shared {
    fn record(&self, call: &'static str) -> Result<(), HostingError> {
        self.state.lock().unwrap().calls.push(call.to_string());
        if self.fail_at == Some(call) {
            return Err(HostingError::Launch(format!("mock failure at {call}")));
        }
        Ok(())
    }
}

/// Hosting environment that records the calls it receives.
#[derive(Debug, Clone)]
pub struct MockHostingLauncher {
    shared: Arc<Shared>,
}

impl MockHostingLauncher {
    /// Create a new MockHostingLauncher builder.
    #[must_use]
    pub fn builder() -> MockHostingLauncherBuilder {
        MockHostingLauncherBuilder::default()
    }

    #[must_use]
    pub fn controller(&self) -> MockHostingController {
        MockHostingController {
            shared: Arc::clone(&self.shared),
        }
    }
}

#[async_trait]
impl HostingLauncher for MockHostingLauncher {
    async fn launch(&self) -> Result<Box<dyn HostingEnvironment>, HostingError> {
        self.shared.record("launch")?;
        Ok(Box::new(MockEnvironment {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct MockEnvironment {
    shared: Arc<Shared>,
}

#[async_trait]
impl HostingEnvironment for MockEnvironment {
    async fn open_page(&mut self) -> Result<Box<dyn HostedPage>, HostingError> {
        self.shared.record("open_page")?;
        let session_end = self.shared.state.lock().unwrap().session_end.take();
        Ok(Box::new(MockPage {
            shared: Arc::clone(&self.shared),
            session_end,
        }))
    }

    async fn close(&mut self) -> Result<(), HostingError> {
        self.shared.record("close")
    }
}

struct MockPage {
    shared: Arc<Shared>,
    session_end: Option<mpsc::UnboundedReceiver<SessionEnd>>,
}

#[async_trait]
impl HostedPage for MockPage {
    async fn navigate(&mut self, url: &str) -> Result<(), HostingError> {
        self.shared.state.lock().unwrap().navigated_to = Some(url.to_string());
        self.shared.record("navigate")
    }

    async fn expose_bridge(&mut self, bridge: BridgeClient) -> Result<(), HostingError> {
        self.shared.state.lock().unwrap().bridge = Some(bridge);
        self.shared.record("expose_bridge")
    }

    async fn join(
        &mut self,
        _token: SecretString,
        _session_name: Option<String>,
    ) -> Result<JoinedSession, HostingError> {
        self.shared.record("join")?;
        if self.shared.hang_join {
            std::future::pending::<()>().await;
        }
        Ok(self.shared.joined.clone())
    }

    async fn session_ended(&mut self) -> SessionEnd {
        if let Some(receiver) = self.session_end.as_mut() {
            if let Some(end) = receiver.recv().await {
                self.session_end = None;
                return end;
            }
        }
        std::future::pending().await
    }

    async fn finish(&mut self) -> Result<FinishSummary, HostingError> {
        self.shared.record("finish")?;
        Ok(FinishSummary::default())
    }
}

/// Drives and inspects a mock hosting environment.
#[derive(Debug, Clone)]
pub struct MockHostingController {
    shared: Arc<Shared>,
}

impl MockHostingController {
    /// Report that the session ended on its own.
    pub fn end_session(&self, error: Option<&str>) {
        let _ = self.shared.session_end.send(SessionEnd {
            error: error.map(ToString::to_string),
        });
    }

    /// Every call received, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.shared.state.lock().unwrap().calls.clone()
    }

    /// How often `call` was received.
    #[must_use]
    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    /// URL the page was navigated to.
    #[must_use]
    pub fn navigated_to(&self) -> Option<String> {
        self.shared.state.lock().unwrap().navigated_to.clone()
    }

    /// Bridge exposed to the page.
    #[must_use]
    pub fn bridge(&self) -> Option<BridgeClient> {
        self.shared.state.lock().unwrap().bridge.clone()
    }
}

/// Builder for MockHostingLauncher configuration.
#[derive(Debug, Default)]
pub struct MockHostingLauncherBuilder {
    fail_at: Option<&'static str>,
    hang_join: bool,
}

impl MockHostingLauncherBuilder {
    /// Fail the named call (one of [`HOSTING_CALLS`]).
    #[must_use]
    pub fn fail_at(mut self, call: &'static str) -> Self {
        assert!(HOSTING_CALLS.contains(&call), "unknown hosting call {call}");
        self.fail_at = Some(call);
        self
    }

    /// Never complete the join.
    #[must_use]
    pub fn hang_join(mut self) -> Self {
        self.hang_join = true;
        self
    }

    /// Build the MockHostingLauncher.
    #[must_use]
    pub fn build(self) -> MockHostingLauncher {
        let (end_tx, end_rx) = mpsc::unbounded_channel();
        MockHostingLauncher {
            shared: Arc::new(Shared {
                fail_at: self.fail_at,
                hang_join: self.hang_join,
                joined: JoinedSession {
                    session_sid: SessionSid::from("RM1"),
                    local_participant_sid: ParticipantSid::from("PA0"),
                },
                session_end: end_tx,
                state: Mutex::new(State {
                    calls: Vec::new(),
                    navigated_to: None,
                    bridge: None,
                    session_end: Some(end_rx),
                }),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_calls_are_recorded_in_order() {
        let launcher = MockHostingLauncher::builder().build();
        let hosting = launcher.controller();

        let mut environment = launcher.launch().await.unwrap();
        let mut page = environment.open_page().await.unwrap();
        page.navigate("http://127.0.0.1:1/").await.unwrap();
        let joined = page.join(SecretString::from("token"), None).await.unwrap();
        page.finish().await.unwrap();
        environment.close().await.unwrap();

        assert_eq!(joined.session_sid.as_str(), "RM1");
        assert_eq!(
            hosting.calls(),
            vec!["launch", "open_page", "navigate", "join", "finish", "close"]
        );
        assert_eq!(hosting.navigated_to().as_deref(), Some("http://127.0.0.1:1/"));
    }

    #[tokio::test]
    async fn test_fail_at_step() {
        let launcher = MockHostingLauncher::builder().fail_at("open_page").build();

        let mut environment = launcher.launch().await.unwrap();
        assert!(environment.open_page().await.is_err());
        assert_eq!(launcher.controller().count("open_page"), 1);
    }

    #[tokio::test]
    async fn test_session_end_is_delivered_once() {
        let launcher = MockHostingLauncher::builder().build();
        let hosting = launcher.controller();
        let mut page = launcher.launch().await.unwrap().open_page().await.unwrap();

        hosting.end_session(Some("lost"));
        let end = page.session_ended().await;
        assert_eq!(end.error.as_deref(), Some("lost"));

        hosting.end_session(None);
        let again = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            page.session_ended(),
        )
        .await;
        assert!(again.is_err());
    }
}
