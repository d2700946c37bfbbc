//! `SessionAgent` - owns the joined session of one hosted page.
//!
//! The agent is the hosted side's main loop. It receives commands from the
//! hosting environment (load profile, expose bridge, join, finish) and
//! session events from the session library, and feeds both into a
//! [`ParticipantTracker`].
//!
//! When the session disconnects on its own the agent reports a
//! [`SessionEnd`] exactly once through the receiver returned by
//! [`SessionAgent::spawn`]. A host-initiated finish reports nothing.

use super::faults::SupervisedTask;
use super::messages::AgentCommand;
use super::profile::CaptureProfile;
use super::session::{ConnectOptions, Session, SessionConnector, SessionEvent};
use super::tracker::ParticipantTracker;
use super::{AgentError, JoinedSession, SessionEnd, SessionError};
use crate::bridge::BridgeClient;
use common::secret::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Mailbox size of the agent.
const AGENT_CHANNEL_BUFFER: usize = 16;

/// How long a finish waits for recording tasks before aborting them.
pub const RECORDING_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of a finish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FinishSummary {
    /// Recordings that were still running when the finish arrived.
    pub recordings_stopped: usize,
    /// Recording tasks that had to be aborted.
    pub tasks_aborted: usize,
}

/// Handle to a [`SessionAgent`].
#[derive(Debug, Clone)]
pub struct AgentHandle {
    sender: mpsc::Sender<AgentCommand>,
}

impl AgentHandle {
    /// Hand the capture profile from the bundle to the page.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Gone` if the agent has exited.
    pub async fn load_profile(&self, profile: CaptureProfile) -> Result<(), AgentError> {
        let (tx, rx) = oneshot::channel();
        self.send(AgentCommand::LoadProfile {
            profile,
            respond_to: tx,
        })
        .await?;
        rx.await.map_err(|_| AgentError::Gone)
    }

    /// Make the bridge callable from the page.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Gone` if the agent has exited.
    pub async fn expose_bridge(&self, bridge: BridgeClient) -> Result<(), AgentError> {
        let (tx, rx) = oneshot::channel();
        self.send(AgentCommand::ExposeBridge {
            bridge,
            respond_to: tx,
        })
        .await?;
        rx.await.map_err(|_| AgentError::Gone)
    }

    /// Join the session. Dropping the returned future abandons the join.
    ///
    /// # Errors
    ///
    /// Returns the session library's error, or `AgentError::Gone`.
    pub async fn join(
        &self,
        token: SecretString,
        session_name: Option<String>,
    ) -> Result<JoinedSession, AgentError> {
        let (tx, rx) = oneshot::channel();
        self.send(AgentCommand::Join {
            token,
            session_name,
            respond_to: tx,
        })
        .await?;
        rx.await
            .map_err(|_| AgentError::Gone)?
            .map_err(AgentError::from)
    }

    /// Stop recording, leave the session and stop the agent.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Gone` if the agent has already exited.
    pub async fn finish(&self) -> Result<FinishSummary, AgentError> {
        let (tx, rx) = oneshot::channel();
        self.send(AgentCommand::Finish { respond_to: tx }).await?;
        rx.await.map_err(|_| AgentError::Gone)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn send(&self, command: AgentCommand) -> Result<(), AgentError> {
        self.sender.send(command).await.map_err(|_| AgentError::Gone)
    }
}

enum Step {
    Cancelled,
    Command(Option<AgentCommand>),
    Event(Option<SessionEvent>),
}

/// The hosted side's main loop.
pub struct SessionAgent {
    connector: Arc<dyn SessionConnector>,
    receiver: mpsc::Receiver<AgentCommand>,
    cancel_token: CancellationToken,
    profile: Option<CaptureProfile>,
    bridge: Option<BridgeClient>,
    session: Option<Box<dyn Session>>,
    tracker: Option<ParticipantTracker>,
    detached_tasks: Vec<SupervisedTask>,
    session_end: Option<oneshot::Sender<SessionEnd>>,
}

impl SessionAgent {
    /// Spawn an agent.
    ///
    /// Returns the command handle, the receiver for the session end report
    /// and the agent task.
    pub fn spawn(
        connector: Arc<dyn SessionConnector>,
        cancel_token: CancellationToken,
    ) -> (AgentHandle, oneshot::Receiver<SessionEnd>, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(AGENT_CHANNEL_BUFFER);
        let (end_tx, end_rx) = oneshot::channel();

        let agent = Self {
            connector,
            receiver,
            cancel_token,
            profile: None,
            bridge: None,
            session: None,
            tracker: None,
            detached_tasks: Vec::new(),
            session_end: Some(end_tx),
        };
        let task = tokio::spawn(agent.run());

        (AgentHandle { sender }, end_rx, task)
    }

    #[instrument(skip_all, name = "rb.hosted.agent")]
    async fn run(mut self) {
        debug!(target: "rb.hosted.agent", "SessionAgent started");

        loop {
            let step = tokio::select! {
                () = self.cancel_token.cancelled() => Step::Cancelled,
                command = self.receiver.recv() => Step::Command(command),
                event = next_event(&mut self.session) => Step::Event(event),
            };

            match step {
                Step::Cancelled => {
                    debug!(target: "rb.hosted.agent", "SessionAgent cancelled");
                    self.finish().await;
                    break;
                }
                Step::Command(None) => {
                    debug!(target: "rb.hosted.agent", "SessionAgent channel closed");
                    self.finish().await;
                    break;
                }
                Step::Command(Some(command)) => {
                    if self.handle_command(command).await {
                        break;
                    }
                }
                Step::Event(Some(event)) => self.handle_event(event).await,
                Step::Event(None) => {
                    debug!(target: "rb.hosted.agent", "Session event stream ended");
                    self.session_disconnected(None).await;
                }
            }
        }

        debug!(target: "rb.hosted.agent", "SessionAgent stopped");
    }

    /// Handle one command. Returns true once the agent should exit.
    async fn handle_command(&mut self, command: AgentCommand) -> bool {
        match command {
            AgentCommand::LoadProfile {
                profile,
                respond_to,
            } => {
                debug!(
                    target: "rb.hosted.agent",
                    timeslice_ms = profile.timeslice_ms,
                    "Loaded capture profile"
                );
                self.profile = Some(profile);
                let _ = respond_to.send(());
            }
            AgentCommand::ExposeBridge { bridge, respond_to } => {
                self.bridge = Some(bridge);
                let _ = respond_to.send(());
            }
            AgentCommand::Join {
                token,
                session_name,
                respond_to,
            } => self.join(&token, session_name, respond_to).await,
            AgentCommand::Finish { respond_to } => {
                let _ = respond_to.send(self.finish().await);
                return true;
            }
        }
        false
    }

    async fn join(
        &mut self,
        token: &SecretString,
        session_name: Option<String>,
        mut respond_to: oneshot::Sender<Result<JoinedSession, SessionError>>,
    ) {
        let (Some(bridge), Some(profile)) = (self.bridge.clone(), self.profile.clone()) else {
            let _ = respond_to.send(Err(SessionError::NotReady(
                "bundle and bridge must be loaded before joining".to_string(),
            )));
            return;
        };
        if self.session.is_some() || self.tracker.is_some() {
            let _ = respond_to.send(Err(SessionError::NotReady("already joined".to_string())));
            return;
        }

        bridge.debug("Connecting to Room...").await;

        let connector = Arc::clone(&self.connector);
        let options = ConnectOptions { name: session_name };
        let result = tokio::select! {
            result = connector.connect(token.expose_secret(), options) => result,
            () = respond_to.closed() => {
                info!(target: "rb.hosted.agent", "Join abandoned by host");
                return;
            }
        };

        let mut session = match result {
            Ok(session) => session,
            Err(e) => {
                warn!(target: "rb.hosted.agent", error = %e, "Failed to connect");
                let _ = respond_to.send(Err(e));
                return;
            }
        };

        let joined = JoinedSession {
            session_sid: session.sid(),
            local_participant_sid: session.local_participant_sid(),
        };
        bridge
            .info(format!(
                "Connected to Room {} as LocalParticipant {}.",
                joined.session_sid, joined.local_participant_sid
            ))
            .await;

        if respond_to.is_closed() {
            bridge.debug("Disconnecting from Room...").await;
            session.disconnect().await;
            return;
        }

        let mut tracker =
            ParticipantTracker::new(&joined, bridge, self.connector.encoders(), profile);
        tracker.attach(&session.participants()).await;

        self.session = Some(session);
        self.tracker = Some(tracker);
        let _ = respond_to.send(Ok(joined));
    }

    async fn handle_event(&mut self, event: SessionEvent) {
        let Some(tracker) = self.tracker.as_mut() else {
            debug!(target: "rb.hosted.agent", event = ?event, "Event without tracker, ignoring");
            return;
        };

        match event {
            SessionEvent::ParticipantConnected(participant) => {
                if let Some(bridge) = &self.bridge {
                    bridge
                        .info(format!("RemoteParticipant {participant} connected."))
                        .await;
                }
            }
            SessionEvent::ParticipantDisconnected(participant) => {
                if let Some(bridge) = &self.bridge {
                    bridge
                        .info(format!("RemoteParticipant {participant} disconnected."))
                        .await;
                }
                tracker.participant_disconnected(&participant).await;
            }
            SessionEvent::TrackSubscribed { participant, track } => {
                tracker.track_subscribed(&participant, &track).await;
            }
            SessionEvent::TrackUnsubscribed { participant, track } => {
                tracker.track_unsubscribed(&participant, &track).await;
            }
            SessionEvent::Disconnected { error } => self.session_disconnected(error).await,
        }
    }

    async fn session_disconnected(&mut self, error: Option<String>) {
        if let Some(bridge) = &self.bridge {
            bridge.info("Disconnected from Room.").await;
        }
        if let Some(mut tracker) = self.tracker.take() {
            let tasks = tracker.stop_all().await;
            self.detached_tasks.extend(tasks);
        }
        self.session = None;

        if let Some(session_end) = self.session_end.take() {
            let _ = session_end.send(SessionEnd { error });
        }
    }

    /// Stop recordings, leave the session and wait for recording tasks.
    async fn finish(&mut self) -> FinishSummary {
        let mut tasks = std::mem::take(&mut self.detached_tasks);
        let mut summary = FinishSummary::default();

        if let Some(mut tracker) = self.tracker.take() {
            let stopped = tracker.stop_all().await;
            summary.recordings_stopped = stopped.len();
            tasks.extend(stopped);
        }

        if let Some(mut session) = self.session.take() {
            if session.is_connected() {
                if let Some(bridge) = &self.bridge {
                    bridge.debug("Disconnecting from Room...").await;
                }
                session.disconnect().await;
            }
        }

        let deadline = Instant::now() + RECORDING_DRAIN_TIMEOUT;
        for task in tasks {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !task.join(remaining).await {
                summary.tasks_aborted += 1;
            }
        }

        debug!(
            target: "rb.hosted.agent",
            recordings_stopped = summary.recordings_stopped,
            tasks_aborted = summary.tasks_aborted,
            "Finished"
        );
        summary
    }
}

async fn next_event(session: &mut Option<Box<dyn Session>>) -> Option<SessionEvent> {
    match session {
        Some(session) => session.next_event().await,
        None => std::future::pending().await,
    }
}
