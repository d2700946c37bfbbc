//! Mock real-time session library.
//!
//! [`MockSessionConnector`] joins a scripted session; the paired
//! [`MockSessionController`] lets the test emit events into it and inspect
//! what the recorder did.
//!
//! # Example
//!
//! ```rust,ignore
//! use rb_test_utils::{MockSessionConnector, TestParticipant};
//!
//! let alice = TestParticipant::new("PA1").with_audio("MT1");
//! let connector = MockSessionConnector::builder()
//!     .session_sid("RM1")
//!     .local_participant_sid("PA0")
//!     .with_participant(alice.build())
//!     .gated()
//!     .build();
//! let controller = connector.controller();
//!
//! // The recorder is now blocked in connect until:
//! controller.release_connect();
//! controller.subscribe("PA1", alice.track("MT1"));
//! controller.disconnect(None);
//! ```

use crate::mock_encoder::MockEncoderFactory;
use async_trait::async_trait;
use common::types::{ParticipantSid, SessionSid};
use recording_bot::hosted::{
    ConnectOptions, EncoderFactory, RemoteParticipant, RemoteTrack, Session, SessionConnector,
    SessionError, SessionEvent,
};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};

/// How [`MockSessionConnector::connect`] behaves.
#[derive(Debug, Clone)]
pub enum ConnectMode {
    /// Connect right away.
    Immediate,
    /// Fail with the given error.
    Fail(SessionError),
    /// Block until [`MockSessionController::release_connect`].
    Gated,
}

/// What the controller pushes into the session.
#[derive(Debug)]
enum Scripted {
    Event(SessionEvent),
    /// Panic inside `next_event`, as a misbehaving library would.
    Crash(String),
}

#[derive(Debug)]
struct State {
    participants: Vec<RemoteParticipant>,
    connect_calls: Vec<(String, ConnectOptions)>,
    events: Option<mpsc::UnboundedReceiver<Scripted>>,
    connected: bool,
    disconnect_calls: usize,
}

#[derive(Debug)]
struct Shared {
    session_sid: SessionSid,
    local_participant_sid: ParticipantSid,
    mode: ConnectMode,
    encoders: MockEncoderFactory,
    gate: Notify,
    events: mpsc::UnboundedSender<Scripted>,
    state: Mutex<State>,
}

/// Scripted session library.
#[derive(Debug, Clone)]
pub struct MockSessionConnector {
    shared: Arc<Shared>,
}

impl MockSessionConnector {
    /// Create a new MockSessionConnector builder.
    #[must_use]
    pub fn builder() -> MockSessionConnectorBuilder {
        MockSessionConnectorBuilder::default()
    }

    /// Controller for the session this connector joins.
    #[must_use]
    pub fn controller(&self) -> MockSessionController {
        MockSessionController {
            shared: Arc::clone(&self.shared),
        }
    }
}

#[async_trait]
impl SessionConnector for MockSessionConnector {
    async fn connect(
        &self,
        token: &str,
        options: ConnectOptions,
    ) -> Result<Box<dyn Session>, SessionError> {
        self.shared
            .state
            .lock()
            .unwrap()
            .connect_calls
            .push((token.to_string(), options));

        match &self.shared.mode {
            ConnectMode::Immediate => {}
            ConnectMode::Fail(e) => return Err(e.clone()),
            ConnectMode::Gated => self.shared.gate.notified().await,
        }

        let mut state = self.shared.state.lock().unwrap();
        let events = state
            .events
            .take()
            .ok_or_else(|| SessionError::Connect("mock session already joined".to_string()))?;
        state.connected = true;

        Ok(Box::new(MockSession {
            shared: Arc::clone(&self.shared),
            participants: state.participants.clone(),
            events,
        }))
    }

    fn encoders(&self) -> Arc<dyn EncoderFactory> {
        Arc::new(self.shared.encoders.clone())
    }
}

struct MockSession {
    shared: Arc<Shared>,
    participants: Vec<RemoteParticipant>,
    events: mpsc::UnboundedReceiver<Scripted>,
}

#[async_trait]
impl Session for MockSession {
    fn sid(&self) -> SessionSid {
        self.shared.session_sid.clone()
    }

    fn local_participant_sid(&self) -> ParticipantSid {
        self.shared.local_participant_sid.clone()
    }

    fn participants(&self) -> Vec<RemoteParticipant> {
        self.participants.clone()
    }

    async fn next_event(&mut self) -> Option<SessionEvent> {
        let event = match self.events.recv().await {
            Some(Scripted::Event(event)) => Some(event),
            Some(Scripted::Crash(message)) => panic!("{message}"),
            None => None,
        };
        if matches!(event, Some(SessionEvent::Disconnected { .. }) | None) {
            self.shared.state.lock().unwrap().connected = false;
        }
        event
    }

    fn is_connected(&self) -> bool {
        self.shared.state.lock().unwrap().connected
    }

    async fn disconnect(&mut self) {
        let mut state = self.shared.state.lock().unwrap();
        state.connected = false;
        state.disconnect_calls += 1;
    }
}

/// Drives and inspects a mock session.
#[derive(Debug, Clone)]
pub struct MockSessionController {
    shared: Arc<Shared>,
}

impl MockSessionController {
    /// Let a gated connect complete.
    pub fn release_connect(&self) {
        self.shared.gate.notify_one();
    }

    /// Emit a raw event.
    pub fn emit(&self, event: SessionEvent) {
        let _ = self.shared.events.send(Scripted::Event(event));
    }

    /// Make the session library panic while delivering its next event.
    pub fn crash(&self, message: &str) {
        let _ = self.shared.events.send(Scripted::Crash(message.to_string()));
    }

    pub fn participant_connected(&self, participant: &str) {
        self.emit(SessionEvent::ParticipantConnected(ParticipantSid::from(
            participant,
        )));
    }

    pub fn participant_disconnected(&self, participant: &str) {
        self.emit(SessionEvent::ParticipantDisconnected(ParticipantSid::from(
            participant,
        )));
    }

    pub fn subscribe(&self, participant: &str, track: RemoteTrack) {
        self.emit(SessionEvent::TrackSubscribed {
            participant: ParticipantSid::from(participant),
            track,
        });
    }

    pub fn unsubscribe(&self, participant: &str, track: RemoteTrack) {
        self.emit(SessionEvent::TrackUnsubscribed {
            participant: ParticipantSid::from(participant),
            track,
        });
    }

    /// End the session from the library side.
    pub fn disconnect(&self, error: Option<&str>) {
        self.emit(SessionEvent::Disconnected {
            error: error.map(ToString::to_string),
        });
    }

    /// Tokens and options of every connect attempt.
    #[must_use]
    pub fn connect_calls(&self) -> Vec<(String, ConnectOptions)> {
        self.shared.state.lock().unwrap().connect_calls.clone()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.state.lock().unwrap().connected
    }

    /// Number of times the recorder called `disconnect`.
    #[must_use]
    pub fn disconnect_calls(&self) -> usize {
        self.shared.state.lock().unwrap().disconnect_calls
    }
}

/// Builder for MockSessionConnector configuration.
#[derive(Debug)]
pub struct MockSessionConnectorBuilder {
    session_sid: String,
    local_participant_sid: String,
    participants: Vec<RemoteParticipant>,
    mode: ConnectMode,
    encoders: MockEncoderFactory,
}

impl Default for MockSessionConnectorBuilder {
    fn default() -> Self {
        Self {
            session_sid: "RM00000000000000000000000000000001".to_string(),
            local_participant_sid: "PA00000000000000000000000000000000".to_string(),
            participants: Vec::new(),
            mode: ConnectMode::Immediate,
            encoders: MockEncoderFactory::new(),
        }
    }
}

impl MockSessionConnectorBuilder {
    #[must_use]
    pub fn session_sid(mut self, sid: &str) -> Self {
        self.session_sid = sid.to_string();
        self
    }

    #[must_use]
    pub fn local_participant_sid(mut self, sid: &str) -> Self {
        self.local_participant_sid = sid.to_string();
        self
    }

    /// Add a participant already present when the recorder joins.
    #[must_use]
    pub fn with_participant(mut self, participant: RemoteParticipant) -> Self {
        self.participants.push(participant);
        self
    }

    /// Fail every connect with `error`.
    #[must_use]
    pub fn fail_connect(mut self, error: SessionError) -> Self {
        self.mode = ConnectMode::Fail(error);
        self
    }

    /// Block connect until released by the controller.
    #[must_use]
    pub fn gated(mut self) -> Self {
        self.mode = ConnectMode::Gated;
        self
    }

    #[must_use]
    pub fn encoders(mut self, encoders: MockEncoderFactory) -> Self {
        self.encoders = encoders;
        self
    }

    /// Build the MockSessionConnector.
    #[must_use]
    pub fn build(self) -> MockSessionConnector {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        MockSessionConnector {
            shared: Arc::new(Shared {
                session_sid: SessionSid::from(self.session_sid),
                local_participant_sid: ParticipantSid::from(self.local_participant_sid),
                mode: self.mode,
                encoders: self.encoders,
                gate: Notify::new(),
                events: events_tx,
                state: Mutex::new(State {
                    participants: self.participants,
                    connect_calls: Vec::new(),
                    events: Some(events_rx),
                    connected: false,
                    disconnect_calls: 0,
                }),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestParticipant;

    #[tokio::test]
    async fn test_connect_delivers_participants_and_events() {
        let alice = TestParticipant::new("PA1").with_audio("MT1");
        let connector = MockSessionConnector::builder()
            .session_sid("RM1")
            .local_participant_sid("PA0")
            .with_participant(alice.build())
            .build();
        let controller = connector.controller();

        let mut session = connector
            .connect("token", ConnectOptions { name: Some("room".to_string()) })
            .await
            .unwrap();
        assert_eq!(session.sid().as_str(), "RM1");
        assert_eq!(session.local_participant_sid().as_str(), "PA0");
        assert_eq!(session.participants().len(), 1);
        assert!(controller.is_connected());

        controller.subscribe("PA1", alice.track("MT1"));
        controller.disconnect(Some("kicked"));

        assert!(matches!(
            session.next_event().await,
            Some(SessionEvent::TrackSubscribed { .. })
        ));
        assert!(matches!(
            session.next_event().await,
            Some(SessionEvent::Disconnected { error: Some(_) })
        ));
        assert!(!controller.is_connected());

        let calls = controller.connect_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "token");
        assert_eq!(calls[0].1.name.as_deref(), Some("room"));
    }

    #[tokio::test]
    async fn test_fail_connect() {
        let connector = MockSessionConnector::builder()
            .fail_connect(SessionError::Connect("denied".to_string()))
            .build();

        let result = connector.connect("token", ConnectOptions::default()).await;
        assert!(matches!(result, Err(SessionError::Connect(_))));
    }

    #[tokio::test]
    async fn test_gated_connect_waits_for_release() {
        let connector = MockSessionConnector::builder().gated().build();
        let controller = connector.controller();

        let pending = tokio::spawn({
            let connector = connector.clone();
            async move {
                connector
                    .connect("token", ConnectOptions::default())
                    .await
                    .is_ok()
            }
        });
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        controller.release_connect();
        assert!(pending.await.unwrap());
    }

    #[tokio::test]
    async fn test_second_connect_fails() {
        let connector = MockSessionConnector::builder().build();

        let mut first = connector
            .connect("token", ConnectOptions::default())
            .await
            .unwrap();
        first.disconnect().await;
        assert_eq!(connector.controller().disconnect_calls(), 1);

        let second = connector.connect("token", ConnectOptions::default()).await;
        assert!(matches!(second, Err(SessionError::Connect(_))));
    }

    #[tokio::test]
    #[should_panic(expected = "decoder exploded")]
    async fn test_crash_panics_in_next_event() {
        let connector = MockSessionConnector::builder().build();
        let mut session = connector
            .connect("token", ConnectOptions::default())
            .await
            .unwrap();

        connector.controller().crash("decoder exploded");
        session.next_event().await;
    }
}
