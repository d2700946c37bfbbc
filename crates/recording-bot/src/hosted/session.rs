//! Interface of the real-time session library.
//!
//! The library is an external collaborator: the recorder only needs to
//! connect with a token, list the participants already present, and receive
//! subscription and disconnect events.

use super::media::{EncoderFactory, MediaTrack, UnlinkedEncoderFactory};
use super::SessionError;
use async_trait::async_trait;
use common::types::{ParticipantSid, SessionSid, TrackSid};
use std::sync::Arc;

/// A track published by a remote participant.
#[derive(Debug, Clone)]
pub enum RemoteTrack {
    /// Audio or video; recordable.
    Media(MediaTrack),
    /// Data channel; never recorded.
    Data { sid: TrackSid },
}

impl RemoteTrack {
    #[must_use]
    pub fn sid(&self) -> &TrackSid {
        match self {
            RemoteTrack::Media(track) => &track.sid,
            RemoteTrack::Data { sid } => sid,
        }
    }

    /// The media track, or `None` for a data track.
    #[must_use]
    pub fn as_media(&self) -> Option<&MediaTrack> {
        match self {
            RemoteTrack::Media(track) => Some(track),
            RemoteTrack::Data { .. } => None,
        }
    }
}

/// A remote participant and the tracks it currently publishes.
#[derive(Debug, Clone)]
pub struct RemoteParticipant {
    pub sid: ParticipantSid,
    pub tracks: Vec<RemoteTrack>,
}

impl RemoteParticipant {
    /// Recordable tracks of this participant.
    pub fn media_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter_map(RemoteTrack::as_media)
    }
}

/// Events emitted by a joined session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    ParticipantConnected(ParticipantSid),
    ParticipantDisconnected(ParticipantSid),
    TrackSubscribed {
        participant: ParticipantSid,
        track: RemoteTrack,
    },
    TrackUnsubscribed {
        participant: ParticipantSid,
        track: RemoteTrack,
    },
    /// The session is over. Emitted at most once.
    Disconnected { error: Option<String> },
}

/// Options for [`SessionConnector::connect`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Session (room) name. `None` joins whatever the token allows.
    pub name: Option<String>,
}

/// Entry point of the session library.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Join a session without publishing any local tracks.
    async fn connect(
        &self,
        token: &str,
        options: ConnectOptions,
    ) -> Result<Box<dyn Session>, SessionError>;

    /// Encoder factory used for tracks received from this library.
    fn encoders(&self) -> Arc<dyn EncoderFactory>;
}

/// A joined session.
#[async_trait]
pub trait Session: Send {
    fn sid(&self) -> SessionSid;

    fn local_participant_sid(&self) -> ParticipantSid;

    /// Remote participants present right now.
    fn participants(&self) -> Vec<RemoteParticipant>;

    /// Next event, or `None` once the event stream has ended.
    ///
    /// Must be cancel-safe: dropping the future loses no event.
    async fn next_event(&mut self) -> Option<SessionEvent>;

    fn is_connected(&self) -> bool;

    /// Leave the session. Idempotent.
    async fn disconnect(&mut self);
}

/// Connector used when no session library is linked in.
///
/// Every connect attempt fails, which makes the recorder exit with status 1
/// after a clean teardown.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnlinkedSessionConnector;

#[async_trait]
impl SessionConnector for UnlinkedSessionConnector {
    async fn connect(
        &self,
        _token: &str,
        _options: ConnectOptions,
    ) -> Result<Box<dyn Session>, SessionError> {
        Err(SessionError::Unavailable(
            "no real-time session library is linked into this build".to_string(),
        ))
    }

    fn encoders(&self) -> Arc<dyn EncoderFactory> {
        Arc::new(UnlinkedEncoderFactory)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::hosted::media::MediaStreamTrack;
    use common::types::TrackKind;

    #[derive(Debug)]
    struct FakeTrack;

    impl MediaStreamTrack for FakeTrack {
        fn id(&self) -> &str {
            "fake"
        }
    }

    #[test]
    fn test_media_tracks_skip_data_tracks() {
        let participant = RemoteParticipant {
            sid: ParticipantSid::from("PA1"),
            tracks: vec![
                RemoteTrack::Media(MediaTrack::new(
                    TrackSid::from("MT1"),
                    TrackKind::Audio,
                    Arc::new(FakeTrack),
                )),
                RemoteTrack::Data {
                    sid: TrackSid::from("DT1"),
                },
            ],
        };

        let sids: Vec<&str> = participant.media_tracks().map(|t| t.sid.as_str()).collect();
        assert_eq!(sids, vec!["MT1"]);
        assert_eq!(participant.tracks.get(1).unwrap().sid().as_str(), "DT1");
    }

    #[tokio::test]
    async fn test_unlinked_connector_fails() {
        let result = UnlinkedSessionConnector
            .connect("token", ConnectOptions::default())
            .await;

        assert!(matches!(result, Err(SessionError::Unavailable(_))));
    }
}
