//! Pre-configured test data fixtures for Recording Bot testing.
//!
//! Provides builders for:
//! - Remote participants and the tracks they publish
//! - Media tracks backed by [`MockMediaTrack`]
//! - Capture profiles with short timeslices

use common::types::{ParticipantSid, TrackKind, TrackSid};
use recording_bot::hosted::{
    CaptureProfile, MediaStreamTrack, MediaTrack, RemoteParticipant, RemoteTrack,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Live media handle that carries nothing but an id.
#[derive(Debug, Clone)]
pub struct MockMediaTrack {
    id: String,
}

impl MockMediaTrack {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl MediaStreamTrack for MockMediaTrack {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Create a recordable track with the given sid and kind.
#[must_use]
pub fn media_track(sid: &str, kind: TrackKind) -> MediaTrack {
    MediaTrack::new(
        TrackSid::from(sid),
        kind,
        Arc::new(MockMediaTrack::new(format!("media-{sid}"))),
    )
}

/// Create a data track with the given sid.
#[must_use]
pub fn data_track(sid: &str) -> RemoteTrack {
    RemoteTrack::Data {
        sid: TrackSid::from(sid),
    }
}

/// Capture profile with the given timeslice.
#[must_use]
pub fn test_profile(timeslice_ms: u64) -> CaptureProfile {
    CaptureProfile::new(Duration::from_millis(timeslice_ms))
}

/// Test participant fixture.
#[derive(Debug, Clone)]
pub struct TestParticipant {
    /// Participant sid.
    pub sid: String,
    /// Published tracks, in publication order.
    pub tracks: Vec<RemoteTrack>,
}

impl TestParticipant {
    /// Create a participant with the given sid and no tracks.
    #[must_use]
    pub fn new(sid: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            tracks: Vec::new(),
        }
    }

    /// Create a participant with a random sid.
    #[must_use]
    pub fn random() -> Self {
        Self::new(format!("PA{}", Uuid::new_v4().simple()))
    }

    /// Publish an audio track.
    #[must_use]
    pub fn with_audio(mut self, track_sid: &str) -> Self {
        self.tracks
            .push(RemoteTrack::Media(media_track(track_sid, TrackKind::Audio)));
        self
    }

    /// Publish a video track.
    #[must_use]
    pub fn with_video(mut self, track_sid: &str) -> Self {
        self.tracks
            .push(RemoteTrack::Media(media_track(track_sid, TrackKind::Video)));
        self
    }

    /// Publish a data track.
    #[must_use]
    pub fn with_data(mut self, track_sid: &str) -> Self {
        self.tracks.push(data_track(track_sid));
        self
    }

    #[must_use]
    pub fn participant_sid(&self) -> ParticipantSid {
        ParticipantSid::from(self.sid.as_str())
    }

    /// A published track by sid.
    ///
    /// # Panics
    ///
    /// Panics if the participant does not publish `track_sid`.
    #[must_use]
    pub fn track(&self, track_sid: &str) -> RemoteTrack {
        self.tracks
            .iter()
            .find(|t| t.sid().as_str() == track_sid)
            .cloned()
            .unwrap_or_else(|| panic!("{} does not publish {track_sid}", self.sid))
    }

    /// Build the session library's view of this participant.
    #[must_use]
    pub fn build(&self) -> RemoteParticipant {
        RemoteParticipant {
            sid: self.participant_sid(),
            tracks: self.tracks.clone(),
        }
    }
}
