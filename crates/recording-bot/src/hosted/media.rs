//! Interface of the media encoder.
//!
//! An encoder turns a live stream into container bytes. The capture pipeline
//! drains whatever the encoder has produced once per timeslice.

use super::CaptureError;
use bytes::Bytes;
use common::types::{TrackKind, TrackSid};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Live media handle owned by the session library.
pub trait MediaStreamTrack: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;
}

/// A recordable remote track.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    pub sid: TrackSid,
    pub kind: TrackKind,
    pub media: Arc<dyn MediaStreamTrack>,
}

impl MediaTrack {
    #[must_use]
    pub fn new(sid: TrackSid, kind: TrackKind, media: Arc<dyn MediaStreamTrack>) -> Self {
        Self { sid, kind, media }
    }
}

/// Sample rate of the synthetic silent audio track.
pub const SILENT_AUDIO_SAMPLE_RATE: u32 = 48_000;

/// Audio track fed by an oscillator held at 0 Hz.
///
/// Some encoders refuse to produce a video-only container; pairing the video
/// with this track makes them emit data without adding audible content.
#[derive(Debug, Clone, PartialEq)]
pub struct SilentAudioTrack {
    frequency: f32,
    sample_rate: u32,
}

impl Default for SilentAudioTrack {
    fn default() -> Self {
        Self::new()
    }
}

impl SilentAudioTrack {
    #[must_use]
    pub fn new() -> Self {
        Self {
            frequency: 0.0,
            sample_rate: SILENT_AUDIO_SAMPLE_RATE,
        }
    }

    #[must_use]
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl MediaStreamTrack for SilentAudioTrack {
    fn id(&self) -> &str {
        "silent-audio"
    }
}

/// Input handed to an encoder: the track plus optional silent audio.
#[derive(Debug, Clone)]
pub struct CaptureStream {
    pub track: MediaTrack,
    pub silent_audio: Option<SilentAudioTrack>,
}

impl CaptureStream {
    /// Number of tracks in the stream.
    #[must_use]
    pub fn track_count(&self) -> usize {
        1 + usize::from(self.silent_audio.is_some())
    }
}

/// Settings for one encoder instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderSettings {
    pub mime_type: &'static str,
    pub timeslice: Duration,
}

/// A running encoder.
pub trait MediaEncoder: Send {
    /// Take the bytes encoded since the last drain. May be empty.
    fn drain(&mut self) -> Result<Bytes, CaptureError>;

    /// Stop encoding. Bytes not yet drained are discarded.
    fn stop(&mut self) {}
}

/// Creates encoders for capture streams.
pub trait EncoderFactory: Send + Sync {
    /// Whether video-only streams need a companion audio track.
    fn requires_audio_track(&self) -> bool {
        true
    }

    fn open(
        &self,
        stream: CaptureStream,
        settings: &EncoderSettings,
    ) -> Result<Box<dyn MediaEncoder>, CaptureError>;
}

/// Factory used when no encoder is linked in.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnlinkedEncoderFactory;

impl EncoderFactory for UnlinkedEncoderFactory {
    fn open(
        &self,
        stream: CaptureStream,
        settings: &EncoderSettings,
    ) -> Result<Box<dyn MediaEncoder>, CaptureError> {
        Err(CaptureError::EncoderUnavailable(format!(
            "no encoder for {} ({})",
            settings.mime_type, stream.track.sid
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_audio_is_zero_frequency() {
        let silent = SilentAudioTrack::new();
        assert_eq!(silent.frequency(), 0.0);
        assert_eq!(silent.sample_rate(), SILENT_AUDIO_SAMPLE_RATE);
        assert_eq!(silent.id(), "silent-audio");
    }

    #[test]
    fn test_capture_stream_track_count() {
        let track = MediaTrack::new(
            TrackSid::from("MT1"),
            TrackKind::Video,
            Arc::new(SilentAudioTrack::new()),
        );
        let mut stream = CaptureStream {
            track,
            silent_audio: None,
        };
        assert_eq!(stream.track_count(), 1);

        stream.silent_audio = Some(SilentAudioTrack::new());
        assert_eq!(stream.track_count(), 2);
    }

    #[test]
    fn test_unlinked_factory_fails() {
        let stream = CaptureStream {
            track: MediaTrack::new(
                TrackSid::from("MT1"),
                TrackKind::Audio,
                Arc::new(SilentAudioTrack::new()),
            ),
            silent_audio: None,
        };
        let settings = EncoderSettings {
            mime_type: "audio/webm",
            timeslice: Duration::from_millis(100),
        };

        assert!(matches!(
            UnlinkedEncoderFactory.open(stream, &settings),
            Err(CaptureError::EncoderUnavailable(_))
        ));
    }
}
