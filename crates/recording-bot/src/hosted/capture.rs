//! Time-sliced capture pipeline for one track.
//!
//! A pipeline owns one encoder and drains it on a fixed timeslice. Each
//! non-empty drain becomes a [`MediaChunk`] with the next sequence number.
//! The sequence ends when the pipeline's stop handle fires; nothing is
//! produced after that, including bytes the encoder still holds.

use super::media::{
    CaptureStream, EncoderFactory, EncoderSettings, MediaEncoder, MediaTrack, SilentAudioTrack,
};
use super::profile::CaptureProfile;
use super::CaptureError;
use common::types::{TrackKind, TrackSid};
use media_chunk::MediaChunk;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Stops a capture pipeline. Cloneable; stopping is idempotent.
#[derive(Debug, Clone, Default)]
pub struct CaptureStopHandle {
    token: CancellationToken,
}

impl CaptureStopHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Lazy sequence of chunks for one track.
pub struct CapturePipeline {
    track: TrackSid,
    encoder: Box<dyn MediaEncoder>,
    ticker: Interval,
    stop: CancellationToken,
    started: Instant,
    sequence: u64,
    finished: bool,
}

impl CapturePipeline {
    /// Open an encoder for `track` and start the timeslice clock.
    ///
    /// Video tracks are paired with a silent audio track when both the
    /// profile and the encoder ask for it. Audio tracks never are.
    ///
    /// # Errors
    ///
    /// Returns the encoder factory's error if no encoder can be opened.
    pub fn open(
        track: MediaTrack,
        encoders: &dyn EncoderFactory,
        profile: &CaptureProfile,
        stop: &CaptureStopHandle,
    ) -> Result<Self, CaptureError> {
        let silent_audio = (track.kind == TrackKind::Video
            && profile.silent_audio_for_video
            && encoders.requires_audio_track())
        .then(SilentAudioTrack::new);

        let settings = EncoderSettings {
            mime_type: profile.container.mime_type(track.kind),
            timeslice: profile.timeslice(),
        };

        let track_sid = track.sid.clone();
        debug!(
            target: "rb.hosted.capture",
            track = %track_sid,
            mime_type = settings.mime_type,
            silent_audio = silent_audio.is_some(),
            "Opening encoder"
        );

        let encoder = encoders.open(
            CaptureStream {
                track,
                silent_audio,
            },
            &settings,
        )?;

        let started = Instant::now();
        let mut ticker = interval_at(started + settings.timeslice, settings.timeslice);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Ok(Self {
            track: track_sid,
            encoder,
            ticker,
            stop: stop.token.clone(),
            started,
            sequence: 0,
            finished: false,
        })
    }

    #[must_use]
    pub fn track(&self) -> &TrackSid {
        &self.track
    }

    /// Chunks produced so far.
    #[must_use]
    pub fn chunks_produced(&self) -> u64 {
        self.sequence
    }

    /// Wait for the next non-empty timeslice.
    ///
    /// Returns `Ok(None)` once stopped, and on every call after that.
    ///
    /// # Errors
    ///
    /// Returns the encoder's error if draining fails.
    pub async fn next_chunk(&mut self) -> Result<Option<MediaChunk>, CaptureError> {
        loop {
            if self.finished {
                return Ok(None);
            }

            let stopped = tokio::select! {
                biased;
                () = self.stop.cancelled() => true,
                _ = self.ticker.tick() => false,
            };

            if stopped {
                self.finish();
                return Ok(None);
            }

            let data = self.encoder.drain()?;
            match MediaChunk::new(self.sequence + 1, self.started.elapsed(), data) {
                Some(chunk) => {
                    self.sequence = chunk.sequence;
                    return Ok(Some(chunk));
                }
                None => {
                    trace!(target: "rb.hosted.capture", track = %self.track, "Empty timeslice");
                }
            }
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.encoder.stop();
        debug!(
            target: "rb.hosted.capture",
            track = %self.track,
            chunks = self.sequence,
            "Capture stopped"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::hosted::media::MediaStreamTrack;
    use bytes::Bytes;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug)]
    struct FakeTrack;

    impl MediaStreamTrack for FakeTrack {
        fn id(&self) -> &str {
            "fake"
        }
    }

    #[derive(Default)]
    struct Shared {
        slices: VecDeque<Bytes>,
        opened: Vec<(&'static str, bool)>,
        stopped: bool,
    }

    /// Hands out queued slices, one per drain.
    struct QueueEncoder(Arc<Mutex<Shared>>);

    impl MediaEncoder for QueueEncoder {
        fn drain(&mut self) -> Result<Bytes, CaptureError> {
            Ok(self.0.lock().unwrap().slices.pop_front().unwrap_or_default())
        }

        fn stop(&mut self) {
            self.0.lock().unwrap().stopped = true;
        }
    }

    struct QueueFactory {
        shared: Arc<Mutex<Shared>>,
        requires_audio: bool,
    }

    impl EncoderFactory for QueueFactory {
        fn requires_audio_track(&self) -> bool {
            self.requires_audio
        }

        fn open(
            &self,
            stream: CaptureStream,
            settings: &EncoderSettings,
        ) -> Result<Box<dyn MediaEncoder>, CaptureError> {
            self.shared
                .lock()
                .unwrap()
                .opened
                .push((settings.mime_type, stream.silent_audio.is_some()));
            Ok(Box::new(QueueEncoder(Arc::clone(&self.shared))))
        }
    }

    fn factory(slices: &[&'static [u8]], requires_audio: bool) -> QueueFactory {
        let shared = Shared {
            slices: slices.iter().map(|s| Bytes::from_static(s)).collect(),
            ..Shared::default()
        };
        QueueFactory {
            shared: Arc::new(Mutex::new(shared)),
            requires_audio,
        }
    }

    fn track(kind: TrackKind) -> MediaTrack {
        MediaTrack::new(TrackSid::from("MT1"), kind, Arc::new(FakeTrack))
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunks_follow_timeslice_and_skip_empty() {
        let factory = factory(&[b"one", b"", b"two"], true);
        let stop = CaptureStopHandle::new();
        let mut pipeline = CapturePipeline::open(
            track(TrackKind::Audio),
            &factory,
            &CaptureProfile::default(),
            &stop,
        )
        .unwrap();

        let first = pipeline.next_chunk().await.unwrap().unwrap();
        assert_eq!(first.sequence, 1);
        assert_eq!(first.offset, Duration::from_millis(100));
        assert_eq!(first.data, Bytes::from_static(b"one"));

        let second = pipeline.next_chunk().await.unwrap().unwrap();
        assert_eq!(second.sequence, 2);
        assert_eq!(second.offset, Duration::from_millis(300));
        assert_eq!(second.data, Bytes::from_static(b"two"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_sequence_without_flush() {
        let factory = factory(&[b"held"], true);
        let stop = CaptureStopHandle::new();
        let mut pipeline = CapturePipeline::open(
            track(TrackKind::Audio),
            &factory,
            &CaptureProfile::default(),
            &stop,
        )
        .unwrap();

        stop.stop();
        stop.stop();

        assert!(pipeline.next_chunk().await.unwrap().is_none());
        assert!(pipeline.next_chunk().await.unwrap().is_none());
        assert_eq!(pipeline.chunks_produced(), 0);

        let shared = factory.shared.lock().unwrap();
        assert!(shared.stopped);
        assert_eq!(shared.slices.len(), 1, "held bytes are never drained");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_wins_over_due_tick() {
        let factory = factory(&[b"late"], true);
        let stop = CaptureStopHandle::new();
        let mut pipeline = CapturePipeline::open(
            track(TrackKind::Audio),
            &factory,
            &CaptureProfile::default(),
            &stop,
        )
        .unwrap();

        tokio::time::advance(Duration::from_millis(150)).await;
        stop.stop();

        assert!(pipeline.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_silent_audio_only_for_video() {
        let factory = factory(&[], true);
        let profile = CaptureProfile::default();
        let stop = CaptureStopHandle::new();
        CapturePipeline::open(track(TrackKind::Video), &factory, &profile, &stop).unwrap();
        CapturePipeline::open(track(TrackKind::Audio), &factory, &profile, &stop).unwrap();

        let no_audio_needed = self::factory(&[], false);
        CapturePipeline::open(track(TrackKind::Video), &no_audio_needed, &profile, &stop).unwrap();

        assert_eq!(
            factory.shared.lock().unwrap().opened,
            vec![("video/webm", true), ("audio/webm", false)]
        );
        assert_eq!(
            no_audio_needed.shared.lock().unwrap().opened,
            vec![("video/webm", false)]
        );
    }
}
