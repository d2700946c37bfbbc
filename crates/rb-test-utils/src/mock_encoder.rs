//! Mock encoder factory.
//!
//! Tests feed bytes per track with [`MockEncoderFactory::feed`]; every drain
//! of an encoder for that track hands out the oldest fed slice. Encoders
//! opened for the same track sid share one queue, so bytes fed after a
//! re-subscription go to the new recording.
//!
//! # Example
//!
//! ```rust,ignore
//! use rb_test_utils::MockEncoderFactory;
//!
//! let encoders = MockEncoderFactory::new().with_requires_audio(false);
//! encoders.feed("MT1", b"first".as_slice());
//!
//! // After the recorder opened an encoder for MT1:
//! assert_eq!(encoders.opened().len(), 1);
//! ```

use bytes::Bytes;
use common::types::TrackSid;
use recording_bot::hosted::{
    CaptureError, CaptureStream, EncoderFactory, EncoderSettings, MediaEncoder,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// A stream an encoder was opened for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedStream {
    pub track: TrackSid,
    pub mime_type: &'static str,
    /// Whether the silent audio track was added.
    pub silent_audio: bool,
    pub track_count: usize,
}

#[derive(Debug)]
struct Inner {
    queues: HashMap<TrackSid, VecDeque<Bytes>>,
    opened: Vec<OpenedStream>,
    stopped: usize,
    requires_audio: bool,
    fail_open: HashMap<TrackSid, String>,
}

/// Encoder factory fed with bytes by the test.
#[derive(Debug, Clone)]
pub struct MockEncoderFactory {
    inner: Arc<Mutex<Inner>>,
}

impl Default for MockEncoderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEncoderFactory {
    /// Create a factory that requires a companion audio track for video.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                queues: HashMap::new(),
                opened: Vec::new(),
                stopped: 0,
                requires_audio: true,
                fail_open: HashMap::new(),
            })),
        }
    }

    /// Set whether video-only streams need a companion audio track.
    #[must_use]
    pub fn with_requires_audio(self, requires_audio: bool) -> Self {
        self.inner.lock().unwrap().requires_audio = requires_audio;
        self
    }

    /// Make opening an encoder for `track` fail with `reason`.
    #[must_use]
    pub fn failing_track(self, track: &str, reason: impl Into<String>) -> Self {
        self.inner
            .lock()
            .unwrap()
            .fail_open
            .insert(TrackSid::from(track), reason.into());
        self
    }

    /// Queue `data` to be drained by the encoder of `track`.
    pub fn feed(&self, track: &str, data: impl Into<Bytes>) {
        self.inner
            .lock()
            .unwrap()
            .queues
            .entry(TrackSid::from(track))
            .or_default()
            .push_back(data.into());
    }

    /// Slices fed for `track` that no encoder has drained yet.
    #[must_use]
    pub fn pending(&self, track: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .queues
            .get(&TrackSid::from(track))
            .map_or(0, VecDeque::len)
    }

    /// Every stream an encoder was opened for, in order.
    #[must_use]
    pub fn opened(&self) -> Vec<OpenedStream> {
        self.inner.lock().unwrap().opened.clone()
    }

    /// Number of encoders that were stopped.
    #[must_use]
    pub fn stopped(&self) -> usize {
        self.inner.lock().unwrap().stopped
    }
}

impl EncoderFactory for MockEncoderFactory {
    fn requires_audio_track(&self) -> bool {
        self.inner.lock().unwrap().requires_audio
    }

    fn open(
        &self,
        stream: CaptureStream,
        settings: &EncoderSettings,
    ) -> Result<Box<dyn MediaEncoder>, CaptureError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(reason) = inner.fail_open.get(&stream.track.sid) {
            return Err(CaptureError::Encoder(reason.clone()));
        }
        inner.opened.push(OpenedStream {
            track: stream.track.sid.clone(),
            mime_type: settings.mime_type,
            silent_audio: stream.silent_audio.is_some(),
            track_count: stream.track_count(),
        });

        Ok(Box::new(MockEncoder {
            track: stream.track.sid,
            inner: Arc::clone(&self.inner),
            stopped: false,
        }))
    }
}

struct MockEncoder {
    track: TrackSid,
    inner: Arc<Mutex<Inner>>,
    stopped: bool,
}

impl MediaEncoder for MockEncoder {
    fn drain(&mut self) -> Result<Bytes, CaptureError> {
        if self.stopped {
            return Ok(Bytes::new());
        }
        let mut inner = self.inner.lock().unwrap();
        Ok(inner
            .queues
            .get_mut(&self.track)
            .and_then(VecDeque::pop_front)
            .unwrap_or_default())
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.inner.lock().unwrap().stopped += 1;
        }
    }
}
