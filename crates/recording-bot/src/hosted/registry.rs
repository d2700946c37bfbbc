//! Recording jobs and per-track subscription counters.
//!
//! Every subscription of a track gets its own file. The registry hands out
//! the path for the next subscription and remembers which job is active for
//! each track. All operations are synchronous, so a counter read and the
//! job it produces can never be split by another event.

use common::types::{ParticipantSid, SessionSid, TrackKind, TrackSid};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Location of one recording file relative to the recordings root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordingPath {
    pub session: SessionSid,
    pub local_participant: ParticipantSid,
    pub remote_participant: ParticipantSid,
    pub track: TrackSid,
    pub subscription: u32,
    pub extension: String,
}

impl RecordingPath {
    /// File name, e.g. `2.webm`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.subscription, self.extension)
    }

    /// Path segments as sent over the bridge. The last one is the file name.
    #[must_use]
    pub fn segments(&self) -> Vec<String> {
        vec![
            self.session.to_string(),
            self.local_participant.to_string(),
            self.remote_participant.to_string(),
            self.track.to_string(),
            self.file_name(),
        ]
    }
}

impl fmt::Display for RecordingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.session,
            self.local_participant,
            self.remote_participant,
            self.track,
            self.file_name()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Open,
    Closed,
}

/// One subscription of one track, recorded to one file.
///
/// Clones share the byte counter, so the recording task can account for
/// chunks while the registry keeps the job.
#[derive(Debug, Clone)]
pub struct RecordingJob {
    pub path: RecordingPath,
    pub kind: TrackKind,
    state: JobState,
    bytes_written: Arc<AtomicU64>,
}

impl RecordingJob {
    #[must_use]
    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn record_bytes(&self, len: usize) {
        self.bytes_written
            .fetch_add(u64::try_from(len).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }
}

/// Returned by [`RecordingJobRegistry::begin_job`] for a track that is
/// already being recorded.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("track {0} is already being recorded")]
pub struct AlreadyRecording(pub TrackSid);

/// Jobs of one joined session.
#[derive(Debug)]
pub struct RecordingJobRegistry {
    session: SessionSid,
    local_participant: ParticipantSid,
    extension: String,
    subscriptions: HashMap<TrackSid, u32>,
    active: HashMap<TrackSid, RecordingJob>,
}

impl RecordingJobRegistry {
    pub fn new(
        session: SessionSid,
        local_participant: ParticipantSid,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            session,
            local_participant,
            extension: extension.into(),
            subscriptions: HashMap::new(),
            active: HashMap::new(),
        }
    }

    /// Start a job for the next subscription of `track`.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRecording` if the track has an active job. The
    /// subscription counter is left untouched in that case.
    pub fn begin_job(
        &mut self,
        participant: &ParticipantSid,
        track: &TrackSid,
        kind: TrackKind,
    ) -> Result<RecordingJob, AlreadyRecording> {
        if self.active.contains_key(track) {
            return Err(AlreadyRecording(track.clone()));
        }

        let counter = self.subscriptions.entry(track.clone()).or_insert(0);
        *counter = counter.saturating_add(1);

        let job = RecordingJob {
            path: RecordingPath {
                session: self.session.clone(),
                local_participant: self.local_participant.clone(),
                remote_participant: participant.clone(),
                track: track.clone(),
                subscription: *counter,
                extension: self.extension.clone(),
            },
            kind,
            state: JobState::Open,
            bytes_written: Arc::new(AtomicU64::new(0)),
        };

        self.active.insert(track.clone(), job.clone());
        Ok(job)
    }

    /// Close the active job of `track`, if any.
    pub fn end_job(&mut self, track: &TrackSid) -> Option<RecordingJob> {
        let mut job = self.active.remove(track)?;
        job.state = JobState::Closed;
        Some(job)
    }

    #[must_use]
    pub fn is_active(&self, track: &TrackSid) -> bool {
        self.active.contains_key(track)
    }

    /// Number of subscriptions seen for `track` in this session.
    #[must_use]
    pub fn subscription_count(&self, track: &TrackSid) -> u32 {
        self.subscriptions.get(track).copied().unwrap_or(0)
    }

    pub fn active_jobs(&self) -> impl Iterator<Item = &RecordingJob> {
        self.active.values()
    }

    /// Close every active job.
    pub fn end_all(&mut self) -> Vec<RecordingJob> {
        let tracks: Vec<TrackSid> = self.active.keys().cloned().collect();
        tracks
            .iter()
            .filter_map(|track| self.end_job(track))
            .collect()
    }
}
