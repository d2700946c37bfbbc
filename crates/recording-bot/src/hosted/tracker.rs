//! Drives recordings from session events.
//!
//! Each remote track moves between two states:
//!
//! ```text
//! Unsubscribed ──subscribe──▶ Subscribed ──unsubscribe──▶ Unsubscribed
//! ```
//!
//! Subscribing begins a job in the registry and spawns a recording task:
//! `ensureDirectory` is awaited, then every chunk of the capture pipeline is
//! encoded and sent with `appendChunk`. Unsubscribing stops the pipeline and
//! ends the job. Data tracks never get this far.

use super::capture::{CapturePipeline, CaptureStopHandle};
use super::faults::{FaultReporter, SupervisedTask};
use super::media::{EncoderFactory, MediaTrack};
use super::profile::CaptureProfile;
use super::registry::{RecordingJob, RecordingJobRegistry};
use super::session::{RemoteParticipant, RemoteTrack};
use super::{CaptureError, JoinedSession};
use crate::bridge::BridgeClient;
use crate::observability::metrics;
use common::types::{ParticipantSid, TrackSid};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::debug;

struct ActiveRecording {
    participant: ParticipantSid,
    stop: CaptureStopHandle,
    task: SupervisedTask,
}

/// Recording state of one joined session.
pub struct ParticipantTracker {
    registry: RecordingJobRegistry,
    recordings: HashMap<TrackSid, ActiveRecording>,
    bridge: BridgeClient,
    faults: FaultReporter,
    encoders: Arc<dyn EncoderFactory>,
    profile: CaptureProfile,
}

impl ParticipantTracker {
    #[must_use]
    pub fn new(
        session: &JoinedSession,
        bridge: BridgeClient,
        encoders: Arc<dyn EncoderFactory>,
        profile: CaptureProfile,
    ) -> Self {
        Self {
            registry: RecordingJobRegistry::new(
                session.session_sid.clone(),
                session.local_participant_sid.clone(),
                profile.extension.clone(),
            ),
            recordings: HashMap::new(),
            faults: FaultReporter::new(bridge.clone()),
            bridge,
            encoders,
            profile,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &RecordingJobRegistry {
        &self.registry
    }

    /// Number of tracks currently being recorded.
    #[must_use]
    pub fn active_recordings(&self) -> usize {
        self.recordings.len()
    }

    /// Log the participants present at join and record their tracks.
    pub async fn attach(&mut self, participants: &[RemoteParticipant]) {
        self.bridge.info(participant_listing(participants)).await;

        for participant in participants {
            for track in participant.media_tracks() {
                self.start_recording(&participant.sid, track).await;
            }
        }
    }

    /// Start recording a newly subscribed track.
    ///
    /// Returns false for data tracks and for tracks that are already being
    /// recorded.
    pub async fn track_subscribed(
        &mut self,
        participant: &ParticipantSid,
        track: &RemoteTrack,
    ) -> bool {
        let Some(track) = track.as_media() else {
            return false;
        };

        self.bridge
            .info(format!(
                "Subscribed to {} {} published by RemoteParticipant {participant}",
                track.kind.display_name(),
                track.sid
            ))
            .await;

        self.start_recording(participant, track).await
    }

    /// Stop recording an unsubscribed track.
    ///
    /// Returns the ended job, or `None` if the track was not being recorded.
    pub async fn track_unsubscribed(
        &mut self,
        participant: &ParticipantSid,
        track: &RemoteTrack,
    ) -> Option<RecordingJob> {
        let track = track.as_media()?;

        self.bridge
            .info(format!(
                "Unsubscribed from {} {} published by RemoteParticipant {participant}",
                track.kind.display_name(),
                track.sid
            ))
            .await;

        self.stop_recording(&track.sid).await.map(|(job, _)| job)
    }

    /// Stop any recordings left for a participant that left the session.
    pub async fn participant_disconnected(&mut self, participant: &ParticipantSid) -> usize {
        let tracks: Vec<TrackSid> = self
            .recordings
            .iter()
            .filter(|(_, recording)| &recording.participant == participant)
            .map(|(track, _)| track.clone())
            .collect();

        for track in &tracks {
            self.stop_recording(track).await;
        }
        tracks.len()
    }

    /// Stop every recording and end every job.
    ///
    /// Returns the recording tasks so the caller can wait for them.
    pub async fn stop_all(&mut self) -> Vec<SupervisedTask> {
        let tracks: Vec<TrackSid> = self.recordings.keys().cloned().collect();
        let mut tasks = Vec::with_capacity(tracks.len());
        for track in &tracks {
            if let Some((_, task)) = self.stop_recording(track).await {
                tasks.push(task);
            }
        }
        // Jobs without a task (none expected) are closed too
        self.registry.end_all();
        tasks
    }

    async fn start_recording(&mut self, participant: &ParticipantSid, track: &MediaTrack) -> bool {
        let job = match self.registry.begin_job(participant, &track.sid, track.kind) {
            Ok(job) => job,
            Err(e) => {
                debug!(target: "rb.hosted.tracker", track = %track.sid, "{e}, ignoring subscribe");
                return false;
            }
        };

        self.bridge
            .info(format!("Begin recording {}.", job.path))
            .await;
        metrics::record_job_started(track.kind);

        let stop = CaptureStopHandle::new();
        let task = self.faults.spawn(
            format!("recording {}", job.path),
            record(
                job,
                track.clone(),
                self.bridge.clone(),
                Arc::clone(&self.encoders),
                self.profile.clone(),
                stop.clone(),
            ),
        );

        self.recordings.insert(
            track.sid.clone(),
            ActiveRecording {
                participant: participant.clone(),
                stop,
                task,
            },
        );
        metrics::set_recordings_active(self.recordings.len());
        true
    }

    async fn stop_recording(&mut self, track: &TrackSid) -> Option<(RecordingJob, SupervisedTask)> {
        let Some(recording) = self.recordings.remove(track) else {
            debug!(
                target: "rb.hosted.tracker",
                track = %track,
                "No active recording, nothing to stop"
            );
            return None;
        };
        recording.stop.stop();
        metrics::set_recordings_active(self.recordings.len());

        let job = self.registry.end_job(track)?;
        self.bridge
            .info(format!("Stop recording {}.", job.path))
            .await;
        Some((job, recording.task))
    }
}

/// Record one job until its pipeline stops.
async fn record(
    job: RecordingJob,
    track: MediaTrack,
    bridge: BridgeClient,
    encoders: Arc<dyn EncoderFactory>,
    profile: CaptureProfile,
    stop: CaptureStopHandle,
) -> Result<(), CaptureError> {
    let segments = job.path.segments();
    bridge
        .ensure_directory(segments.clone())
        .await
        .map_err(|e| CaptureError::Bridge(e.to_string()))?;

    let mut pipeline = CapturePipeline::open(track, encoders.as_ref(), &profile, &stop)?;
    while let Some(chunk) = pipeline.next_chunk().await? {
        job.record_bytes(chunk.len());
        bridge
            .append_chunk(segments.clone(), chunk.encode())
            .await
            .map_err(|e| CaptureError::Bridge(e.to_string()))?;
    }

    debug!(
        target: "rb.hosted.tracker",
        path = %job.path,
        chunks = pipeline.chunks_produced(),
        bytes = job.bytes_written(),
        "Recording finished"
    );
    Ok(())
}

/// Human readable listing of the participants present at join.
fn participant_listing(participants: &[RemoteParticipant]) -> String {
    if participants.is_empty() {
        return "There are no RemoteParticipants in the Room.".to_string();
    }

    let mut message = if participants.len() == 1 {
        "There is 1 RemoteParticipant in the Room:\n\n".to_string()
    } else {
        format!(
            "There are {} RemoteParticipants in the Room:\n\n",
            participants.len()
        )
    };
    for participant in participants {
        let _ = writeln!(message, "- RemoteParticipant {}", participant.sid);
        for track in participant.media_tracks() {
            let _ = writeln!(message, "  - {} {}", track.kind.display_name(), track.sid);
        }
    }
    message
}
