//! Session-hosting side.
//!
//! Everything in this module runs inside the hosting environment: it can
//! join the session and encode media, but reaches durable storage only
//! through the [`crate::bridge`].
//!
//! - [`session`] - Interface of the real-time session library
//! - [`media`] - Interface of the media encoder
//! - [`profile`] - Capture settings delivered in the bundle
//! - [`registry`] - Recording jobs and subscription counters
//! - [`capture`] - Time-sliced capture pipeline for one track
//! - [`faults`] - Top-level handler for faults in spawned tasks
//! - [`tracker`] - Drives recordings from session events
//! - [`agent`] - Actor owning the session for one hosted page

pub mod agent;
pub mod capture;
pub mod faults;
pub mod media;
mod messages;
pub mod profile;
pub mod registry;
pub mod session;
pub mod tracker;

pub use agent::{AgentHandle, FinishSummary, SessionAgent};
pub use capture::{CapturePipeline, CaptureStopHandle};
pub use faults::FaultReporter;
pub use media::{
    CaptureStream, EncoderFactory, EncoderSettings, MediaEncoder, MediaStreamTrack, MediaTrack,
    SilentAudioTrack,
};
pub use profile::CaptureProfile;
pub use registry::{RecordingJob, RecordingJobRegistry, RecordingPath};
pub use session::{
    ConnectOptions, RemoteParticipant, RemoteTrack, Session, SessionConnector, SessionEvent,
    UnlinkedSessionConnector,
};
pub use tracker::ParticipantTracker;

use common::types::{ParticipantSid, SessionSid};
use thiserror::Error;

/// Identity of a joined session, reported back to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedSession {
    pub session_sid: SessionSid,
    pub local_participant_sid: ParticipantSid,
}

/// How a joined session ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionEnd {
    /// Error reported by the session library, if the disconnect was not clean.
    pub error: Option<String>,
}

/// Errors from the real-time session library.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// No session library is linked into this build.
    #[error("Session library unavailable: {0}")]
    Unavailable(String),

    /// Connecting to the session failed.
    #[error("Failed to connect: {0}")]
    Connect(String),

    /// A join was attempted before the page was prepared.
    #[error("Not ready to join: {0}")]
    NotReady(String),
}

/// Errors from a capture pipeline or recording task.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    /// No encoder could be created for the stream.
    #[error("Encoder unavailable: {0}")]
    EncoderUnavailable(String),

    /// The encoder failed while capturing.
    #[error("Encoder failed: {0}")]
    Encoder(String),

    /// The bridge refused or dropped a call.
    #[error("Bridge call failed: {0}")]
    Bridge(String),
}

/// Errors talking to a [`SessionAgent`].
#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent task has exited.
    #[error("Session agent is gone")]
    Gone,

    #[error(transparent)]
    Session(#[from] SessionError),
}
