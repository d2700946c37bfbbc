//! Recording Bot Library
//!
//! Records the media tracks of every remote participant in a real-time
//! session to durable per-track files.
//!
//! The work is split across two environments that can only talk through a
//! string-only bridge:
//!
//! - The **hosted side** joins the session and encodes media but has no
//!   filesystem. It tracks participants, opens one capture pipeline per
//!   subscribed track and ships encoded chunks over the bridge.
//! - The **host** owns the process: it serves the bootstrap page and capture
//!   bundle, launches the hosting environment, executes bridge calls against
//!   the filesystem and coordinates shutdown.
//!
//! # Architecture
//!
//! ```text
//! Orchestrator (host)
//! ├── HTTP serving surface (/, /bundle.json, /health, /ready, /metrics)
//! ├── BridgeHost ── ChunkWriter (one per recording file)
//! └── HostingEnvironment
//!     └── HostedPage ── SessionAgent (hosted side)
//!                       └── ParticipantTracker
//!                           ├── RecordingJobRegistry
//!                           └── recording task (one per subscribed track)
//!                               └── CapturePipeline
//! ```
//!
//! Recordings land at
//! `<root>/<session>/<local participant>/<remote participant>/<track>/<n>.webm`
//! where `n` counts subscriptions of that track within the session.
//!
//! # Modules
//!
//! - [`bridge`] - Cross-boundary call set and its host-side executor
//! - [`hosted`] - Session-hosting side: registry, capture, tracker, agent
//! - [`hosting`] - Hosting environment interface and in-process implementation
//! - [`http`] - Serving surface: bootstrap page, capture bundle, health, metrics
//! - [`observability`] - Health state and Prometheus metrics
//! - [`orchestrator`] - Startup ordering and idempotent teardown
//! - [`shutdown`] - Shutdown coordination and termination signals
//! - [`config`] - Configuration from environment and arguments
//! - [`credentials`] - Access token resolution and minting
//! - [`errors`] - Top-level error type

pub mod bridge;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod hosted;
pub mod hosting;
pub mod http;
pub mod observability;
pub mod orchestrator;
pub mod shutdown;
