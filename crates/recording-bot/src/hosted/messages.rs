//! Commands sent from the hosting environment to the session agent.
//!
//! These model the automation protocol between a host and the page it
//! controls: load the bundle, expose the bridge, call into the page, close it.

use super::agent::FinishSummary;
use super::profile::CaptureProfile;
use super::{JoinedSession, SessionError};
use crate::bridge::BridgeClient;
use common::secret::SecretString;
use tokio::sync::oneshot;

#[derive(Debug)]
pub(crate) enum AgentCommand {
    /// Capture settings from the served bundle.
    LoadProfile {
        profile: CaptureProfile,
        respond_to: oneshot::Sender<()>,
    },

    /// Make the bridge available to the page.
    ExposeBridge {
        bridge: BridgeClient,
        respond_to: oneshot::Sender<()>,
    },

    /// Join the session. Abandoned if `respond_to` is dropped first.
    Join {
        token: SecretString,
        session_name: Option<String>,
        respond_to: oneshot::Sender<Result<JoinedSession, SessionError>>,
    },

    /// Stop all recordings, leave the session and exit.
    Finish {
        respond_to: oneshot::Sender<FinishSummary>,
    },
}
