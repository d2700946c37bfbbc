//! Hosting environment interface.
//!
//! The host drives the hosted side the way an automation client drives a
//! browser: launch an environment, open a page, navigate it to the serving
//! surface, expose the bridge, call into the page to join, and finally close
//! everything. [`in_process`] implements this with the hosted side running
//! as tokio tasks in the same process.

pub mod in_process;

pub use in_process::InProcessLauncher;

use crate::bridge::BridgeClient;
use crate::hosted::{AgentError, FinishSummary, JoinedSession, SessionEnd};
use async_trait::async_trait;
use common::secret::SecretString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostingError {
    /// The environment could not be started.
    #[error("Failed to launch hosting environment: {0}")]
    Launch(String),

    /// The bootstrap page could not be loaded.
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// The capture bundle could not be loaded.
    #[error("Failed to load capture bundle: {0}")]
    Bundle(String),

    #[error(transparent)]
    Agent(#[from] AgentError),

    /// The environment or page is already closed.
    #[error("Hosting environment is closed")]
    Closed,
}

/// Starts hosting environments.
#[async_trait]
pub trait HostingLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn HostingEnvironment>, HostingError>;
}

/// A running hosting environment.
#[async_trait]
pub trait HostingEnvironment: Send {
    async fn open_page(&mut self) -> Result<Box<dyn HostedPage>, HostingError>;

    /// Close the environment and every page in it. Idempotent.
    async fn close(&mut self) -> Result<(), HostingError>;
}

/// A page running the hosted side.
#[async_trait]
pub trait HostedPage: Send {
    /// Load the bootstrap page and capture bundle from `url`.
    async fn navigate(&mut self, url: &str) -> Result<(), HostingError>;

    /// Make the bridge callable from the page.
    async fn expose_bridge(&mut self, bridge: BridgeClient) -> Result<(), HostingError>;

    /// Join the session. Dropping the future abandons the join.
    async fn join(
        &mut self,
        token: SecretString,
        session_name: Option<String>,
    ) -> Result<JoinedSession, HostingError>;

    /// Resolves when the session ends on its own. Cancel-safe; never
    /// resolves more than once.
    async fn session_ended(&mut self) -> SessionEnd;

    /// Stop recording and leave the session.
    async fn finish(&mut self) -> Result<FinishSummary, HostingError>;
}
