//! Recording Bot error types.
//!
//! Each boundary has its own error enum next to the code it describes
//! (`ConfigError`, `CaptureError`, `SessionError`, `BridgeError`,
//! `HostingError`). `RecorderError` is what the orchestrator reports when a
//! startup step fails, and decides the process exit status.

use crate::config::ConfigError;
use crate::credentials::CredentialsError;
use crate::hosting::HostingError;
use thiserror::Error;

/// Top-level Recording Bot error.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Access token could not be resolved.
    #[error("Credentials error: {0}")]
    Credentials(#[from] CredentialsError),

    /// Serving surface could not bind its listener.
    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    /// A hosting environment step failed.
    #[error("Hosting error: {0}")]
    Hosting(#[from] HostingError),
}

impl RecorderError {
    /// Process exit status for this error.
    ///
    /// Every error-triggered shutdown exits with 1; 0 is reserved for a
    /// clean shutdown.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        1
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            RecorderError::Config(_) => "config",
            RecorderError::Credentials(_) => "credentials",
            RecorderError::Bind { .. } => "bind",
            RecorderError::Hosting(_) => "hosting",
        }
    }
}
