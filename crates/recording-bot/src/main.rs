//! Recording Bot
//!
//! Joins a real-time session and records every remote audio and video track
//! to its own file under the recordings directory.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment and arguments
//! 2. Resolve the access token (precomputed or minted from an API key)
//! 3. Initialize Prometheus metrics recorder
//! 4. Install termination signal handlers
//! 5. Run the orchestrator: serve, launch, navigate, bridge, join
//! 6. Tear down on signal or session end and exit with its status

#![warn(clippy::pedantic)]

use std::process::ExitCode;
use std::sync::Arc;

use recording_bot::config::Config;
use recording_bot::credentials::resolve_access_token;
use recording_bot::errors::RecorderError;
use recording_bot::hosted::UnlinkedSessionConnector;
use recording_bot::hosting::InProcessLauncher;
use recording_bot::observability::{init_metrics_recorder, log_filter, HealthState};
use recording_bot::orchestrator::{Orchestrator, OrchestratorSettings};
use recording_bot::shutdown::{wait_for_termination_signal, ShutdownCoordinator, ShutdownReason};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = Config::from_env();
    init_tracing(config.as_ref().is_ok_and(|c| c.log_json));

    let config = match config {
        Ok(config) => config,
        Err(e) => return fail(&RecorderError::from(e)),
    };

    info!(
        session = config.session_name.as_deref().unwrap_or("<any>"),
        http_bind_address = %config.http_bind_address(),
        recordings_dir = %config.recordings_dir.display(),
        timeslice_ms = config.timeslice_ms,
        "Configuration loaded successfully"
    );
    info!(
        "Recording Bot running with PID {pid}. Send SIGUSR2 to stop: kill -SIGUSR2 {pid}",
        pid = std::process::id()
    );

    let token = match resolve_access_token(&config) {
        Ok(token) => token,
        Err(e) => return fail(&RecorderError::from(e)),
    };

    let metrics_handle = match init_metrics_recorder() {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "Failed to install Prometheus metrics recorder");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = ShutdownCoordinator::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_termination_signal().await;
        signal_shutdown.request_shutdown(ShutdownReason::Signal);
    });

    let launcher = match InProcessLauncher::new(Arc::new(UnlinkedSessionConnector)) {
        Ok(launcher) => launcher,
        Err(e) => return fail(&RecorderError::from(e)),
    };

    let orchestrator = Orchestrator::new(
        OrchestratorSettings::from_config(&config),
        Arc::new(launcher),
        shutdown,
        Arc::new(HealthState::new()),
        Some(metrics_handle),
    );

    let exit_code = orchestrator.run(token).await;
    info!(exit_code, "Recording Bot stopped");
    ExitCode::from(exit_code)
}

fn init_tracing(json: bool) {
    let filter = log_filter();

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn fail(e: &RecorderError) -> ExitCode {
    error!(error = %e, kind = e.kind(), "Startup failed");
    ExitCode::from(e.exit_code())
}
