//! Log routing tests.
//!
//! Checks that the default log filter keeps the component targets enabled
//! and that hosted-side log calls reach the host's log sink.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use rb_test_utils::LogCapture;
use recording_bot::bridge::spawn_bridge;
use recording_bot::observability::DEFAULT_LOG_FILTER;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Test that the default filter passes every component target at the
/// levels they log at.
#[test]
fn test_default_filter_enables_component_targets() {
    let logs = LogCapture::new();
    let _guard = logs.set_default(EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing::info!(target: "rb.hosted", "Begin recording");
    tracing::error!(target: "rb.hosted", "Fault in recording MT1");
    tracing::info!(target: "rb.orchestrator", "Connected to Room RM1");
    tracing::debug!(target: "rb.bridge", "Wrote chunk");
    tracing::debug!(target: "rb.hosted.tracker", "No active recording");
    tracing::info!(target: "tower_http::trace", "request");
    tracing::trace!(target: "rb.hosted.capture", "Empty timeslice");
    tracing::debug!(target: "hyper::proto", "noise");

    let targets: Vec<String> = logs.events().into_iter().map(|e| e.target).collect();
    assert_eq!(
        targets,
        vec![
            "rb.hosted",
            "rb.hosted",
            "rb.orchestrator",
            "rb.bridge",
            "rb.hosted.tracker",
            "tower_http::trace",
        ]
    );
}

/// Test that bridge log calls are re-emitted on the host under `rb.hosted`
/// at the matching level.
#[tokio::test]
async fn test_bridge_logs_reach_host_sink() {
    let logs = LogCapture::new();
    let _guard = logs.set_default(EnvFilter::new(DEFAULT_LOG_FILTER));
    let root = tempfile::tempdir().unwrap();
    let (client, host) = spawn_bridge(root.path());

    client.debug("Connecting to Room...").await;
    client.info("Begin recording RemoteAudioTrack MT1").await;
    client.error("Fault in recording MT2").await;
    host.close().await.unwrap();

    assert!(logs.contains("rb.hosted", Level::DEBUG, "Connecting to Room..."));
    assert!(logs.contains("rb.hosted", Level::INFO, "Begin recording RemoteAudioTrack MT1"));
    assert!(logs.contains("rb.hosted", Level::ERROR, "Fault in recording MT2"));
}
