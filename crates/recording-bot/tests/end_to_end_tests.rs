//! End-to-end recorder tests.
//!
//! Runs the full `Orchestrator` with the in-process hosting environment: the
//! page navigates to the real serving surface, the bridge writes into a
//! temporary directory, and a `MockSessionConnector` stands in for the
//! session library.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use common::secret::SecretString;
use rb_test_utils::{
    test_profile, LogCapture, MockEncoderFactory, MockSessionConnector, MockSessionController,
    TestParticipant,
};
use recording_bot::hosting::InProcessLauncher;
use recording_bot::observability::{HealthState, DEFAULT_LOG_FILTER};
use recording_bot::orchestrator::{Orchestrator, OrchestratorSettings};
use recording_bot::shutdown::{ShutdownCoordinator, ShutdownReason};
use tokio::task::JoinHandle;
use tracing::Level;
use tracing_subscriber::EnvFilter;

const WAIT_TIMEOUT: Duration = Duration::from_secs(10);

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

fn read(root: &Path, relative: &str) -> Vec<u8> {
    std::fs::read(root.join(relative)).expect("recording file missing")
}

/// Poll until the file at `relative` holds exactly `expected`.
async fn wait_for_file(root: &Path, relative: &str, expected: &[u8]) {
    let path = root.join(relative);
    wait_until(|| std::fs::read(&path).is_ok_and(|data| data == expected)).await;
}

struct Recorder {
    shutdown: ShutdownCoordinator,
    health: Arc<HealthState>,
    task: JoinHandle<u8>,
}

fn spawn_recorder(root: &Path, connector: &MockSessionConnector) -> Recorder {
    let shutdown = ShutdownCoordinator::new();
    let health = Arc::new(HealthState::new());
    let launcher = InProcessLauncher::new(Arc::new(connector.clone())).unwrap();

    let orchestrator = Orchestrator::new(
        OrchestratorSettings {
            bind_address: "127.0.0.1:0".to_string(),
            recordings_dir: root.to_path_buf(),
            session_name: Some("daily-standup".to_string()),
            profile: test_profile(10),
        },
        Arc::new(launcher),
        shutdown.clone(),
        Arc::clone(&health),
        None,
    );
    let task = tokio::spawn(orchestrator.run(SecretString::from("test-token")));

    Recorder {
        shutdown,
        health,
        task,
    }
}

async fn wait_joined(controller: &MockSessionController, health: &HealthState) {
    wait_until(|| controller.is_connected() && health.is_ready()).await;
}

/// Two participants, three tracks, one re-subscription: four files with
/// their chunks in order, and a clean exit on signal.
#[tokio::test]
async fn test_two_participants_with_resubscribe() {
    let root = tempfile::tempdir().unwrap();
    let encoders = MockEncoderFactory::new();
    let alice = TestParticipant::new("PA1")
        .with_audio("MT1")
        .with_video("MT2")
        .with_data("DT1");
    let bob = TestParticipant::new("PA2").with_audio("MT3");

    encoders.feed("MT1", b"alice-audio-1 ".as_slice());
    encoders.feed("MT1", b"alice-audio-2".as_slice());
    encoders.feed("MT2", b"alice-video".as_slice());

    let connector = MockSessionConnector::builder()
        .session_sid("RM1")
        .local_participant_sid("PA0")
        .with_participant(alice.build())
        .encoders(encoders.clone())
        .build();
    let controller = connector.controller();
    let recorder = spawn_recorder(root.path(), &connector);

    wait_joined(&controller, &recorder.health).await;
    let calls = controller.connect_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls.first().unwrap().0, "test-token");
    assert_eq!(calls.first().unwrap().1.name.as_deref(), Some("daily-standup"));

    wait_until(|| encoders.pending("MT1") == 0 && encoders.pending("MT2") == 0).await;

    controller.participant_connected("PA2");
    encoders.feed("MT3", b"bob-audio".as_slice());
    controller.subscribe("PA2", bob.track("MT3"));
    wait_until(|| encoders.pending("MT3") == 0).await;

    controller.unsubscribe("PA1", alice.track("MT1"));
    wait_until(|| encoders.stopped() == 1).await;
    controller.subscribe("PA1", alice.track("MT1"));
    wait_until(|| encoders.opened().len() == 4).await;
    encoders.feed("MT1", b"alice-audio-3".as_slice());
    wait_until(|| encoders.pending("MT1") == 0).await;

    recorder.shutdown.request_shutdown(ShutdownReason::Signal);
    let exit_code = recorder.task.await.unwrap();

    assert_eq!(exit_code, 0);
    assert!(!recorder.health.is_ready());
    assert!(!controller.is_connected());
    assert_eq!(controller.disconnect_calls(), 1);

    let base = root.path().join("RM1").join("PA0");
    assert_eq!(read(&base, "PA1/MT1/1.webm"), b"alice-audio-1 alice-audio-2");
    assert_eq!(read(&base, "PA1/MT1/2.webm"), b"alice-audio-3");
    assert_eq!(read(&base, "PA1/MT2/1.webm"), b"alice-video");
    assert_eq!(read(&base, "PA2/MT3/1.webm"), b"bob-audio");
    assert!(!base.join("PA1").join("DT1").exists());
}

/// One participant with audio and video, one with video only: three
/// recordings at steady state, and re-subscribing the video-only track
/// opens a second file without touching the first three.
#[tokio::test]
async fn test_audio_video_and_video_only_participants() {
    let root = tempfile::tempdir().unwrap();
    let encoders = MockEncoderFactory::new();
    let alice = TestParticipant::new("PA1").with_audio("MT1").with_video("MT2");
    let bob = TestParticipant::new("PA2").with_video("MT3");

    encoders.feed("MT1", b"alice-audio".as_slice());
    encoders.feed("MT2", b"alice-video".as_slice());
    encoders.feed("MT3", b"bob-video-1".as_slice());

    let connector = MockSessionConnector::builder()
        .session_sid("RM1")
        .local_participant_sid("PA0")
        .with_participant(alice.build())
        .with_participant(bob.build())
        .encoders(encoders.clone())
        .build();
    let controller = connector.controller();
    let recorder = spawn_recorder(root.path(), &connector);

    wait_joined(&controller, &recorder.health).await;
    wait_until(|| encoders.opened().len() == 3).await;

    let base = root.path().join("RM1").join("PA0");
    wait_for_file(&base, "PA1/MT1/1.webm", b"alice-audio").await;
    wait_for_file(&base, "PA1/MT2/1.webm", b"alice-video").await;
    wait_for_file(&base, "PA2/MT3/1.webm", b"bob-video-1").await;

    assert_eq!(encoders.opened().len(), 3);
    assert_eq!(encoders.stopped(), 0);
    let bob_video = encoders
        .opened()
        .into_iter()
        .find(|s| s.track.as_str() == "MT3")
        .unwrap();
    assert!(bob_video.silent_audio);

    let first_files = ["PA1/MT1/1.webm", "PA1/MT2/1.webm", "PA2/MT3/1.webm"];
    let snapshot: Vec<Vec<u8>> = first_files.iter().map(|f| read(&base, f)).collect();

    controller.unsubscribe("PA2", bob.track("MT3"));
    wait_until(|| encoders.stopped() == 1).await;
    controller.subscribe("PA2", bob.track("MT3"));
    wait_until(|| encoders.opened().len() == 4).await;
    encoders.feed("MT3", b"bob-video-2".as_slice());
    wait_for_file(&base, "PA2/MT3/2.webm", b"bob-video-2").await;

    let after: Vec<Vec<u8>> = first_files.iter().map(|f| read(&base, f)).collect();
    assert_eq!(after, snapshot);

    recorder.shutdown.request_shutdown(ShutdownReason::Signal);
    assert_eq!(recorder.task.await.unwrap(), 0);

    let after_exit: Vec<Vec<u8>> = first_files.iter().map(|f| read(&base, f)).collect();
    assert_eq!(after_exit, snapshot);
    assert_eq!(read(&base, "PA2/MT3/2.webm"), b"bob-video-2");
    assert_eq!(std::fs::read_dir(base.join("PA2").join("MT3")).unwrap().count(), 2);
}

/// A signal while the join is still pending: no recordings and exit 0.
#[tokio::test]
async fn test_signal_before_join_completes() {
    let root = tempfile::tempdir().unwrap();
    let encoders = MockEncoderFactory::new();
    let alice = TestParticipant::new("PA1").with_audio("MT1");
    encoders.feed("MT1", b"never".as_slice());

    let connector = MockSessionConnector::builder()
        .with_participant(alice.build())
        .encoders(encoders.clone())
        .gated()
        .build();
    let controller = connector.controller();
    let recorder = spawn_recorder(root.path(), &connector);

    wait_until(|| controller.connect_calls().len() == 1).await;
    recorder.shutdown.request_shutdown(ShutdownReason::Signal);
    let exit_code = recorder.task.await.unwrap();

    assert_eq!(exit_code, 0);
    assert!(encoders.opened().is_empty());
    assert_eq!(encoders.pending("MT1"), 1);
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

/// The session library disconnecting with an error ends the process with 1.
#[tokio::test]
async fn test_session_error_exits_with_failure() {
    let root = tempfile::tempdir().unwrap();
    let connector = MockSessionConnector::builder().build();
    let controller = connector.controller();
    let recorder = spawn_recorder(root.path(), &connector);

    wait_joined(&controller, &recorder.health).await;
    controller.disconnect(Some("signaling connection lost"));
    let exit_code = recorder.task.await.unwrap();

    assert_eq!(exit_code, 1);
    assert_eq!(
        recorder.shutdown.reason(),
        Some(&ShutdownReason::SessionEnded {
            error: Some("signaling connection lost".to_string())
        })
    );
}

/// A clean disconnect by the session library ends the process with 0.
#[tokio::test]
async fn test_clean_session_end_exits_with_success() {
    let root = tempfile::tempdir().unwrap();
    let connector = MockSessionConnector::builder().build();
    let controller = connector.controller();
    let recorder = spawn_recorder(root.path(), &connector);

    wait_joined(&controller, &recorder.health).await;
    controller.disconnect(None);

    assert_eq!(recorder.task.await.unwrap(), 0);
    assert_eq!(controller.disconnect_calls(), 0);
}

/// A panic inside the session agent ends the process with 1 and is logged.
#[tokio::test]
async fn test_session_agent_crash_exits_with_failure() {
    let logs = LogCapture::new();
    let _guard = logs.set_default(EnvFilter::new(DEFAULT_LOG_FILTER));
    let root = tempfile::tempdir().unwrap();
    let connector = MockSessionConnector::builder().build();
    let controller = connector.controller();
    let recorder = spawn_recorder(root.path(), &connector);

    wait_joined(&controller, &recorder.health).await;
    controller.crash("decoder exploded");
    let exit_code = tokio::time::timeout(WAIT_TIMEOUT, recorder.task)
        .await
        .expect("recorder did not exit after the agent crashed")
        .unwrap();

    assert_eq!(exit_code, 1);
    let reason = recorder.shutdown.reason();
    assert!(
        matches!(
            reason,
            Some(ShutdownReason::SessionEnded { error: Some(e) })
                if e.contains("crashed") && e.contains("decoder exploded")
        ),
        "{reason:?}"
    );
    assert!(logs.contains("rb.hosted", Level::ERROR, "Fault in session agent"));
    assert!(logs.contains("rb.hosted", Level::ERROR, "decoder exploded"));
}
