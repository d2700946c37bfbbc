//! Metrics definitions for the Recording Bot.
//!
//! All metrics follow Prometheus naming conventions:
//! - `rb_` prefix
//! - `_total` suffix for counters
//! - `_bytes` suffix for size histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `kind`: 2 values (audio, video)
//! - `reason`: bounded by code (io, decode, invalid_path, writer_gone)

use common::types::TrackKind;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded. Chunk size buckets span
/// a quiet audio slice (a few hundred bytes) to a keyframe-heavy video slice.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("rb_chunk_size_bytes".to_string()),
            &[
                256.0, 1_024.0, 4_096.0, 16_384.0, 65_536.0, 262_144.0, 1_048_576.0,
            ],
        )
        .map_err(|e| format!("Failed to set chunk size buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

/// Record that a recording job started.
///
/// Metric: `rb_recording_jobs_started_total`
/// Labels: `kind`
pub fn record_job_started(kind: TrackKind) {
    counter!("rb_recording_jobs_started_total", "kind" => kind.as_str()).increment(1);
}

/// Set the number of tracks currently being recorded.
///
/// Metric: `rb_recordings_active`
pub fn set_recordings_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("rb_recordings_active").set(count as f64);
}

/// Record a chunk appended to its file.
///
/// Metrics: `rb_chunks_appended_total`, `rb_chunk_bytes_written_total`,
/// `rb_chunk_size_bytes`
pub fn record_chunk_appended(bytes: usize) {
    counter!("rb_chunks_appended_total").increment(1);
    counter!("rb_chunk_bytes_written_total").increment(bytes as u64);
    #[allow(clippy::cast_precision_loss)]
    histogram!("rb_chunk_size_bytes").record(bytes as f64);
}

/// Record a chunk that could not be appended.
///
/// Metric: `rb_chunk_append_failures_total`
/// Labels: `reason`
pub fn record_append_failure(reason: &'static str) {
    counter!("rb_chunk_append_failures_total", "reason" => reason).increment(1);
}

/// Record a bridge call dropped because the host had shut down.
///
/// Metric: `rb_chunks_dropped_total`
pub fn record_chunk_dropped() {
    counter!("rb_chunks_dropped_total").increment(1);
}
