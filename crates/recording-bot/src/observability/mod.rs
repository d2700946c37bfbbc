//! Observability for the Recording Bot.
//!
//! Logging goes through `tracing` with a `target:` per component, all under
//! the `rb` prefix (`rb.orchestrator`, `rb.bridge`, `rb.hosted`, ...). The
//! default filter must keep that prefix enabled or forwarded hosted-side logs
//! and fault reports are lost. Metrics use the `metrics` facade and are rendered by
//! `metrics-exporter-prometheus` at `/metrics`.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `rb_recording_jobs_started_total` | Counter | `kind` | Recordings started per track kind |
//! | `rb_recordings_active` | Gauge | none | Tracks currently being recorded |
//! | `rb_chunks_appended_total` | Counter | none | Chunks appended to recording files |
//! | `rb_chunk_bytes_written_total` | Counter | none | Bytes appended to recording files |
//! | `rb_chunk_size_bytes` | Histogram | none | Size of appended chunks |
//! | `rb_chunk_append_failures_total` | Counter | `reason` | Chunks lost on the host |
//! | `rb_chunks_dropped_total` | Counter | none | Bridge calls dropped after shutdown |

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
pub use metrics::init_metrics_recorder;

use tracing_subscriber::EnvFilter;

/// Log filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "recording_bot=debug,rb=debug,tower_http=info";

/// Log filter from `RUST_LOG`, or [`DEFAULT_LOG_FILTER`].
#[must_use]
pub fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}
