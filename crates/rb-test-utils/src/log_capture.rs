//! Capture `tracing` events for assertions.
//!
//! The host re-emits the hosted side's `debug`/`info`/`error` bridge calls as
//! `tracing` events, so tests observe forwarded logs and fault reports by
//! capturing events rather than reading the bridge mailbox.
//!
//! [`LogCapture::set_default`] installs the capture as the current thread's
//! subscriber. `#[tokio::test]` runs every spawned task on the test thread,
//! so events from spawned actors are captured too.
//!
//! # Example
//!
//! ```rust,ignore
//! use rb_test_utils::LogCapture;
//! use tracing::Level;
//!
//! let logs = LogCapture::new();
//! let _guard = logs.set_default(EnvFilter::new("rb=debug"));
//!
//! client.error("encoder lost").await;
//! host.close().await.unwrap();
//!
//! assert!(logs.contains("rb.hosted", Level::ERROR, "encoder lost"));
//! ```

use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::{EnvFilter, Layer};

/// One captured event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEvent {
    pub level: Level,
    pub target: String,
    pub message: String,
}

/// Layer that keeps every event it sees.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install this capture behind `filter` as the thread's default
    /// subscriber until the guard is dropped.
    #[must_use]
    pub fn set_default(&self, filter: EnvFilter) -> DefaultGuard {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(self.clone());
        tracing::subscriber::set_default(subscriber)
    }

    /// Everything captured so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Events with the given target and level.
    #[must_use]
    pub fn matching(&self, target: &str, level: Level) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.target == target && e.level == level)
            .collect()
    }

    /// Whether an event with `target` and `level` has `needle` in its message.
    #[must_use]
    pub fn contains(&self, target: &str, level: Level, needle: &str) -> bool {
        self.matching(target, level)
            .iter()
            .any(|e| e.message.contains(needle))
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut message = String::new();
        event.record(&mut MessageVisitor(&mut message));

        let metadata = event.metadata();
        self.events.lock().unwrap().push(CapturedEvent {
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message,
        });
    }
}

struct MessageVisitor<'a>(&'a mut String);

impl Visit for MessageVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.0 = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            *self.0 = format!("{value:?}");
        }
    }
}
