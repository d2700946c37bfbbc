//! # Recording Bot Test Utilities
//!
//! Mocks and fixtures for testing the recorder without a real session
//! library, encoder or browser.
//!
//! ## Modules
//!
//! - `mock_session` - Scriptable session library (connect modes, events)
//! - `mock_encoder` - Encoder factory fed with bytes by the test
//! - `mock_hosting` - Hosting environment that records the calls it receives
//! - `fixtures` - Participants, tracks and capture profiles
//! - `log_capture` - `tracing` layer recording events for assertions
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rb_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let encoders = MockEncoderFactory::new();
//!     let alice = TestParticipant::new("PA1").with_audio("MT1");
//!
//!     let connector = MockSessionConnector::builder()
//!         .session_sid("RM1")
//!         .with_participant(alice.build())
//!         .encoders(encoders.clone())
//!         .build();
//!     let controller = connector.controller();
//!
//!     // Run the recorder against `connector`, then drive it:
//!     encoders.feed("MT1", b"chunk".as_slice());
//!     controller.subscribe("PA1", alice.track("MT1"));
//! }
//! ```

pub mod fixtures;
pub mod log_capture;
pub mod mock_encoder;
pub mod mock_hosting;
pub mod mock_session;

// Re-export commonly used items
pub use fixtures::*;
pub use log_capture::*;
pub use mock_encoder::*;
pub use mock_hosting::*;
pub use mock_session::*;
