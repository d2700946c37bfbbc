//! Secret types for protecting credentials from accidental logging.
//!
//! Re-exports the [`secrecy`] types used for access tokens and API key
//! secrets. `SecretString` implements `Debug` with redaction, so a config
//! struct that derives or hand-writes `Debug` never leaks the value through
//! `{:?}` or `tracing` fields.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct ApiKey {
//!     sid: String,
//!     secret: SecretString,
//! }
//!
//! let key = ApiKey {
//!     sid: "SK123".to_string(),
//!     secret: SecretString::from("shh"),
//! };
//!
//! assert!(!format!("{key:?}").contains("shh"));
//! assert_eq!(key.secret.expose_secret(), "shh");
//! ```
//!
//! Use `SecretString` for:
//! - Precomputed access tokens handed to the session library
//! - API key secrets used to mint access tokens

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
