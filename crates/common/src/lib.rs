//! Common types shared across the recording bot crates.

#![warn(clippy::pedantic)]

/// Module for session, participant and track identifiers
pub mod types;

/// Module for secret types that prevent accidental logging
pub mod secret;
