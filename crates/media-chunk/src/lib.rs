//! Media chunks for the recording bot.
//!
//! This crate holds the unit of captured media (`MediaChunk`), the container
//! format a recording is written in, and the codec that carries chunk bytes
//! across a text-only transport without loss.

#![warn(clippy::pedantic)]

pub mod chunk;
pub mod codec;
pub mod format;

pub use chunk::MediaChunk;
pub use codec::{decode, encode, CodecError, MAX_CHUNK_BYTES};
pub use format::ContainerFormat;
