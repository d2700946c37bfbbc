//! The unit of captured media.

use bytes::Bytes;
use std::time::Duration;

/// One time slice of encoded media belonging to a single recording.
///
/// Chunks are produced in strictly increasing `sequence` order by a capture
/// pipeline and must be appended to their file in that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaChunk {
    /// Position in the recording, starting at 1
    pub sequence: u64,
    /// Capture time relative to the start of the recording
    pub offset: Duration,
    /// Encoded container bytes (never empty)
    pub data: Bytes,
}

impl MediaChunk {
    /// Create a chunk, or `None` for an empty slice.
    ///
    /// Zero-length slices carry no media and are discarded at the source.
    #[must_use]
    pub fn new(sequence: u64, offset: Duration, data: Bytes) -> Option<Self> {
        if data.is_empty() {
            return None;
        }
        Some(Self {
            sequence,
            offset,
            data,
        })
    }

    /// Size of the chunk payload in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false; empty chunks cannot be constructed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Encode the payload for the text-only transport.
    #[must_use]
    pub fn encode(&self) -> String {
        crate::codec::encode(&self.data)
    }
}
