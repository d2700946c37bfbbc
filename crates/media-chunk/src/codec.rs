//! String-safe codec for chunk bytes.
//!
//! The bridge between the session-hosting side and the host only carries text,
//! so chunk bytes travel as standard (padded) base64. Both directions work in
//! bounded windows so no single call into the base64 engine sees more than a
//! few kilobytes, while still producing one contiguous text per chunk.
//!
//! The encode window is a multiple of 3 bytes, so every window except the last
//! encodes without padding and the concatenation is itself valid base64. The
//! decode window is a multiple of 4 characters for the same reason.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;

/// Bytes encoded per window. Must stay a multiple of 3.
const ENCODE_WINDOW: usize = 3 * 4096;

/// Characters decoded per window. Must stay a multiple of 4.
const DECODE_WINDOW: usize = 4 * 4096;

/// Largest decoded chunk accepted from the transport (16 MiB).
///
/// A 100ms slice of even high bitrate video is a few hundred kilobytes, so
/// anything near this size is a corrupted or hostile message.
pub const MAX_CHUNK_BYTES: usize = 16 * 1024 * 1024;

/// Error type for codec operations
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    /// Text is not valid base64
    #[error("Malformed chunk text: {0}")]
    Malformed(String),

    /// Decoded chunk would exceed `MAX_CHUNK_BYTES`
    #[error("Chunk too large: {0} bytes of text")]
    TooLarge(usize),
}

/// Encode chunk bytes as string-safe text.
///
/// Never fails; an empty input yields an empty string.
#[must_use]
pub fn encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(encoded_len(data.len()));
    for window in data.chunks(ENCODE_WINDOW) {
        STANDARD.encode_string(window, &mut out);
    }
    out
}

/// Decode text produced by [`encode`] back into the original bytes.
///
/// # Errors
///
/// Returns `CodecError::TooLarge` if the text would decode to more than
/// `MAX_CHUNK_BYTES`, and `CodecError::Malformed` if it is not valid padded
/// base64.
pub fn decode(text: &str) -> Result<Bytes, CodecError> {
    if text.len() > encoded_len(MAX_CHUNK_BYTES) {
        return Err(CodecError::TooLarge(text.len()));
    }
    if text.len() % 4 != 0 {
        return Err(CodecError::Malformed(format!(
            "length {} is not a multiple of 4",
            text.len()
        )));
    }

    let mut out = Vec::with_capacity(text.len() / 4 * 3);
    for window in text.as_bytes().chunks(DECODE_WINDOW) {
        STANDARD
            .decode_vec(window, &mut out)
            .map_err(|e| CodecError::Malformed(e.to_string()))?;
    }
    Ok(Bytes::from(out))
}

/// Length of the padded base64 text for `len` input bytes.
const fn encoded_len(len: usize) -> usize {
    len.div_ceil(3) * 4
}
