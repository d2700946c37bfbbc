//! Container formats recordings are written in.

use common::types::TrackKind;
use serde::{Deserialize, Serialize};

/// Container a capture pipeline asks the encoder for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    /// WebM (Matroska subset)
    #[default]
    Webm,
}

impl ContainerFormat {
    /// File extension for recordings in this container, without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            ContainerFormat::Webm => "webm",
        }
    }

    /// MIME type requested from the encoder for a track of the given kind.
    #[must_use]
    pub const fn mime_type(self, kind: TrackKind) -> &'static str {
        match (self, kind) {
            (ContainerFormat::Webm, TrackKind::Audio) => "audio/webm",
            (ContainerFormat::Webm, TrackKind::Video) => "video/webm",
        }
    }
}
