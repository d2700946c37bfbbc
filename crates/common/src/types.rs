//! Identifiers for sessions, participants and tracks.
//!
//! The real-time session library hands out opaque string identifiers ("sids").
//! They are wrapped in newtypes so a participant sid can never be passed where
//! a track sid is expected, and so they can be used directly as path segments
//! of a recording file.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

macro_rules! sid_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a sid issued by the session library.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the raw sid.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

sid_type!(
    /// Identifier of one real-time session (room) instance.
    SessionSid
);

sid_type!(
    /// Identifier of a participant, local or remote.
    ParticipantSid
);

sid_type!(
    /// Identifier of a published track. Stable across re-subscription.
    TrackSid
);

/// Kind of a recordable media track.
///
/// Data tracks are never recorded and have no `TrackKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Audio track
    Audio,
    /// Video track
    Video,
}

impl TrackKind {
    /// Returns the kind as a lowercase string for logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TrackKind::Audio => "audio",
            TrackKind::Video => "video",
        }
    }

    /// Human readable class name used in progress logs.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            TrackKind::Audio => "RemoteAudioTrack",
            TrackKind::Video => "RemoteVideoTrack",
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a track kind string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("not a recordable track kind: {0}")]
pub struct UnrecordableKind(pub String);

impl std::str::FromStr for TrackKind {
    type Err = UnrecordableKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audio" => Ok(TrackKind::Audio),
            "video" => Ok(TrackKind::Video),
            other => Err(UnrecordableKind(other.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sid_display_is_raw_value() {
        let sid = TrackSid::new("MT0123");
        assert_eq!(sid.to_string(), "MT0123");
        assert_eq!(sid.as_str(), "MT0123");
    }

    #[test]
    fn test_sid_serializes_transparently() {
        let sid = ParticipantSid::from("PA42");
        let json = serde_json::to_string(&sid).unwrap();
        assert_eq!(json, "\"PA42\"");
    }

    #[test]
    fn test_track_kind_parse() {
        assert_eq!("audio".parse::<TrackKind>(), Ok(TrackKind::Audio));
        assert_eq!("video".parse::<TrackKind>(), Ok(TrackKind::Video));
        assert_eq!(
            "data".parse::<TrackKind>(),
            Err(UnrecordableKind("data".to_string()))
        );
    }

    #[test]
    fn test_track_kind_display_names() {
        assert_eq!(TrackKind::Audio.display_name(), "RemoteAudioTrack");
        assert_eq!(TrackKind::Video.display_name(), "RemoteVideoTrack");
    }
}
