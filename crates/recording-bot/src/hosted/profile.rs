//! Capture settings delivered to the hosted side in the bundle.

use media_chunk::ContainerFormat;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Current bundle format version.
pub const PROFILE_VERSION: u32 = 1;

/// Default capture timeslice.
pub const DEFAULT_TIMESLICE_MS: u64 = 100;

/// Capture settings served at `/bundle.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureProfile {
    pub version: u32,
    pub timeslice_ms: u64,
    pub container: ContainerFormat,
    /// File extension of recordings, without the dot.
    pub extension: String,
    /// Pair video-only streams with a silent audio track.
    pub silent_audio_for_video: bool,
}

impl Default for CaptureProfile {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_TIMESLICE_MS))
    }
}

impl CaptureProfile {
    #[must_use]
    pub fn new(timeslice: Duration) -> Self {
        let container = ContainerFormat::default();
        Self {
            version: PROFILE_VERSION,
            timeslice_ms: u64::try_from(timeslice.as_millis()).unwrap_or(DEFAULT_TIMESLICE_MS),
            container,
            extension: container.extension().to_string(),
            silent_audio_for_video: true,
        }
    }

    #[must_use]
    pub fn timeslice(&self) -> Duration {
        Duration::from_millis(self.timeslice_ms)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile() {
        let profile = CaptureProfile::default();
        assert_eq!(profile.timeslice(), Duration::from_millis(100));
        assert_eq!(profile.container, ContainerFormat::Webm);
        assert_eq!(profile.extension, "webm");
        assert!(profile.silent_audio_for_video);
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(CaptureProfile::new(Duration::from_millis(250))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "version": 1,
                "timeslice_ms": 250,
                "container": "webm",
                "extension": "webm",
                "silent_audio_for_video": true
            })
        );
    }
}
