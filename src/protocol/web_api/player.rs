//! Playback state and playback requests.
//!
//! `GET /me/player` answers `204 No Content` when no device is active; that
//! case never reaches these types.
//!
//! # Wire Format
//!
//! ```json
//! {
//!     "is_playing": true,
//!     "progress_ms": 42000,
//!     "item": { ... },
//!     "device": { "name": "Kitchen", "volume_percent": 65 }
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, skip_serializing_none, DurationMilliSeconds};

use super::track::Track;

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct PlaybackState {
    pub is_playing: bool,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(rename = "progress_ms")]
    pub progress: Option<Duration>,
    /// `None` while an ad or an unsupported item plays.
    #[serde(default)]
    pub item: Option<Track>,
    #[serde(default)]
    pub device: Option<Device>,
}

impl PlaybackState {
    /// Playback position as a fraction of the track length, in `0.0..=1.0`.
    #[must_use]
    pub fn progress_ratio(&self) -> f64 {
        match (&self.item, self.progress) {
            (Some(track), Some(progress)) if !track.duration.is_zero() => {
                (progress.as_secs_f64() / track.duration.as_secs_f64()).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Device {
    pub name: String,
    #[serde(default)]
    pub volume_percent: Option<u8>,
}

/// Body of `PUT /me/player/play`.
///
/// An empty request resumes playback; `uris` plays the given tracks;
/// `context_uri` plays an album or playlist.
#[skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct PlayRequest {
    pub uris: Option<Vec<String>>,
    pub context_uri: Option<String>,
}
