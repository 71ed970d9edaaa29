//! Tracks, albums and listening history.
//!
//! # Wire Format
//!
//! ```json
//! {
//!     "id": "4uLU6hMCjMI75M1A2tKUQC",
//!     "name": "Never Gonna Give You Up",
//!     "duration_ms": 213573,
//!     "preview_url": null,
//!     "uri": "spotify:track:4uLU6hMCjMI75M1A2tKUQC",
//!     "artists": [{ "id": "0gxyHStUsqpMadRV0Di1Qt", "name": "Rick Astley" }],
//!     "album": { "name": "Whenever You Need Somebody", "images": [ ... ] }
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull, DurationMilliSeconds};
use url::Url;

use super::{artist::SimplifiedArtist, Image};

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Track {
    /// Absent for local files.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "duration_ms")]
    pub duration: Duration,
    #[serde(default)]
    pub preview_url: Option<Url>,
    pub uri: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub artists: Vec<SimplifiedArtist>,
    #[serde(default)]
    pub album: Option<Album>,
}

impl Track {
    /// Artist names joined with commas, as shown next to the title.
    #[must_use]
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|artist| artist.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The first, largest, album image.
    #[must_use]
    pub fn cover(&self) -> Option<&Url> {
        self.album
            .as_ref()
            .and_then(|album| album.images.first())
            .map(|image| &image.url)
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Album {
    pub name: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub images: Vec<Image>,
}

/// An entry of the recently played list.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct PlayHistory {
    pub track: Track,
    /// ISO 8601 timestamp, kept as sent.
    pub played_at: String,
}

/// Response of the recommendations endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Recommendations {
    #[serde(default)]
    pub tracks: Vec<Track>,
}
