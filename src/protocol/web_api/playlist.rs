//! Playlists and their items.
//!
//! # Wire Format
//!
//! ```json
//! {
//!     "id": "37i9dQZF1DXcBWIGoYBM5M",
//!     "name": "Today's Top Hits",
//!     "description": "",
//!     "images": null,
//!     "tracks": { "href": "https://api.spotify.com/v1/playlists/37i9dQZF1DXcBWIGoYBM5M/tracks", "total": 50 },
//!     "owner": { "display_name": "Spotify" },
//!     "uri": "spotify:playlist:37i9dQZF1DXcBWIGoYBM5M"
//! }
//! ```
//!
//! Playlist items may have a `null` track when the track was removed from
//! the catalog.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull, NoneAsEmptyString};
use url::Url;

use super::{track::Track, Image};

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub description: Option<String>,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub images: Vec<Image>,
    pub tracks: PlaylistTracksRef,
    #[serde(default)]
    pub owner: Option<Owner>,
    pub uri: String,
}

impl Playlist {
    /// The description, falling back to "By {owner}".
    #[must_use]
    pub fn subtitle(&self) -> String {
        match (&self.description, &self.owner) {
            (Some(description), _) => description.clone(),
            (None, Some(Owner { display_name: Some(owner) })) => format!("By {owner}"),
            (None, _) => String::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct PlaylistTracksRef {
    pub href: Url,
    pub total: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Owner {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct PlaylistItem {
    #[serde(default)]
    pub track: Option<Track>,
}

impl PlaylistItem {
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.track
            .as_ref()
            .map_or(Duration::ZERO, |track| track.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtitle_falls_back_to_owner() {
        let json = r#"{
            "id": "p1",
            "name": "Mix",
            "description": "",
            "images": null,
            "tracks": { "href": "https://api.spotify.com/v1/playlists/p1/tracks", "total": 3 },
            "owner": { "display_name": "alice" },
            "uri": "spotify:playlist:p1"
        }"#;
        let playlist: Playlist = serde_json::from_str(json).unwrap();
        assert!(playlist.description.is_none());
        assert!(playlist.images.is_empty());
        assert_eq!(playlist.subtitle(), "By alice");
    }

    #[test]
    fn removed_tracks_have_no_duration() {
        let item: PlaylistItem = serde_json::from_str(r#"{"track": null}"#).unwrap();
        assert_eq!(item.duration(), Duration::ZERO);
    }
}
