//! Spotify Web API types.
//!
//! * [`user`] - the current user's profile
//! * [`track`] - tracks, albums and listening history
//! * [`artist`] - artists and their genres
//! * [`playlist`] - playlists and their items
//! * [`player`] - playback state and playback requests
//!
//! # Pagination
//!
//! Collection endpoints wrap their items in a page:
//!
//! ```json
//! {
//!     "href": "https://api.spotify.com/v1/me/top/tracks?offset=0&limit=50",
//!     "items": [ ... ],
//!     "limit": 50,
//!     "next": null,
//!     "offset": 0,
//!     "previous": null,
//!     "total": 50
//! }
//! ```
//!
//! Recently played tracks use cursors instead of offsets; [`CursorPage`]
//! covers those.

pub mod artist;
pub mod player;
pub mod playlist;
pub mod track;
pub mod user;

pub use artist::{Artist, Artists, SimplifiedArtist};
pub use player::{Device, PlaybackState, PlayRequest};
pub use playlist::{Playlist, PlaylistItem, PlaylistTracksRef};
pub use track::{Album, PlayHistory, Recommendations, Track};
pub use user::User;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;

/// An offset-based page of items.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub total: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
    #[serde(default)]
    pub next: Option<Url>,
}

/// A cursor-based page of items.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct CursorPage<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub next: Option<Url>,
}

/// Cover art or profile picture.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Image {
    pub url: Url,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// Error body returned with unsuccessful responses.
///
/// ```json
/// { "error": { "status": 401, "message": "The access token expired" } }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub message: String,
}

/// Period over which top items are computed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    LastWeek,
    #[default]
    ShortTerm,
    MediumTerm,
    LongTerm,
}

impl TimeRange {
    pub const ALL: [Self; 4] = [
        Self::LastWeek,
        Self::ShortTerm,
        Self::MediumTerm,
        Self::LongTerm,
    ];

    /// The `time_range` parameter sent to Spotify.
    ///
    /// Spotify has no weekly range; `LastWeek` falls back to the shortest
    /// one it offers.
    #[must_use]
    pub fn api_value(self) -> &'static str {
        match self {
            Self::LastWeek | Self::ShortTerm => "short_term",
            Self::MediumTerm => "medium_term",
            Self::LongTerm => "long_term",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::LastWeek => "Last Week",
            Self::ShortTerm => "Last 4 Weeks",
            Self::MediumTerm => "Last 6 Months",
            Self::LongTerm => "All Time",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LastWeek => "last_week",
            Self::ShortTerm => "short_term",
            Self::MediumTerm => "medium_term",
            Self::LongTerm => "long_term",
        };
        write!(f, "{name}")
    }
}

impl FromStr for TimeRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|range| range.to_string() == s)
            .ok_or_else(|| Error::invalid_argument(format!("unknown time range \"{s}\"")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_range_round_trips_through_str() {
        for range in TimeRange::ALL {
            assert_eq!(range.to_string().parse::<TimeRange>().unwrap(), range);
        }
        assert!("yesterday".parse::<TimeRange>().is_err());
    }

    #[test]
    fn last_week_is_requested_as_short_term() {
        assert_eq!(TimeRange::LastWeek.api_value(), "short_term");
        assert_eq!(TimeRange::LastWeek.label(), "Last Week");
        assert_eq!(TimeRange::MediumTerm.label(), "Last 6 Months");
    }

    #[test]
    fn page_tolerates_missing_items() {
        let page: Page<u32> = serde_json::from_str(r#"{"total": 0}"#).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, Some(0));
    }
}
