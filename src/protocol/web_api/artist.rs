//! Artists and their genres.
//!
//! Tracks embed simplified artists (id and name). Genres are only available
//! on full artist objects, fetched in batches:
//!
//! ```json
//! {
//!     "artists": [
//!         { "id": "0gxyHStUsqpMadRV0Di1Qt", "name": "Rick Astley", "genres": ["dance pop"], "images": [], "popularity": 70 },
//!         null
//!     ]
//! }
//! ```
//!
//! Unknown ids come back as `null`.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};

use super::Image;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct SimplifiedArtist {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub popularity: Option<u32>,
}

/// Response of the several-artists endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Artists {
    #[serde(default)]
    pub artists: Vec<Option<Artist>>,
}
