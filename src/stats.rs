//! Figures derived from listening data.
//!
//! Everything here is pure: the inputs are responses fetched through
//! [`WebApi`](crate::api::WebApi), the outputs are what the dashboard shows.

use std::{collections::HashMap, fmt, time::Duration};

use crate::{
    protocol::web_api::{Artist, PlayHistory, PlaylistItem, TimeRange, Track},
    util,
};

/// Genres shown in the breakdown.
pub const TOP_GENRES: usize = 10;

/// Tracks shown in the top tracks list.
pub const TOP_TRACKS: usize = 10;

/// Weight decay per rank when scoring genres for the listener personality.
const RANK_DECAY: f64 = 0.8;

/// A genre and how often it occurs among the top tracks.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GenreShare {
    pub genre: String,
    pub count: usize,
    /// Occurrences relative to the number of tracks, rounded. A track with
    /// several artists of the same genre counts more than once, so this can
    /// exceed 100.
    pub percentage: usize,
}

/// Counts genres over the artists of `tracks`.
///
/// Every artist on every track contributes each of its genres once. The
/// result is sorted by count, most frequent first; equal counts keep the
/// order in which the genres were first seen. At most `top` genres are
/// returned.
#[must_use]
pub fn genre_breakdown(
    tracks: &[Track],
    genres: &HashMap<String, Vec<String>>,
    top: usize,
) -> Vec<GenreShare> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for genre in tracks
        .iter()
        .flat_map(|track| &track.artists)
        .filter_map(|artist| artist.id.as_ref())
        .filter_map(|id| genres.get(id))
        .flatten()
        .map(String::as_str)
    {
        match counts.iter_mut().find(|(seen, _)| *seen == genre) {
            Some((_, count)) => *count += 1,
            None => counts.push((genre, 1)),
        }
    }

    // Stable, so ties stay in first-seen order.
    counts.sort_by(|(_, a), (_, b)| b.cmp(a));

    let total = tracks.len().max(1);
    counts
        .into_iter()
        .take(top)
        .map(|(genre, count)| GenreShare {
            genre: genre.to_owned(),
            count,
            percentage: (count * 200 + total) / (2 * total),
        })
        .collect()
}

/// Tracks with at least one artist in `genre`, or all tracks without a
/// genre, limited to the first `limit`.
#[must_use]
pub fn filter_by_genre<'a>(
    tracks: &'a [Track],
    genres: &HashMap<String, Vec<String>>,
    genre: Option<&str>,
    limit: usize,
) -> Vec<&'a Track> {
    tracks
        .iter()
        .filter(|track| {
            let Some(genre) = genre else {
                return true;
            };
            track
                .artists
                .iter()
                .filter_map(|artist| artist.id.as_ref())
                .filter_map(|id| genres.get(id))
                .any(|artist_genres| artist_genres.iter().any(|g| g == genre))
        })
        .take(limit)
        .collect()
}

/// Summary tiles of the dashboard.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListeningStats {
    pub unique_artists: usize,
    pub top_tracks: usize,
    /// Combined length of the top tracks, rounded to whole minutes.
    pub total_minutes: u64,
    pub period: &'static str,
}

impl ListeningStats {
    #[must_use]
    pub fn new(range: TimeRange, top_artists: &[Artist], top_tracks: &[Track]) -> Self {
        let millis: u128 = top_tracks
            .iter()
            .map(|track| track.duration.as_millis())
            .sum();

        Self {
            unique_artists: top_artists.len(),
            top_tracks: top_tracks.len(),
            total_minutes: u64::try_from((millis + 30_000) / 60_000).unwrap_or(u64::MAX),
            period: range.label(),
        }
    }
}

/// Whole minutes of listening in `history`, rounded down.
#[must_use]
pub fn total_minutes(history: &[PlayHistory]) -> u64 {
    util::whole_minutes(history.iter().map(|entry| entry.track.duration).sum())
}

/// Total length of a playlist. Removed or unavailable tracks count as zero.
#[must_use]
pub fn playlist_duration(items: &[PlaylistItem]) -> Duration {
    items.iter().map(PlaylistItem::duration).sum()
}

/// Listener archetype derived from favourite genres.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Personality {
    #[default]
    Enthusiast,
    Confident,
    CreativeSoul,
    DeepThinker,
    FreeSpirit,
    OldSoul,
    Sophisticate,
}

impl Personality {
    /// Archetypes in matching order.
    pub const ALL: [Self; 7] = [
        Self::Enthusiast,
        Self::Confident,
        Self::CreativeSoul,
        Self::DeepThinker,
        Self::FreeSpirit,
        Self::OldSoul,
        Self::Sophisticate,
    ];

    /// Genre keyword that indicates this archetype.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Enthusiast => "pop",
            Self::Confident => "rap",
            Self::CreativeSoul => "rock",
            Self::DeepThinker => "indie",
            Self::FreeSpirit => "dance",
            Self::OldSoul => "classical",
            Self::Sophisticate => "jazz",
        }
    }

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Enthusiast => "The Enthusiast",
            Self::Confident => "The Confident",
            Self::CreativeSoul => "The Creative Soul",
            Self::DeepThinker => "The Deep Thinker",
            Self::FreeSpirit => "The Free Spirit",
            Self::OldSoul => "The Old Soul",
            Self::Sophisticate => "The Sophisticate",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Enthusiast => {
                "You are extroverted, honest, and conventional. Your high self-esteem and \
                 hardworking nature make you reliable and socially confident."
            }
            Self::Confident => {
                "You are outgoing with high self-esteem. Contrary to stereotypes, you are \
                 emotionally balanced and socially adept."
            }
            Self::CreativeSoul => {
                "Despite the energetic nature of your music, you are gentle, creative, and \
                 introspective. You have a rich inner world."
            }
            Self::DeepThinker => {
                "You are introverted, intellectual, and highly creative. Your unique \
                 perspective and innovative thinking set you apart."
            }
            Self::FreeSpirit => {
                "You are outgoing, assertive, and open to new experiences. Your energy and \
                 enthusiasm are contagious."
            }
            Self::OldSoul => {
                "You are introspective and at ease with yourself. Your creativity and \
                 self-awareness make you naturally sophisticated."
            }
            Self::Sophisticate => {
                "You are creative, intelligent, and socially confident. Your appreciation \
                 for complexity shows in your personality."
            }
        }
    }
}

impl fmt::Display for Personality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())
    }
}

/// Picks the archetype best matching `genres`, ranked most listened first.
///
/// The genre at rank `i` adds `0.8^i` to every archetype whose keyword it
/// contains. The highest score wins; on a tie the archetype that scored
/// first wins. Without any match the listener is an
/// [`Enthusiast`](Personality::Enthusiast).
#[must_use]
pub fn listener_personality<S: AsRef<str>>(genres: &[S]) -> Personality {
    let mut scores: Vec<(Personality, f64)> = Vec::new();
    let mut weight = 1.0;
    for genre in genres {
        let genre = genre.as_ref().to_lowercase();
        for personality in Personality::ALL {
            if genre.contains(personality.keyword()) {
                match scores.iter_mut().find(|(p, _)| *p == personality) {
                    Some((_, score)) => *score += weight,
                    None => scores.push((personality, weight)),
                }
            }
        }
        weight *= RANK_DECAY;
    }

    let mut dominant = Personality::default();
    let mut best = 0.0;
    for (personality, score) in scores {
        if score > best {
            best = score;
            dominant = personality;
        }
    }
    dominant
}
