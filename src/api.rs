//! Spotify Web API operations.
//!
//! Reads go through the [`QueryCache`], so that switching between views
//! within the staleness window does not hit the network again. Playback
//! state and playback commands are live and never cached.
//!
//! A request rejected with `401 Unauthorized` means that the session is
//! dead: the token provider is told to expire it and the error is returned
//! as `Unauthenticated`.

use std::{collections::HashMap, fmt::Debug, sync::Arc, time::Duration};

use futures_util::future::join_all;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use crate::{
    cache::{QueryCache, QueryKey},
    config::Config,
    error::{Error, ErrorKind, Result},
    http,
    protocol::{
        self,
        web_api::{
            Artist, Artists, CursorPage, Page, PlayHistory, PlayRequest, PlaybackState, Playlist,
            PlaylistItem, Recommendations, TimeRange, Track, User,
        },
    },
    session::TokenProvider,
};

pub struct WebApi {
    client: http::Client,
    cache: QueryCache,
    tokens: Arc<dyn TokenProvider>,
    base_url: Url,
}

impl WebApi {
    /// Most ids accepted by the several-artists endpoint.
    pub const ARTIST_BATCH_SIZE: usize = 50;

    /// Tracks of a playlist used to seed its recommendations.
    pub const PLAYLIST_SEED_COUNT: u32 = 5;

    /// Recommendations shown for a playlist.
    pub const PLAYLIST_RECOMMENDATIONS: u32 = 10;

    /// Items per playlist page.
    const PLAYLIST_PAGE_SIZE: u32 = 100;

    /// Playlists per page.
    const PLAYLISTS_PAGE_SIZE: u32 = 50;

    /// Creates a Web API client authenticating with `tokens`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: &Config, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        Ok(Self {
            client: http::Client::new(config)?,
            cache: QueryCache::new(config.stale_time),
            tokens,
            base_url: config.api_url.clone(),
        })
    }

    #[must_use]
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// The current user's profile.
    ///
    /// # Errors
    ///
    /// Returns error if not logged in or the request fails.
    pub async fn profile(&self) -> Result<User> {
        self.cached(QueryKey::new("profile"), "me", &[]).await
    }

    /// The user's most listened tracks over `range`.
    ///
    /// # Errors
    ///
    /// Returns error if not logged in or the request fails.
    pub async fn top_tracks(&self, range: TimeRange, limit: u32) -> Result<Vec<Track>> {
        let page: Page<Track> = self
            .cached(
                QueryKey::new("topTracks")
                    .param("time_range", range.api_value())
                    .param("limit", limit),
                "me/top/tracks",
                &[("time_range", range.api_value().to_owned()), ("limit", limit.to_string())],
            )
            .await?;
        Ok(page.items)
    }

    /// The user's most listened artists over `range`.
    ///
    /// # Errors
    ///
    /// Returns error if not logged in or the request fails.
    pub async fn top_artists(&self, range: TimeRange, limit: u32) -> Result<Vec<Artist>> {
        let page: Page<Artist> = self
            .cached(
                QueryKey::new("topArtists")
                    .param("time_range", range.api_value())
                    .param("limit", limit),
                "me/top/artists",
                &[("time_range", range.api_value().to_owned()), ("limit", limit.to_string())],
            )
            .await?;
        Ok(page.items)
    }

    /// The user's most recently played tracks, newest first.
    ///
    /// # Errors
    ///
    /// Returns error if not logged in or the request fails.
    pub async fn recently_played(&self, limit: u32) -> Result<Vec<PlayHistory>> {
        let page: CursorPage<PlayHistory> = self
            .cached(
                QueryKey::new("recentlyPlayed").param("limit", limit),
                "me/player/recently-played",
                &[("limit", limit.to_string())],
            )
            .await?;
        Ok(page.items)
    }

    /// Full artist objects for `ids`, fetched in batches.
    ///
    /// Ids that Spotify does not know are left out.
    ///
    /// # Errors
    ///
    /// Returns error if not logged in or any batch fails.
    pub async fn artists(&self, ids: &[String]) -> Result<Vec<Artist>> {
        let mut artists = Vec::with_capacity(ids.len());
        for batch in ids.chunks(Self::ARTIST_BATCH_SIZE) {
            let ids = batch.join(",");
            let response: Artists = self
                .cached(
                    QueryKey::new("artists").param("ids", &ids),
                    "artists",
                    &[("ids", ids.clone())],
                )
                .await?;
            artists.extend(response.artists.into_iter().flatten());
        }
        Ok(artists)
    }

    /// Genres of every artist appearing on `tracks`, by artist id.
    ///
    /// # Errors
    ///
    /// Returns error if not logged in or the artists cannot be fetched.
    pub async fn artist_genres(&self, tracks: &[Track]) -> Result<HashMap<String, Vec<String>>> {
        let mut ids: Vec<String> = Vec::new();
        for id in tracks
            .iter()
            .flat_map(|track| &track.artists)
            .filter_map(|artist| artist.id.as_ref())
        {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }

        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        Ok(self
            .artists(&ids)
            .await?
            .into_iter()
            .map(|artist| (artist.id, artist.genres))
            .collect())
    }

    /// The user's playlists.
    ///
    /// # Errors
    ///
    /// Returns error if not logged in or the request fails.
    pub async fn playlists(&self) -> Result<Vec<Playlist>> {
        let page: Page<Playlist> = self
            .cached(
                QueryKey::new("playlists"),
                "me/playlists",
                &[("limit", Self::PLAYLISTS_PAGE_SIZE.to_string())],
            )
            .await?;
        Ok(page.items)
    }

    /// The first `limit` items of a playlist.
    ///
    /// # Errors
    ///
    /// Returns error if not logged in or the request fails.
    pub async fn playlist_tracks(&self, playlist_id: &str, limit: u32) -> Result<Vec<PlaylistItem>> {
        let page: Page<PlaylistItem> = self
            .cached(
                QueryKey::new("playlistTracks")
                    .param("id", playlist_id)
                    .param("limit", limit),
                &format!("playlists/{playlist_id}/tracks"),
                &[("limit", limit.to_string())],
            )
            .await?;
        Ok(page.items)
    }

    /// Total play time of each playlist, by playlist id.
    ///
    /// Playlists are loaded concurrently. A playlist whose items fail to
    /// load is left out rather than failing the whole view.
    pub async fn playlist_durations(&self, playlists: &[Playlist]) -> HashMap<String, Duration> {
        let loads = playlists.iter().map(|playlist| async move {
            let items = self
                .playlist_tracks(&playlist.id, Self::PLAYLIST_PAGE_SIZE)
                .await;
            (playlist, items)
        });

        join_all(loads)
            .await
            .into_iter()
            .filter_map(|(playlist, items)| match items {
                Ok(items) => Some((
                    playlist.id.clone(),
                    crate::stats::playlist_duration(&items),
                )),
                Err(e) => {
                    warn!("skipping duration of playlist {}: {e}", playlist.name);
                    None
                }
            })
            .collect()
    }

    /// Tracks similar to `seed_tracks`.
    ///
    /// Spotify takes at most five seeds; without any seed there is nothing to
    /// recommend and no request is made.
    ///
    /// # Errors
    ///
    /// Returns error if not logged in or the request fails.
    pub async fn recommendations(&self, seed_tracks: &[String], limit: u32) -> Result<Vec<Track>> {
        if seed_tracks.is_empty() {
            return Ok(Vec::new());
        }

        let seeds = seed_tracks.join(",");
        let response: Recommendations = self
            .cached(
                QueryKey::new("recommendations")
                    .param("seed_tracks", &seeds)
                    .param("limit", limit),
                "recommendations",
                &[("seed_tracks", seeds.clone()), ("limit", limit.to_string())],
            )
            .await?;
        Ok(response.tracks)
    }

    /// Recommendations seeded with the first tracks of a playlist.
    ///
    /// # Errors
    ///
    /// Returns error if not logged in or a request fails.
    pub async fn playlist_recommendations(&self, playlist_id: &str) -> Result<Vec<Track>> {
        let seeds: Vec<String> = self
            .playlist_tracks(playlist_id, Self::PLAYLIST_SEED_COUNT)
            .await?
            .into_iter()
            .filter_map(|item| item.track.and_then(|track| track.id))
            .collect();

        self.recommendations(&seeds, Self::PLAYLIST_RECOMMENDATIONS)
            .await
    }

    /// What is playing right now, or `None` without an active device.
    ///
    /// # Errors
    ///
    /// Returns error if not logged in or the request fails.
    pub async fn playback_state(&self) -> Result<Option<PlaybackState>> {
        let url = self.url("me/player", &[])?;
        let token = self.tokens.access_token()?;
        let response = self
            .send(self.client.get(url, token.as_str())?)
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Ok(None);
        }

        let value: serde_json::Value = serde_json::from_slice(&body)?;
        protocol::from_value(value, "playback state").map(Some)
    }

    /// Resumes playback on the active device.
    ///
    /// # Errors
    ///
    /// Returns error if not logged in or the command fails.
    pub async fn play(&self) -> Result<()> {
        self.command(|url, token| self.client.put(url, token), "me/player/play")
            .await
    }

    /// Pauses playback on the active device.
    ///
    /// # Errors
    ///
    /// Returns error if not logged in or the command fails.
    pub async fn pause(&self) -> Result<()> {
        self.command(|url, token| self.client.put(url, token), "me/player/pause")
            .await
    }

    /// Pauses if `state` is playing, resumes otherwise.
    ///
    /// Returns whether playback is now running.
    ///
    /// # Errors
    ///
    /// Returns error if not logged in or the command fails.
    pub async fn toggle_playback(&self, state: Option<&PlaybackState>) -> Result<bool> {
        if state.is_some_and(|state| state.is_playing) {
            self.pause().await?;
            Ok(false)
        } else {
            self.play().await?;
            Ok(true)
        }
    }

    /// Skips to the next track.
    ///
    /// # Errors
    ///
    /// Returns error if not logged in or the command fails.
    pub async fn next(&self) -> Result<()> {
        self.command(|url, token| self.client.post(url, token), "me/player/next")
            .await
    }

    /// Skips to the previous track.
    ///
    /// # Errors
    ///
    /// Returns error if not logged in or the command fails.
    pub async fn previous(&self) -> Result<()> {
        self.command(|url, token| self.client.post(url, token), "me/player/previous")
            .await
    }

    /// Plays `uris` in order on the active device.
    ///
    /// # Errors
    ///
    /// Returns error if `uris` is empty, not logged in or the command fails.
    pub async fn play_uris(&self, uris: &[String]) -> Result<()> {
        if uris.is_empty() {
            return Err(Error::invalid_argument("nothing to play"));
        }

        let body = PlayRequest {
            uris: Some(uris.to_vec()),
            ..PlayRequest::default()
        };
        self.command(
            |url, token| self.client.put_json(url, token, &body),
            "me/player/play",
        )
        .await
    }

    /// Plays an album, artist or playlist by its URI.
    ///
    /// # Errors
    ///
    /// Returns error if not logged in or the command fails.
    pub async fn play_context(&self, context_uri: &str) -> Result<()> {
        let body = PlayRequest {
            context_uri: Some(context_uri.to_owned()),
            ..PlayRequest::default()
        };
        self.command(
            |url, token| self.client.put_json(url, token, &body),
            "me/player/play",
        )
        .await
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let mut url = self.base_url.join(path)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }
        Ok(url)
    }

    /// Executes `request`, expiring the session if the token is rejected.
    async fn send(&self, request: reqwest::Request) -> Result<reqwest::Response> {
        match self.client.execute(request).await {
            Err(e) if e.kind == ErrorKind::Unauthenticated => {
                warn!("access token rejected, ending session");
                self.tokens.expire();
                Err(e)
            }
            result => result,
        }
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<serde_json::Value> {
        let url = self.url(path, query)?;
        let token = self.tokens.access_token()?;
        let response = self.send(self.client.get(url, token.as_str())?).await?;
        Ok(response.json().await?)
    }

    async fn cached<T>(&self, key: QueryKey, path: &str, query: &[(&str, String)]) -> Result<T>
    where
        T: DeserializeOwned + Debug,
    {
        let origin = key.resource;
        let value = self
            .cache
            .get_or_fetch(key, || self.get_json(path, query))
            .await?;
        protocol::from_value(value, origin)
    }

    async fn command<F>(&self, build: F, path: &str) -> Result<()>
    where
        F: FnOnce(Url, &str) -> Result<reqwest::Request>,
    {
        let url = self.url(path, &[])?;
        let token = self.tokens.access_token()?;
        self.send(build(url, token.as_str())?).await?;
        debug!("{path}: done");
        Ok(())
    }
}
