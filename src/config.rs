//! Client configuration.
//!
//! A [`Config`] is built from a TOML file holding the Spotify application
//! credentials and optional tuning:
//!
//! ```toml
//! client_id = "0123456789abcdef0123456789abcdef"
//! redirect_uri = "http://127.0.0.1:8888/callback"
//!
//! # Optional
//! stale_time = 300              # seconds
//! retries = 3
//! retry_delay = 1000            # milliseconds
//! session_poll_interval = 1000  # milliseconds
//! ```

use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use url::Url;

use crate::error::{Error, Result};

/// Scopes requested when none are configured.
pub const DEFAULT_SCOPES: [&str; 9] = [
    "user-read-private",
    "user-read-email",
    "user-top-read",
    "user-read-recently-played",
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-read-currently-playing",
    "playlist-read-private",
    "playlist-read-collaborative",
];

/// Spotify authorization endpoint.
pub const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";

/// Spotify Web API base. The trailing slash matters for joining paths.
pub const API_URL: &str = "https://api.spotify.com/v1/";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub app_name: String,
    pub app_version: String,
    pub user_agent: String,

    pub client_id: String,
    pub redirect_uri: Url,
    pub scopes: Vec<String>,
    /// Ask Spotify to show the consent dialog even when already granted.
    pub show_dialog: bool,

    pub authorize_url: Url,
    pub api_url: Url,

    /// How long a cached response is served before it is refetched.
    ///
    /// The cache counts whole seconds; shorter windows are served for one
    /// second.
    pub stale_time: Duration,
    /// Retries after the first attempt of a request that failed
    /// transiently.
    pub retries: u8,
    /// Fixed delay between retries.
    pub retry_delay: Duration,

    pub session_poll_interval: Duration,
    pub now_playing_poll_interval: Duration,
}

/// On-disk form of [`Config`]. Everything but the credentials is optional.
#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    client_id: String,
    redirect_uri: Url,
    scopes: Option<Vec<String>>,
    show_dialog: Option<bool>,
    authorize_url: Option<Url>,
    api_url: Option<Url>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    stale_time: Option<Duration>,
    retries: Option<u8>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    retry_delay: Option<Duration>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    session_poll_interval: Option<Duration>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    now_playing_poll_interval: Option<Duration>,
}

impl Config {
    pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(5 * 60);
    pub const DEFAULT_RETRIES: u8 = 3;
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

    /// The configuration file should hold a handful of short settings.
    const MAX_FILE_SIZE: u64 = 16 * 1024;

    /// Creates a configuration with default endpoints and tuning.
    ///
    /// # Errors
    ///
    /// Will return `Err` if:
    /// - `client_id` is empty or not alphanumeric
    /// - `redirect_uri` is not an `http` or `https` URL
    /// - no valid `User-Agent` can be built from the package and OS
    pub fn new(client_id: impl Into<String>, redirect_uri: Url) -> Result<Self> {
        let client_id = client_id.into();
        if client_id.is_empty() || !client_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::invalid_argument(format!(
                "client id \"{client_id}\" is invalid"
            )));
        }

        if !matches!(redirect_uri.scheme(), "http" | "https") {
            return Err(Error::invalid_argument(format!(
                "redirect uri {redirect_uri} must be http or https"
            )));
        }

        let app_name = env!("CARGO_PKG_NAME").to_owned();
        let app_version = env!("CARGO_PKG_VERSION").to_owned();
        let user_agent = Self::user_agent(&app_name, &app_version)?;
        trace!("user agent: {user_agent}");

        Ok(Self {
            app_name,
            app_version,
            user_agent,

            client_id,
            redirect_uri,
            scopes: DEFAULT_SCOPES.iter().map(ToString::to_string).collect(),
            show_dialog: true,

            authorize_url: Url::parse(AUTHORIZE_URL)?,
            api_url: Url::parse(API_URL)?,

            stale_time: Self::DEFAULT_STALE_TIME,
            retries: Self::DEFAULT_RETRIES,
            retry_delay: Self::DEFAULT_RETRY_DELAY,

            session_poll_interval: Self::DEFAULT_POLL_INTERVAL,
            now_playing_poll_interval: Self::DEFAULT_POLL_INTERVAL,
        })
    }

    /// Loads the configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the file is missing, too large, not valid TOML,
    /// or holds invalid settings.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Prevent out-of-memory condition: the file should be small.
        let file_size = fs::metadata(path)?.len();
        if file_size > Self::MAX_FILE_SIZE {
            return Err(Error::invalid_argument(format!(
                "{} is too large",
                path.display()
            )));
        }

        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parses the configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the text is not valid TOML or holds invalid
    /// settings.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents)?;
        let mut config = Self::new(file.client_id, file.redirect_uri)?;

        if let Some(scopes) = file.scopes {
            config.scopes = scopes;
        }
        if let Some(show_dialog) = file.show_dialog {
            config.show_dialog = show_dialog;
        }
        if let Some(url) = file.authorize_url {
            config.authorize_url = url;
        }
        if let Some(url) = file.api_url {
            config.api_url = with_trailing_slash(url);
        }
        if let Some(stale_time) = file.stale_time {
            config.stale_time = stale_time;
        }
        if let Some(retries) = file.retries {
            config.retries = retries;
        }
        if let Some(delay) = file.retry_delay {
            config.retry_delay = delay;
        }
        if let Some(interval) = file.session_poll_interval {
            config.session_poll_interval = interval;
        }
        if let Some(interval) = file.now_playing_poll_interval {
            config.now_playing_poll_interval = interval;
        }

        if config.session_poll_interval.is_zero() || config.now_playing_poll_interval.is_zero() {
            return Err(Error::invalid_argument("poll intervals must not be zero"));
        }
        if config.stale_time.is_zero() {
            return Err(Error::invalid_argument("stale time must not be zero"));
        }

        Ok(config)
    }

    /// Points the Web API at another base URL, for example a mock server.
    #[must_use]
    pub fn with_api_url(mut self, url: Url) -> Self {
        self.api_url = with_trailing_slash(url);
        self
    }

    fn user_agent(app_name: &str, app_version: &str) -> Result<String> {
        let illegal_chars = |chr| chr == '/' || chr == ';';
        if app_name.is_empty()
            || app_name.contains(illegal_chars)
            || app_version.is_empty()
            || app_version.contains(illegal_chars)
        {
            return Err(Error::internal(format!(
                "application name and/or version invalid (\"{app_name}\"; \"{app_version}\")"
            )));
        }

        let os_name = match std::env::consts::OS {
            "macos" => "osx",
            other => other,
        };
        let os_version = sysinfo::System::os_version()
            .filter(|version| !version.is_empty() && !version.contains(illegal_chars))
            .unwrap_or_else(|| String::from("0"));

        Ok(format!(
            "{app_name}/{app_version} (Rust; {os_name}/{os_version})"
        ))
    }
}

/// `Url::join` drops the last path segment unless it ends in a slash.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
