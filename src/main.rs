use std::{
    error::Error,
    ops::ControlFlow,
    process,
    sync::{Arc, Mutex},
    time::Duration,
};

use clap::{command, Parser, Subcommand, ValueHint};
use log::{debug, error, info, warn, LevelFilter};
use url::Url;

use spotistat::{
    api::WebApi,
    auth::{Authorizer, LOGIN_REDIRECT_DELAY},
    config::Config,
    error::{self, ErrorKind},
    protocol::web_api::{PlaybackState, TimeRange, Track},
    schedule::Poller,
    session::{SessionGuard, TokenProvider},
    share::ShareLinks,
    stats,
    store::{FileStore, KeyValueStore},
    util,
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when not built release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Items requested for top lists and statistics.
const TOP_LIMIT: u32 = 50;

/// Entries of the recently played list.
const RECENTLY_PLAYED_LIMIT: u32 = 50;

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    ///
    /// Holds the Spotify client id and redirect URI of your application,
    /// and optional tuning.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath, default_value_t = String::from("spotistat.toml"))]
    config: String,

    /// Session file
    ///
    /// Keep this file private: while the session lasts, it grants access to
    /// your Spotify account.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath, default_value_t = String::from("session.toml"))]
    session: String,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Subcommand)]
enum Command {
    /// Print the URL to log in with
    Login,

    /// Complete login with the URL the browser was redirected to
    Callback {
        #[arg(value_hint = ValueHint::Url)]
        url: Url,
    },

    /// End the session
    Logout,

    /// Show whether a session is active
    Status,

    /// Listening overview
    Dashboard {
        /// Period to compute top items over
        #[arg(short, long, default_value_t)]
        range: TimeRange,

        /// Only list top tracks in this genre
        #[arg(short, long)]
        genre: Option<String>,
    },

    /// Most listened tracks
    TopTracks {
        #[arg(short, long, default_value_t)]
        range: TimeRange,
    },

    /// Most listened artists
    TopArtists {
        #[arg(short, long, default_value_t)]
        range: TimeRange,
    },

    /// Your playlists and how long they play
    Playlists,

    /// Tracks similar to the start of a playlist
    Recommend { playlist_id: String },

    /// What is playing on the active device
    NowPlaying {
        /// Keep refreshing until interrupted
        #[arg(short, long, default_value_t = false)]
        watch: bool,
    },

    /// Resume playback, or play tracks or a context
    Play {
        /// Track URIs to play, in order
        #[arg(long = "uri", value_name = "URI", conflicts_with = "context")]
        uris: Vec<String>,

        /// Album, artist or playlist URI to play
        #[arg(long, value_name = "URI")]
        context: Option<String>,
    },

    /// Pause playback
    Pause,

    /// Pause when playing, resume when paused
    Toggle,

    /// Skip to the next track
    Next,

    /// Skip to the previous track
    Previous,

    /// Print links to share a track
    Share {
        track_id: String,

        /// Title in the post text
        #[arg(long)]
        title: Option<String>,

        /// Description in the post text, e.g. the artist
        #[arg(long)]
        description: Option<String>,
    },
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence from
/// highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
///
/// # Panics
///
/// Panics when a logger facade is already initialized.
fn init_logger(config: &Args) {
    let mut logger = env_logger::Builder::from_env(
        // Note: if you change the default logging level here, then you should
        // probably also change the verbosity levels below.
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if config.quiet || config.verbose > 0 {
        let level = match config.verbose {
            0 => {
                // Quiet and verbose are mutually exclusive, and `verbose` is 0
                // by default. So this arm means: quiet mode.
                LevelFilter::Warn
            }
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of external crates.
        logger.filter_module(module_path!(), level);
    }

    logger.init();
}

/// Everything a command needs.
struct Context {
    config: Config,
    session: Arc<SessionGuard>,
    authorizer: Authorizer,
    api: Arc<WebApi>,
}

impl Context {
    fn new(args: &Args) -> error::Result<Self> {
        let config = Config::from_file(&args.config).inspect_err(|e| {
            if e.kind == ErrorKind::NotFound {
                info!("copy spotistat.toml.example to {} and fill in your client id", args.config);
            }
        })?;

        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&args.session)?);
        let session = Arc::new(SessionGuard::new(Arc::clone(&store))?);
        let authorizer = Authorizer::new(&config, store, Arc::clone(&session));
        let tokens: Arc<dyn TokenProvider> = session.clone();
        let api = Arc::new(WebApi::new(&config, tokens)?);

        Ok(Self {
            config,
            session,
            authorizer,
            api,
        })
    }

    fn print_login_url(&self) -> error::Result<()> {
        println!("Open this URL in your browser to log in:");
        println!("{}", self.authorizer.authorize_url()?);
        println!("Then run `spotistat callback <URL>` with the URL you were redirected to.");
        Ok(())
    }
}

/// Shows a failed section inline and carries on, unless the session is gone.
fn inline<T>(what: &str, result: error::Result<T>) -> error::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind == ErrorKind::Unauthenticated => Err(e),
        Err(e) => {
            warn!("{what}: {e}");
            println!("Failed to load {what}. Please try again later.");
            Ok(None)
        }
    }
}

/// Formats a track position as `m:ss`.
fn clock(duration: Duration) -> String {
    let seconds = duration.as_secs();
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

fn print_tracks<'a>(tracks: impl IntoIterator<Item = &'a Track>) {
    for (i, track) in tracks.into_iter().enumerate() {
        println!(
            "{:>3}. {} - {} ({})",
            i + 1,
            track.name,
            track.artist_names(),
            clock(track.duration)
        );
    }
}

fn now_playing_line(state: Option<&PlaybackState>) -> String {
    let Some(state) = state else {
        return String::from("No active device found");
    };

    let status = if state.is_playing { "Playing" } else { "Paused" };
    let device = state
        .device
        .as_ref()
        .map(|device| format!(" on {}", device.name))
        .unwrap_or_default();

    match &state.item {
        Some(track) => format!(
            "{status}: {} - {} [{}/{}] {:.0}%{device}",
            track.name,
            track.artist_names(),
            clock(state.progress.unwrap_or_default()),
            clock(track.duration),
            state.progress_ratio() * 100.0
        ),
        None => format!("{status}{device}"),
    }
}

async fn dashboard(ctx: &Context, range: TimeRange, genre: Option<&str>) -> error::Result<()> {
    let api = &ctx.api;

    if let Some(user) = inline("profile", api.profile().await)? {
        println!("Welcome, {}", user.name());
    }
    println!("Your Music Overview ({})", range.label());
    println!();

    let top_tracks = inline("top tracks", api.top_tracks(range, TOP_LIMIT).await)?;
    let top_artists = inline("top artists", api.top_artists(range, TOP_LIMIT).await)?;
    if let (Some(tracks), Some(artists)) = (&top_tracks, &top_artists) {
        let stats = stats::ListeningStats::new(range, artists, tracks);
        println!("Unique Artists  {:>6}", stats.unique_artists);
        println!("Top Tracks      {:>6}", stats.top_tracks);
        println!("Total Minutes   {:>6}", stats.total_minutes);
    }

    if let Some(history) = inline(
        "recently played tracks",
        api.recently_played(RECENTLY_PLAYED_LIMIT).await,
    )? {
        println!(
            "Recent Listening {:>5}",
            util::format_duration(stats::total_minutes(&history))
        );
    }
    println!();

    let Some(tracks) = top_tracks else {
        return Ok(());
    };

    let genres = inline("genres", api.artist_genres(&tracks).await)?.unwrap_or_default();
    let breakdown = stats::genre_breakdown(&tracks, &genres, stats::TOP_GENRES);
    if !breakdown.is_empty() {
        println!("Top Genres");
        for share in &breakdown {
            println!("  {:<30} {:>3}%", share.genre, share.percentage);
        }
        println!();
    }

    let ranked: Vec<&str> = breakdown.iter().map(|share| share.genre.as_str()).collect();
    let personality = stats::listener_personality(&ranked);
    println!("Your Listener Type: {personality}");
    println!("  {}", personality.description());
    println!();

    match genre {
        Some(genre) => println!("Top Tracks ({genre})"),
        None => println!("Top Tracks"),
    }
    print_tracks(stats::filter_by_genre(&tracks, &genres, genre, stats::TOP_TRACKS));

    Ok(())
}

async fn playlists(ctx: &Context) -> error::Result<()> {
    let playlists = ctx.api.playlists().await?;
    let durations = ctx.api.playlist_durations(&playlists).await;

    for playlist in &playlists {
        let length = durations.get(&playlist.id).map_or_else(
            || String::from("?"),
            |duration| util::format_duration(util::whole_minutes(*duration)),
        );
        println!(
            "{} ({} tracks, {length})  {}",
            playlist.name, playlist.tracks.total, playlist.id
        );
        let subtitle = playlist.subtitle();
        if !subtitle.is_empty() {
            println!("    {subtitle}");
        }
    }
    Ok(())
}

async fn now_playing(ctx: &Context, watch: bool) -> error::Result<()> {
    if !watch {
        let state = ctx.api.playback_state().await?;
        println!("{}", now_playing_line(state.as_ref()));
        return Ok(());
    }

    let api = Arc::clone(&ctx.api);
    let last_line = Arc::new(Mutex::new(String::new()));
    let refresh = Poller::spawn("now playing", ctx.config.now_playing_poll_interval, move || {
        let api = Arc::clone(&api);
        let last_line = Arc::clone(&last_line);
        async move {
            match api.playback_state().await {
                Ok(state) => {
                    let line = now_playing_line(state.as_ref());
                    if let Ok(mut last) = last_line.lock() {
                        if *last != line {
                            println!("{line}");
                            *last = line;
                        }
                    }
                    ControlFlow::Continue(())
                }
                Err(e) if e.kind == ErrorKind::Unauthenticated => {
                    error!("{e}");
                    ControlFlow::Break(())
                }
                Err(e) => {
                    warn!("failed to load playback state: {e}");
                    ControlFlow::Continue(())
                }
            }
        }
    });
    let guard = Arc::clone(&ctx.session).watch(ctx.config.session_poll_interval);

    tokio::select! {
        // Prioritize shutdown signals.
        biased;

        _ = tokio::signal::ctrl_c() => {
            info!("shutting down gracefully");
        }

        result = refresh.stopped() => result?,

        result = guard.stopped() => {
            result?;
            warn!("session expired");
        }
    }

    if ctx.session.is_authenticated() {
        Ok(())
    } else {
        Err(error::Error::unauthenticated("session expired"))
    }
}

async fn execute(ctx: &Context, command: Command) -> error::Result<()> {
    match command {
        Command::Login => ctx.print_login_url()?,

        Command::Callback { url } => match ctx.authorizer.complete(&url) {
            Ok(token) => {
                println!(
                    "Logged in for {}.",
                    util::format_duration(util::whole_minutes(token.time_to_live()))
                );
                println!();
                dashboard(ctx, TimeRange::default(), None).await?;
            }
            Err(e) => {
                println!("Authentication failed: {e}");
                tokio::time::sleep(LOGIN_REDIRECT_DELAY).await;
                ctx.print_login_url()?;
                return Err(e);
            }
        },

        Command::Logout => {
            ctx.session.logout()?;
            ctx.api.cache().clear().await;
            println!("Logged out.");
        }

        Command::Status => {
            let token = ctx.session.access_token()?;
            println!(
                "Logged in, session expires in {}.",
                util::format_duration(util::whole_minutes(token.time_to_live()))
            );
            if let Some(user) = inline("profile", ctx.api.profile().await)? {
                println!("User: {} ({})", user.name(), user.id);
            }
        }

        Command::Dashboard { range, genre } => dashboard(ctx, range, genre.as_deref()).await?,

        Command::TopTracks { range } => {
            let tracks = ctx.api.top_tracks(range, TOP_LIMIT).await?;
            println!("Top Tracks ({})", range.label());
            print_tracks(&tracks);
        }

        Command::TopArtists { range } => {
            let artists = ctx.api.top_artists(range, TOP_LIMIT).await?;
            println!("Top Artists ({})", range.label());
            for (i, artist) in artists.iter().enumerate() {
                println!("{:>3}. {} [{}]", i + 1, artist.name, artist.genres.join(", "));
            }
        }

        Command::Playlists => playlists(ctx).await?,

        Command::Recommend { playlist_id } => {
            let tracks = ctx.api.playlist_recommendations(&playlist_id).await?;
            if tracks.is_empty() {
                println!("No recommendations for this playlist.");
            } else {
                println!("Recommended for you");
                print_tracks(&tracks);
            }
        }

        Command::NowPlaying { watch } => now_playing(ctx, watch).await?,

        Command::Play { uris, context } => match context {
            Some(context) => ctx.api.play_context(&context).await?,
            None if !uris.is_empty() => ctx.api.play_uris(&uris).await?,
            None => ctx.api.play().await?,
        },

        Command::Pause => ctx.api.pause().await?,

        Command::Toggle => {
            let state = ctx.api.playback_state().await?;
            let playing = ctx.api.toggle_playback(state.as_ref()).await?;
            println!("{}", if playing { "Playing" } else { "Paused" });
        }

        Command::Next => ctx.api.next().await?,

        Command::Previous => ctx.api.previous().await?,

        Command::Share {
            track_id,
            title,
            description,
        } => {
            let title = title.unwrap_or_else(|| String::from("this track"));
            let links = ShareLinks::track(&track_id, &title, description.as_deref())?;
            println!("Link:     {}", links.url);
            println!("Twitter:  {}", links.twitter);
            println!("Facebook: {}", links.facebook);
        }
    }

    Ok(())
}

/// Runs one command.
///
/// # Errors
///
/// This function returns an error when the configuration or session cannot
/// be loaded, or the command fails. When the failure is a missing or
/// expired session, a fresh login URL is printed first.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let ctx = Context::new(&args)?;

    // A failed callback has already sent the user back to login.
    let is_callback = matches!(args.command, Command::Callback { .. });

    match execute(&ctx, args.command).await {
        Err(e) if e.kind == ErrorKind::Unauthenticated && !is_callback => {
            ctx.session.logout()?;
            ctx.api.cache().clear().await;
            println!("Not logged in or session expired.");
            ctx.print_login_url()?;
            Err(e.into())
        }
        result => Ok(result?),
    }
}

/// Main entry point of the application.
///
/// This function initializes the logger facade, parses the command line
/// arguments, and runs the requested command.
#[tokio::main]
async fn main() {
    // `clap` handles our command line arguments and help text.
    let args = Args::parse();
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    // This aids in debugging of whatever comes next.
    debug!("Command {:#?}", args);

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let version = cmd.get_version().unwrap_or("UNKNOWN").to_string();

    debug!("starting {name}/{version}; {BUILD_PROFILE}");

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}
