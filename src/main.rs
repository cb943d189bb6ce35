mod auth;
mod config;
mod connect;
mod controller;
mod error;
mod logging;
mod model;
mod playback;
mod preview;
mod session;
mod view;

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rspotify::{AuthCodeSpotify, Config, Token};
use tokio::io::BufReader;

use config::Settings;
use connect::LocalDevice;
use controller::{Console, ControllerOptions, SessionController};
use error::SessionError;
use model::{ResumeStore, SpotifyClient};
use playback::{DevicePlayback, Previews};
use preview::{PreviewFetcher, PreviewPlayer};
use session::{PlaybackController, SessionEngine, SessionOptions, TrackSource};
use view::View;

#[derive(Debug, Parser)]
#[command(version, about = "Walk through your Spotify liked songs and sort them into playlists")]
struct Cli {
    /// Skip the intro menu and start organizing right away
    #[arg(long)]
    organize: bool,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Resume log of handled songs
    #[arg(long, value_name = "PATH")]
    resume_file: Option<PathBuf>,

    /// Do not start songs on a Spotify device
    #[arg(long)]
    no_autoplay: bool,

    /// Disable local 30 second previews
    #[arg(long)]
    no_preview: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let log_guard = match logging::init_logging(&settings.logging) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: Failed to initialize logging: {}", e);
            None
        }
    };

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "=== spotify-organizer starting ===");

    if let Some(path) = cli.resume_file {
        settings.session.resume_file = path;
    }
    if cli.no_autoplay {
        settings.session.auto_play = false;
    }
    if cli.no_preview {
        settings.preview.enabled = false;
    }
    if let Err(msg) = settings.validate() {
        if let Some(path) = config::default_config_path() {
            eprintln!("Config file location: {}", path.display());
        }
        anyhow::bail!("Invalid configuration: {}", msg);
    }

    let mut console = Console::new(
        BufReader::new(tokio::io::stdin()),
        View::new(io::stdout(), settings.session.clear_screen),
    );

    if !cli.organize && !console.intro().await? {
        console.view().info("Goodbye!")?;
        return Ok(());
    }

    console.view().info("Connecting to Spotify...")?;

    // Step 1: Get credentials
    let auth_result = auth::perform_oauth_flow(&settings.spotify).await?;

    // Step 2: Authenticate with rspotify
    let rspotify_client = setup_rspotify(auth_result.rspotify_token.clone()).await?;
    let token_expires_at = auth_result.rspotify_token.expires_at;
    let spotify = SpotifyClient::new(
        rspotify_client,
        settings.spotify.clone(),
        auth_result.refresh_token.clone(),
        token_expires_at,
    );

    if let Err(e) = spotify.current_user_id().await {
        tracing::error!(error = %e, "rspotify authentication failed");
        return Err(anyhow::anyhow!("Spotify authorization failed: {}", e));
    }

    // Step 3: Optional Connect receiver in this process
    let local_device = if settings.playback.local_device && settings.session.auto_play {
        match LocalDevice::start(&auth_result, &settings.playback.device_name).await {
            Ok(device) => Some(device),
            Err(e) => {
                tracing::warn!(error = %e, "Local Connect device unavailable");
                console
                    .view()
                    .warning(&format!("Local playback device unavailable: {}", e))?;
                None
            }
        }
    } else {
        None
    };

    // Step 4: Library
    console.view().info("Fetching your liked songs...")?;
    let tracks = spotify.list_tracks().await.context("Failed to fetch liked songs")?;
    console.view().info("Fetching your playlists...")?;
    let collections = spotify
        .list_collections()
        .await
        .context("Failed to fetch playlists")?;
    console.view().info(&format!(
        "Found {} liked songs and {} playlists you can edit",
        tracks.len(),
        collections.len()
    ))?;

    let store = ResumeStore::open(&settings.session.resume_file).with_context(|| {
        format!(
            "Failed to open resume log {}",
            settings.session.resume_file.display()
        )
    })?;

    let playback = DevicePlayback::new(spotify.clone(), start_previews(&settings));
    tracing::info!(previews = playback.previews_enabled(), "Playback ready");

    let engine = match SessionEngine::start(
        tracks,
        collections,
        store,
        spotify,
        playback,
        SessionOptions {
            auto_play: settings.session.auto_play,
        },
    ) {
        Ok(engine) => engine,
        Err(SessionError::EmptyLibrary) => {
            console.view().info(&format!(
                "Nothing to organize: every liked song is already listed in {}.",
                settings.session.resume_file.display()
            ))?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let options = ControllerOptions {
        choose_device: settings.session.auto_play,
        local_device_name: local_device.as_ref().map(|d| d.name().to_string()),
    };
    let controller = SessionController::new(
        engine,
        console,
        options,
        Box::new(|url: &str| webbrowser::open(url)),
    );

    // Every handled song is synced to the resume log as it happens, so an
    // interrupt loses nothing.
    let finished = tokio::select! {
        result = controller.run() => Some(result.map(|_| ())),
        _ = tokio::signal::ctrl_c() => None,
    };
    let Some(result) = finished else {
        tracing::info!("Interrupted");
        println!("\n\nInterrupted. Progress saved.");
        if let Some(device) = &local_device {
            device.shutdown();
        }
        drop(log_guard);
        // The stdin reader thread would keep the runtime alive
        std::process::exit(130);
    };

    if let Some(device) = &local_device {
        device.shutdown();
    }

    if let Err(e) = &result {
        tracing::error!(error = ?e, "Session ended with an error");
    }
    tracing::info!("spotify-organizer shutting down");
    result
}

async fn setup_rspotify(access_token: Token) -> Result<AuthCodeSpotify> {
    let spotify = AuthCodeSpotify::with_config(
        Default::default(),
        Default::default(),
        Config {
            token_cached: false,
            token_refreshing: false,
            ..Default::default()
        },
    );

    tracing::debug!("rspotify client initialized");

    *spotify
        .token
        .lock()
        .await
        .map_err(|_| anyhow::anyhow!("rspotify token lock poisoned"))? = Some(access_token);
    tracing::debug!("rspotify token set");
    Ok(spotify)
}

/// Open the audio output and HTTP client for previews. Any failure just
/// leaves previews off.
fn start_previews(settings: &Settings) -> Option<Previews> {
    if !settings.preview.enabled {
        return None;
    }

    let fetcher = match PreviewFetcher::new(&settings.preview) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            tracing::warn!(error = %e, "Preview client unavailable");
            return None;
        }
    };
    match PreviewPlayer::spawn() {
        Ok(player) => Some(Previews { fetcher, player }),
        Err(e) => {
            tracing::warn!(error = %e, "No audio output, previews disabled");
            None
        }
    }
}
