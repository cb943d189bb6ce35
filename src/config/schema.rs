use std::path::PathBuf;

use serde::Deserialize;

/// Top-level settings loaded from `config.toml`.
///
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/spotify-organizer/config.toml`
/// or `~/.config/spotify-organizer/config.toml`
///
/// Precedence (highest wins):
/// 1) `SPOTIFY_CLIENT_ID` / `SPOTIFY_REDIRECT_URI`
/// 2) Environment variables (prefix `SPOTIFY_ORGANIZER__`, `__` as nested separator)
/// 3) Config file (if present)
/// 4) Struct defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub spotify: SpotifySettings,
    pub session: SessionSettings,
    pub preview: PreviewSettings,
    pub playback: PlaybackSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpotifySettings {
    /// Client id of the Spotify app used for the PKCE login. Required.
    pub client_id: String,
    /// Must match a redirect URI registered for the app.
    pub redirect_uri: String,
    /// Holds librespot credentials and the saved refresh token.
    pub cache_dir: PathBuf,
}

impl Default for SpotifySettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_uri: "http://127.0.0.1:8898/login".to_string(),
            cache_dir: PathBuf::from(".cache"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Log of tracks already handled.
    pub resume_file: PathBuf,
    /// Start each track on the selected device when it is shown.
    pub auto_play: bool,
    /// Clear the terminal before each track.
    pub clear_screen: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            resume_file: PathBuf::from(crate::model::DEFAULT_RESUME_FILE),
            auto_play: true,
            clear_screen: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreviewSettings {
    /// Allow `p` to play 30 second clips locally.
    pub enabled: bool,
    /// Search iTunes when Spotify has no preview URL for a track.
    pub itunes_fallback: bool,
    /// Timeout for preview lookups and downloads (seconds).
    pub timeout_secs: u64,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            itunes_fallback: true,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Run a Spotify Connect receiver inside this process.
    pub local_device: bool,
    /// Name the local receiver shows up under.
    pub device_name: String,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            local_device: false,
            device_name: "spotify-organizer".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Directory for the daily log files.
    pub dir: PathBuf,
    /// `EnvFilter` directives. `RUST_LOG` still wins when set.
    pub filter: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".logs"),
            filter: None,
        }
    }
}
