use std::{
    env,
    path::{Path, PathBuf},
};

use super::schema::Settings;

const CONFIG_PATH_VAR: &str = "SPOTIFY_ORGANIZER_CONFIG";

/// Configuration loading helpers.
impl Settings {
    /// Load settings from an optional config file and the environment.
    ///
    /// `explicit` (from `--config`) wins over `SPOTIFY_ORGANIZER_CONFIG` and
    /// the XDG default. An explicit file must exist; the others may be absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ::config::ConfigError> {
        let mut builder = ::config::Config::builder();

        match explicit {
            Some(path) => {
                builder = builder.add_source(::config::File::from(path).required(true));
            }
            None => {
                if let Some(path) = resolve_config_path() {
                    builder =
                        builder.add_source(::config::File::from(path.as_path()).required(false));
                }
            }
        }

        builder = builder
            .add_source(
                ::config::Environment::with_prefix("SPOTIFY_ORGANIZER")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("spotify.client_id", non_empty_var("SPOTIFY_CLIENT_ID"))?
            .set_override_option(
                "spotify.redirect_uri",
                non_empty_var("SPOTIFY_REDIRECT_URI"),
            )?;

        let cfg = builder.build()?;
        let settings: Settings = cfg.try_deserialize()?;
        Ok(settings)
    }

    /// Perform basic validation checks on loaded settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.spotify.client_id.trim().is_empty() {
            return Err(
                "spotify.client_id is not set (use SPOTIFY_CLIENT_ID or the config file)"
                    .to_string(),
            );
        }
        if self.spotify.redirect_uri.trim().is_empty() {
            return Err("spotify.redirect_uri must not be empty".to_string());
        }
        if self.preview.timeout_secs == 0 {
            return Err("preview.timeout_secs must be >= 1".to_string());
        }
        if self.playback.local_device && self.playback.device_name.trim().is_empty() {
            return Err("playback.device_name must not be empty".to_string());
        }
        if let Some(filter) = &self.logging.filter {
            if let Err(e) = filter.parse::<tracing_subscriber::EnvFilter>() {
                return Err(format!("logging.filter is invalid: {}", e));
            }
        }
        Ok(())
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve the config path from `SPOTIFY_ORGANIZER_CONFIG` or XDG defaults.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os(CONFIG_PATH_VAR) {
        return Some(PathBuf::from(p));
    }
    default_config_path()
}

/// Compute the default config path under
/// `$XDG_CONFIG_HOME/spotify-organizer/config.toml` or
/// `~/.config/spotify-organizer/config.toml` when `XDG_CONFIG_HOME` is not set.
pub fn default_config_path() -> Option<PathBuf> {
    let config_home = if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
        Some(PathBuf::from(xdg))
    } else {
        env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
    };

    config_home.map(|d| d.join("spotify-organizer").join("config.toml"))
}
