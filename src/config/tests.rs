use super::load::{default_config_path, resolve_config_path};
use super::schema::*;
use std::sync::{Mutex, OnceLock};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner())
}

struct EnvGuard {
    key: &'static str,
    old: Option<std::ffi::OsString>,
}

impl EnvGuard {
    fn set(key: &'static str, val: &str) -> Self {
        let old = std::env::var_os(key);
        unsafe {
            std::env::set_var(key, val);
        }
        Self { key, old }
    }

    fn remove(key: &'static str) -> Self {
        let old = std::env::var_os(key);
        unsafe {
            std::env::remove_var(key);
        }
        Self { key, old }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match self.old.take() {
            Some(v) => unsafe {
                std::env::set_var(self.key, v);
            },
            None => unsafe {
                std::env::remove_var(self.key);
            },
        }
    }
}

/// Clear every variable that could leak into `Settings::load` from the host.
fn clean_env() -> Vec<EnvGuard> {
    vec![
        EnvGuard::remove("SPOTIFY_CLIENT_ID"),
        EnvGuard::remove("SPOTIFY_REDIRECT_URI"),
        EnvGuard::remove("SPOTIFY_ORGANIZER__SPOTIFY__CLIENT_ID"),
        EnvGuard::remove("SPOTIFY_ORGANIZER__SESSION__AUTO_PLAY"),
        EnvGuard::remove("SPOTIFY_ORGANIZER__PREVIEW__TIMEOUT_SECS"),
    ]
}

#[test]
fn resolve_config_path_prefers_explicit_variable() {
    let _lock = env_lock();
    let _g1 = EnvGuard::set("SPOTIFY_ORGANIZER_CONFIG", "/tmp/organizer-test.toml");
    assert_eq!(
        resolve_config_path().unwrap(),
        std::path::PathBuf::from("/tmp/organizer-test.toml")
    );
}

#[test]
fn default_config_path_prefers_xdg_config_home() {
    let _lock = env_lock();
    let _g1 = EnvGuard::set("XDG_CONFIG_HOME", "/tmp/xdg-config-home");
    let _g2 = EnvGuard::set("HOME", "/tmp/home-should-not-win");

    assert_eq!(
        default_config_path().unwrap(),
        std::path::PathBuf::from("/tmp/xdg-config-home")
            .join("spotify-organizer")
            .join("config.toml")
    );
}

#[test]
fn default_config_path_falls_back_to_home_dot_config() {
    let _lock = env_lock();
    let _g1 = EnvGuard::remove("XDG_CONFIG_HOME");
    let _g2 = EnvGuard::set("HOME", "/tmp/home-dir");

    assert_eq!(
        default_config_path().unwrap(),
        std::path::PathBuf::from("/tmp/home-dir")
            .join(".config")
            .join("spotify-organizer")
            .join("config.toml")
    );
}

#[test]
fn defaults_need_a_client_id() {
    let s = Settings::default();
    assert!(s.session.auto_play);
    assert_eq!(s.preview.timeout_secs, 10);
    assert_eq!(
        s.session.resume_file,
        std::path::PathBuf::from("processed_tracks.log")
    );
    assert!(s.validate().is_err());
}

#[test]
fn settings_load_from_config_file() {
    let _lock = env_lock();
    let _env = clean_env();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("config.toml");
    std::fs::write(
        &cfg_path,
        r#"
[spotify]
client_id = "abc123"
cache_dir = "/tmp/organizer-cache"

[session]
resume_file = "state/done.log"
auto_play = false

[preview]
itunes_fallback = false
timeout_secs = 3

[playback]
local_device = true
device_name = "Desk"

[logging]
dir = "/tmp/organizer-logs"
filter = "spotify_organizer=trace"
"#,
    )
    .unwrap();

    let s = Settings::load(Some(&cfg_path)).unwrap();
    assert_eq!(s.spotify.client_id, "abc123");
    assert_eq!(s.spotify.redirect_uri, "http://127.0.0.1:8898/login");
    assert_eq!(
        s.spotify.cache_dir,
        std::path::PathBuf::from("/tmp/organizer-cache")
    );
    assert_eq!(s.session.resume_file, std::path::PathBuf::from("state/done.log"));
    assert!(!s.session.auto_play);
    assert!(s.session.clear_screen);
    assert!(s.preview.enabled);
    assert!(!s.preview.itunes_fallback);
    assert_eq!(s.preview.timeout_secs, 3);
    assert!(s.playback.local_device);
    assert_eq!(s.playback.device_name, "Desk");
    assert_eq!(s.logging.dir, std::path::PathBuf::from("/tmp/organizer-logs"));
    assert_eq!(s.logging.filter.as_deref(), Some("spotify_organizer=trace"));
    assert!(s.validate().is_ok());
}

#[test]
fn explicit_config_file_must_exist() {
    let _lock = env_lock();
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    assert!(Settings::load(Some(&missing)).is_err());
}

#[test]
fn env_overrides_config_file() {
    let _lock = env_lock();
    let _env = clean_env();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("config.toml");
    std::fs::write(
        &cfg_path,
        r#"
[spotify]
client_id = "from-file"

[session]
auto_play = true
"#,
    )
    .unwrap();

    let _g1 = EnvGuard::set("SPOTIFY_ORGANIZER__SESSION__AUTO_PLAY", "false");
    let _g2 = EnvGuard::set("SPOTIFY_ORGANIZER__SPOTIFY__CLIENT_ID", "from-prefixed-env");

    let s = Settings::load(Some(&cfg_path)).unwrap();
    assert!(!s.session.auto_play);
    assert_eq!(s.spotify.client_id, "from-prefixed-env");

    // The plain variable wins over everything else.
    let _g3 = EnvGuard::set("SPOTIFY_CLIENT_ID", "from-plain-env");
    let _g4 = EnvGuard::set("SPOTIFY_REDIRECT_URI", "http://127.0.0.1:9999/cb");
    let s = Settings::load(Some(&cfg_path)).unwrap();
    assert_eq!(s.spotify.client_id, "from-plain-env");
    assert_eq!(s.spotify.redirect_uri, "http://127.0.0.1:9999/cb");
}

#[test]
fn zero_timeout_is_rejected() {
    let mut s = Settings::default();
    s.spotify.client_id = "abc".to_string();
    assert!(s.validate().is_ok());

    s.preview.timeout_secs = 0;
    assert!(s.validate().is_err());
}

#[test]
fn malformed_log_filter_is_rejected() {
    let mut s = Settings::default();
    s.spotify.client_id = "abc".to_string();
    s.logging.filter = Some("spotify_organizer=debug,rspotify=info".to_string());
    assert!(s.validate().is_ok());

    s.logging.filter = Some("spotify_organizer=loud".to_string());
    let err = s.validate().unwrap_err();
    assert!(err.starts_with("logging.filter"));
}
