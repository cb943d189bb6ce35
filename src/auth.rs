use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use librespot::core::{authentication::Credentials, cache::Cache};
use rspotify::Token;

use crate::config::SpotifySettings;

/// Scopes for reading the library, editing playlists and driving devices.
/// `streaming` is only needed by the local Connect device.
pub const SCOPES: &str = "streaming user-library-read playlist-read-private playlist-read-collaborative playlist-modify-private playlist-modify-public user-read-playback-state user-modify-playback-state";

const RESPONSE: &str = r#"
<!doctype html>
<html>
<head><title>Success</title></head>
<body><h1>Authentication Successful!</h1><p>You can return to the terminal.</p><script>window.close();</script></body>
</html>
"#;
const REFRESH_TOKEN_FILE: &str = "refresh_token";
const DEFAULT_LIFETIME_SECS: i64 = 3600;

#[derive(Clone)]
pub struct AuthResult {
    pub librespot_credentials: Credentials,
    pub rspotify_token: Token,
    pub refresh_token: String,
    pub cache: Cache,
}

struct Grant {
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl From<librespot_oauth::OAuthToken> for Grant {
    fn from(token: librespot_oauth::OAuthToken) -> Self {
        Self {
            expires_at: expiry_from_instant(token.expires_at),
            access_token: token.access_token,
            refresh_token: token.refresh_token,
        }
    }
}

fn expiry_from_instant(expires_at: Instant) -> DateTime<Utc> {
    let remaining = expires_at.saturating_duration_since(Instant::now());
    let remaining = chrono::Duration::from_std(remaining)
        .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_LIFETIME_SECS));
    Utc::now() + remaining
}

fn scopes() -> Vec<&'static str> {
    SCOPES.split_whitespace().collect()
}

fn refresh_token_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(REFRESH_TOKEN_FILE)
}

fn save_refresh_token(cache_dir: &Path, refresh_token: &str) {
    match fs::write(refresh_token_path(cache_dir), refresh_token) {
        Ok(()) => tracing::debug!("Saved refresh token to disk"),
        Err(e) => tracing::warn!(error = %e, "Could not save refresh token"),
    }
}

async fn perform_browser_auth(settings: &SpotifySettings) -> Result<Grant> {
    tracing::info!("Starting browser-based OAuth flow");
    let client = librespot_oauth::OAuthClientBuilder::new(
        &settings.client_id,
        &settings.redirect_uri,
        scopes(),
    )
    .open_in_browser()
    .with_custom_message(RESPONSE)
    .build()
    .context("Failed to build OAuth client")?;

    let token = client
        .get_access_token_async()
        .await
        .context("Failed to get access token")?;

    save_refresh_token(&settings.cache_dir, &token.refresh_token);
    tracing::info!("Browser authentication completed successfully");
    Ok(token.into())
}

/// Authenticate with Spotify, reusing cached credentials when they still work.
pub async fn perform_oauth_flow(settings: &SpotifySettings) -> Result<AuthResult> {
    let cache_dir = &settings.cache_dir;
    fs::create_dir_all(cache_dir)
        .with_context(|| format!("Failed to create cache directory {}", cache_dir.display()))?;
    let cache = Cache::new(
        Some(cache_dir.clone()),
        Some(cache_dir.clone()),
        Some(cache_dir.join("files")),
        None,
    )?;

    let stored_refresh_token = fs::read_to_string(refresh_token_path(cache_dir))
        .ok()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    let (credentials, grant) = match (cache.credentials(), stored_refresh_token) {
        (Some(creds), Some(refresh_token)) => {
            tracing::info!("Found cached Librespot credentials and refresh token");
            match refresh_grant(settings, &refresh_token).await {
                Ok(grant) => (creds, grant),
                Err(e) => {
                    tracing::warn!(error = %e, "Cached refresh token failed, re-authenticating");
                    let grant = perform_browser_auth(settings).await?;
                    (Credentials::with_access_token(grant.access_token.clone()), grant)
                }
            }
        }
        _ => {
            tracing::info!("No cached credentials found, starting browser authentication");
            let grant = perform_browser_auth(settings).await?;
            (Credentials::with_access_token(grant.access_token.clone()), grant)
        }
    };

    Ok(AuthResult {
        librespot_credentials: credentials,
        rspotify_token: rspotify_token(grant.access_token, grant.expires_at),
        refresh_token: grant.refresh_token,
        cache,
    })
}

async fn refresh_grant(settings: &SpotifySettings, refresh_token: &str) -> Result<Grant> {
    let oauth_client = librespot_oauth::OAuthClientBuilder::new(
        &settings.client_id,
        &settings.redirect_uri,
        scopes(),
    )
    .build()?;

    let token = oauth_client.refresh_token_async(refresh_token).await?;
    save_refresh_token(&settings.cache_dir, &token.refresh_token);
    tracing::debug!("Token refreshed successfully");
    Ok(token.into())
}

/// Exchange a refresh token for a new access token.
///
/// Returns (access token, refresh token to use next time, expiry).
pub async fn refresh_access_token(
    settings: &SpotifySettings,
    refresh_token: &str,
) -> Result<(String, String, DateTime<Utc>)> {
    let grant = refresh_grant(settings, refresh_token).await?;
    Ok((grant.access_token, grant.refresh_token, grant.expires_at))
}

/// Token in the shape rspotify expects. Refreshing is handled by us, not rspotify.
pub fn rspotify_token(access_token: String, expires_at: DateTime<Utc>) -> Token {
    Token {
        access_token,
        expires_in: chrono::Duration::seconds(DEFAULT_LIFETIME_SECS),
        expires_at: Some(expires_at),
        scopes: SCOPES
            .split_whitespace()
            .map(|s| s.to_string())
            .collect::<HashSet<String>>(),
        refresh_token: None,
    }
}
