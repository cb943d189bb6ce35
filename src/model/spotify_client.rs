//! Spotify Web API client wrapper with token refresh support

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use rspotify::{
    model::{FullTrack, PlayableId, PlaylistId, TrackId, UserId},
    prelude::*,
    AuthCodeSpotify,
};
use tokio::sync::{OnceCell, RwLock};

use super::types::{Collection, DeviceInfo, Track};
use crate::config::SpotifySettings;
use crate::error::ServiceError;
use crate::session::TrackSource;
use crate::{log_api_request, log_api_result};

const PLAYLIST_DESCRIPTION: &str = "Created with spotify-organizer";
const REFRESH_MARGIN_SECS: i64 = 300;

/// Spotify API client shared by the track source and device playback
#[derive(Clone)]
pub struct SpotifyClient {
    client: Arc<AuthCodeSpotify>,
    settings: SpotifySettings,
    user_id: Arc<OnceCell<String>>,
    refresh_token: Arc<RwLock<String>>,
    token_expires_at: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl SpotifyClient {
    pub fn new(
        client: AuthCodeSpotify,
        settings: SpotifySettings,
        refresh_token: String,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            client: Arc::new(client),
            settings,
            user_id: Arc::new(OnceCell::new()),
            refresh_token: Arc::new(RwLock::new(refresh_token)),
            token_expires_at: Arc::new(RwLock::new(expires_at)),
        }
    }

    pub async fn token_needs_refresh(&self) -> bool {
        let expires_at = self.token_expires_at.read().await;
        match *expires_at {
            Some(exp) => (exp - Utc::now()).num_seconds() < REFRESH_MARGIN_SECS,
            None => false,
        }
    }

    /// Swap in a fresh access token when the current one is about to expire.
    pub async fn refresh_token_if_needed(&self) -> Result<bool, ServiceError> {
        if !self.token_needs_refresh().await {
            return Ok(false);
        }

        let refresh_token = self.refresh_token.read().await.clone();
        tracing::info!("Token expiring soon, refreshing...");

        let (access_token, new_refresh_token, expires_at) =
            crate::auth::refresh_access_token(&self.settings, &refresh_token)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to refresh token");
                    ServiceError::Auth(e.to_string())
                })?;

        let token = crate::auth::rspotify_token(access_token, expires_at);
        match self.client.token.lock().await {
            Ok(mut guard) => *guard = Some(token),
            Err(_) => return Err(ServiceError::Auth("token store is poisoned".to_string())),
        }
        *self.refresh_token.write().await = new_refresh_token;
        *self.token_expires_at.write().await = Some(expires_at);

        tracing::info!("Token refreshed successfully");
        Ok(true)
    }

    /// Id of the signed-in user, fetched once.
    pub async fn current_user_id(&self) -> Result<String, ServiceError> {
        self.user_id
            .get_or_try_init(|| async {
                self.refresh_token_if_needed().await?;
                let user = self.client.me().await?;
                tracing::info!(user_id = %user.id, "Signed in");
                Ok::<_, ServiceError>(user.id.id().to_string())
            })
            .await
            .cloned()
    }

    pub async fn devices(&self) -> Result<Vec<DeviceInfo>, ServiceError> {
        self.refresh_token_if_needed().await?;
        log_api_request!("device");
        let result = self.client.device().await;
        log_api_result!("device", result);

        let devices: Vec<DeviceInfo> = result?
            .into_iter()
            .filter_map(|d| {
                Some(DeviceInfo {
                    id: d.id?,
                    name: d.name,
                    kind: format!("{:?}", d._type),
                    is_active: d.is_active,
                })
            })
            .collect();
        tracing::debug!(count = devices.len(), "Found devices");
        Ok(devices)
    }

    pub async fn play_track(&self, track_id: &str, device_id: &str) -> Result<(), ServiceError> {
        self.refresh_token_if_needed().await?;
        log_api_request!("start_uris_playback", track_id, device_id);
        let result = self
            .client
            .start_uris_playback(
                [PlayableId::Track(TrackId::from_id(track_id)?)],
                Some(device_id),
                None,
                None,
            )
            .await;
        log_api_result!("start_uris_playback", result);
        result.map_err(ServiceError::from_playback)
    }

    pub async fn pause(&self) -> Result<(), ServiceError> {
        self.refresh_token_if_needed().await?;
        log_api_request!("pause_playback");
        let result = self.client.pause_playback(None).await;
        log_api_result!("pause_playback", result);
        result.map_err(ServiceError::from_playback)
    }
}

#[async_trait]
impl TrackSource for SpotifyClient {
    async fn list_tracks(&self) -> Result<Vec<Track>, ServiceError> {
        self.refresh_token_if_needed().await?;
        tracing::debug!("Loading liked songs");

        let saved: Vec<_> = self
            .client
            .current_user_saved_tracks(None)
            .try_collect()
            .await?;

        let total = saved.len();
        let tracks: Vec<Track> = saved
            .into_iter()
            .filter_map(|saved| track_from_full(saved.track))
            .collect();
        if tracks.len() < total {
            tracing::debug!(dropped = total - tracks.len(), "Ignored saved items without a track id");
        }
        tracing::info!(count = tracks.len(), "Liked songs loaded");
        Ok(tracks)
    }

    async fn list_collections(&self) -> Result<Vec<Collection>, ServiceError> {
        let user_id = self.current_user_id().await?;
        self.refresh_token_if_needed().await?;

        let playlists: Vec<_> = self.client.current_user_playlists().try_collect().await?;
        let total = playlists.len();
        let collections: Vec<Collection> = playlists
            .into_iter()
            .filter(|p| is_modifiable(p.owner.id.id(), p.collaborative, &user_id))
            .map(|p| Collection {
                id: p.id.id().to_string(),
                name: p.name,
            })
            .collect();

        tracing::info!(total, modifiable = collections.len(), "Playlists loaded");
        Ok(collections)
    }

    async fn add_track_to_collection(
        &self,
        track_id: &str,
        collection_id: &str,
    ) -> Result<(), ServiceError> {
        self.refresh_token_if_needed().await?;
        log_api_request!("playlist_add_items", track_id, collection_id);
        let result = self
            .client
            .playlist_add_items(
                PlaylistId::from_id(collection_id)?,
                [PlayableId::Track(TrackId::from_id(track_id)?)],
                None,
            )
            .await;
        log_api_result!("playlist_add_items", result);
        result?;
        Ok(())
    }

    async fn remove_track_from_collection(
        &self,
        track_id: &str,
        collection_id: &str,
    ) -> Result<(), ServiceError> {
        self.refresh_token_if_needed().await?;
        log_api_request!("playlist_remove_all_occurrences_of_items", track_id, collection_id);
        let result = self
            .client
            .playlist_remove_all_occurrences_of_items(
                PlaylistId::from_id(collection_id)?,
                [PlayableId::Track(TrackId::from_id(track_id)?)],
                None,
            )
            .await;
        log_api_result!("playlist_remove_all_occurrences_of_items", result);
        result?;
        Ok(())
    }

    async fn create_collection(&self, name: &str) -> Result<Collection, ServiceError> {
        let user_id = self.current_user_id().await?;
        self.refresh_token_if_needed().await?;
        log_api_request!("user_playlist_create", name);
        let result = self
            .client
            .user_playlist_create(
                UserId::from_id(&user_id)?,
                name,
                Some(false),
                Some(false),
                Some(PLAYLIST_DESCRIPTION),
            )
            .await;
        log_api_result!("user_playlist_create", result);

        let playlist = result?;
        Ok(Collection {
            id: playlist.id.id().to_string(),
            name: playlist.name,
        })
    }
}

/// Convert an API track, dropping local files and other id-less items.
fn track_from_full(track: FullTrack) -> Option<Track> {
    let id = track.id.as_ref()?.id().to_string();
    Some(Track {
        id,
        title: track.name,
        artists: track.artists.into_iter().map(|a| a.name).collect(),
        year: track.album.release_date.as_deref().and_then(release_year),
        album: track.album.name,
        duration_ms: u32::try_from(track.duration.num_milliseconds()).unwrap_or(0),
        popularity: Some(track.popularity),
        preview_url: track.preview_url,
        external_url: track.external_urls.get("spotify").cloned(),
    })
}

/// "1987-07-27", "1987-07" and "1987" all give "1987".
fn release_year(date: &str) -> Option<String> {
    let year = date.split('-').next()?;
    (year.len() == 4 && year.chars().all(|c| c.is_ascii_digit())).then(|| year.to_string())
}

fn is_modifiable(owner_id: &str, collaborative: bool, user_id: &str) -> bool {
    collaborative || owner_id == user_id
}
