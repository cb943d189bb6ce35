//! Playback Controller backed by Spotify Connect devices and local previews.

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::model::{DeviceInfo, PreviewSource, SpotifyClient, Track};
use crate::preview::{PreviewFetcher, PreviewPlayer};
use crate::session::PlaybackController;

/// Local preview support. Absent when previews are disabled or there is no
/// audio output.
pub struct Previews {
    pub fetcher: PreviewFetcher,
    pub player: PreviewPlayer,
}

pub struct DevicePlayback {
    spotify: SpotifyClient,
    previews: Option<Previews>,
}

impl DevicePlayback {
    pub fn new(spotify: SpotifyClient, previews: Option<Previews>) -> Self {
        Self { spotify, previews }
    }
}

#[async_trait]
impl PlaybackController for DevicePlayback {
    async fn list_targets(&self) -> Result<Vec<DeviceInfo>, ServiceError> {
        self.spotify.devices().await
    }

    async fn play(&self, track_id: &str, target_id: &str) -> Result<(), ServiceError> {
        self.spotify.play_track(track_id, target_id).await
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        self.spotify.pause().await
    }

    async fn play_preview(&self, track: &Track) -> Result<PreviewSource, ServiceError> {
        let Some(previews) = &self.previews else {
            return Err(ServiceError::PreviewUnavailable(
                "local previews are disabled".to_string(),
            ));
        };

        let (clip, source) = previews.fetcher.fetch(track).await?;
        previews.player.play(clip)?;
        tracing::info!(track_id = %track.id, source = %source, "Playing preview");
        Ok(source)
    }

    async fn stop_preview(&self) {
        if let Some(previews) = &self.previews {
            previews.player.stop();
        }
    }

    fn previews_enabled(&self) -> bool {
        self.previews.is_some()
    }

    fn has_preview_fallback(&self) -> bool {
        self.previews
            .as_ref()
            .is_some_and(|p| p.fetcher.has_fallback())
    }
}
