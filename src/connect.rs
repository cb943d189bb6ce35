//! Optional Spotify Connect receiver so this terminal can be a playback device.

use crate::auth::AuthResult;
use anyhow::{anyhow, Result};
use librespot::connect::{ConnectConfig, Spirc};
use librespot::core::config::SessionConfig;
use librespot::core::session::Session;
use librespot::playback::config::{AudioFormat, Bitrate, PlayerConfig};
use librespot::playback::mixer::{MixerConfig, NoOpVolume};
use librespot::playback::player::Player;
use librespot::playback::{audio_backend, mixer};

pub struct LocalDevice {
    name: String,
    spirc: Spirc,
}

impl LocalDevice {
    /// Register a Connect device called `name` with the signed-in account.
    pub async fn start(auth: &AuthResult, name: &str) -> Result<Self> {
        tracing::info!(device = name, "Starting local Connect device");

        let session_config = SessionConfig {
            device_id: device_id(name, &hostname_or_unknown()),
            ..Default::default()
        };
        let player_config = PlayerConfig {
            bitrate: Bitrate::Bitrate320,
            ..Default::default()
        };
        let connect_config = ConnectConfig {
            name: name.to_string(),
            ..Default::default()
        };
        let audio_format = AudioFormat::default();

        let sink_builder =
            audio_backend::find(None).ok_or_else(|| anyhow!("no audio backend available"))?;
        let mixer_builder = mixer::find(None).ok_or_else(|| anyhow!("no mixer available"))?;

        let session = Session::new(session_config, Some(auth.cache.clone()));
        let mixer = mixer_builder(MixerConfig::default())?;

        let player = Player::new(
            player_config,
            session.clone(),
            Box::new(NoOpVolume),
            move || sink_builder(None, audio_format),
        );

        let (spirc, spirc_task) = Spirc::new(
            connect_config,
            session,
            auth.librespot_credentials.clone(),
            player,
            mixer,
        )
        .await?;
        spirc.activate()?;

        tokio::spawn(async move {
            let _ = spirc_task.await;
            tracing::debug!("Connect task finished");
        });

        tracing::info!(device = name, "Local Connect device ready");
        Ok(Self {
            name: name.to_string(),
            spirc,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shutdown(&self) {
        if let Err(e) = self.spirc.shutdown() {
            tracing::debug!(error = %e, "Connect device shutdown failed");
        }
    }
}

fn hostname_or_unknown() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Stable per machine, so Spotify sees the same device across runs.
fn device_id(name: &str, host: &str) -> String {
    format!("{}-{}", name, host)
}
