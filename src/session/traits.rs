//! Collaborator interfaces the session engine drives.
//!
//! Production code uses [`SpotifyClient`](crate::model::SpotifyClient) and
//! [`DevicePlayback`](crate::playback::DevicePlayback); tests substitute the
//! in-memory implementations from [`mocks`].

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::model::{Collection, DeviceInfo, PreviewSource, Track};

/// Supplies the tracks to organize and the collections they can go into.
#[async_trait]
pub trait TrackSource: Send + Sync {
    /// All candidate tracks, in a stable order.
    async fn list_tracks(&self) -> Result<Vec<Track>, ServiceError>;

    /// Collections the user is allowed to add to.
    async fn list_collections(&self) -> Result<Vec<Collection>, ServiceError>;

    async fn add_track_to_collection(
        &self,
        track_id: &str,
        collection_id: &str,
    ) -> Result<(), ServiceError>;

    /// Best-effort inverse of [`add_track_to_collection`](Self::add_track_to_collection).
    async fn remove_track_from_collection(
        &self,
        track_id: &str,
        collection_id: &str,
    ) -> Result<(), ServiceError>;

    async fn create_collection(&self, name: &str) -> Result<Collection, ServiceError>;
}

/// Remote device playback plus local preview clips.
#[async_trait]
pub trait PlaybackController: Send + Sync {
    async fn list_targets(&self) -> Result<Vec<DeviceInfo>, ServiceError>;

    async fn play(&self, track_id: &str, target_id: &str) -> Result<(), ServiceError>;

    async fn stop(&self) -> Result<(), ServiceError>;

    /// Start a local preview clip for `track`. Fire-and-forget once started.
    async fn play_preview(&self, track: &Track) -> Result<PreviewSource, ServiceError>;

    async fn stop_preview(&self);

    /// Whether local previews can play at all.
    fn previews_enabled(&self) -> bool {
        true
    }

    /// Whether previews can play for tracks without a Spotify preview URL.
    fn has_preview_fallback(&self) -> bool {
        false
    }
}

#[async_trait]
impl<T: TrackSource + ?Sized> TrackSource for std::sync::Arc<T> {
    async fn list_tracks(&self) -> Result<Vec<Track>, ServiceError> {
        (**self).list_tracks().await
    }

    async fn list_collections(&self) -> Result<Vec<Collection>, ServiceError> {
        (**self).list_collections().await
    }

    async fn add_track_to_collection(
        &self,
        track_id: &str,
        collection_id: &str,
    ) -> Result<(), ServiceError> {
        (**self).add_track_to_collection(track_id, collection_id).await
    }

    async fn remove_track_from_collection(
        &self,
        track_id: &str,
        collection_id: &str,
    ) -> Result<(), ServiceError> {
        (**self).remove_track_from_collection(track_id, collection_id).await
    }

    async fn create_collection(&self, name: &str) -> Result<Collection, ServiceError> {
        (**self).create_collection(name).await
    }
}

#[async_trait]
impl<T: PlaybackController + ?Sized> PlaybackController for std::sync::Arc<T> {
    async fn list_targets(&self) -> Result<Vec<DeviceInfo>, ServiceError> {
        (**self).list_targets().await
    }

    async fn play(&self, track_id: &str, target_id: &str) -> Result<(), ServiceError> {
        (**self).play(track_id, target_id).await
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        (**self).stop().await
    }

    async fn play_preview(&self, track: &Track) -> Result<PreviewSource, ServiceError> {
        (**self).play_preview(track).await
    }

    async fn stop_preview(&self) {
        (**self).stop_preview().await
    }

    fn previews_enabled(&self) -> bool {
        (**self).previews_enabled()
    }

    fn has_preview_fallback(&self) -> bool {
        (**self).has_preview_fallback()
    }
}

#[cfg(test)]
pub mod mocks {
    //! In-memory collaborators that record every call.

    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use super::*;

    pub fn track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            title: format!("Song {}", id),
            artists: vec![format!("Artist {}", id)],
            album: "Album".to_string(),
            year: Some("2001".to_string()),
            duration_ms: 180_000,
            popularity: Some(50),
            preview_url: None,
            external_url: None,
        }
    }

    pub fn collection(id: &str, name: &str) -> Collection {
        Collection {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    pub fn device(id: &str, active: bool) -> DeviceInfo {
        DeviceInfo {
            id: id.to_string(),
            name: format!("Device {}", id),
            kind: "Computer".to_string(),
            is_active: active,
        }
    }

    /// Track source backed by a map of collection id -> track ids.
    #[derive(Default)]
    pub struct MockSource {
        pub tracks: Vec<Track>,
        pub collections: Mutex<Vec<Collection>>,
        pub contents: Mutex<HashMap<String, Vec<String>>>,
        /// Collections whose adds fail with a network error
        pub failing_adds: HashSet<String>,
        /// Collections whose removals fail with a network error
        pub failing_removes: HashSet<String>,
        /// Adds to these collections fail with an auth error
        pub auth_failing: HashSet<String>,
        pub fail_create: bool,
        pub add_calls: Mutex<Vec<(String, String)>>,
        pub remove_calls: Mutex<Vec<(String, String)>>,
        pub create_calls: Mutex<Vec<String>>,
    }

    impl MockSource {
        pub fn new(track_ids: &[&str], collections: &[(&str, &str)]) -> Self {
            Self {
                tracks: track_ids.iter().map(|id| track(id)).collect(),
                collections: Mutex::new(
                    collections
                        .iter()
                        .map(|(id, name)| collection(id, name))
                        .collect(),
                ),
                ..Default::default()
            }
        }

        pub fn contents_of(&self, collection_id: &str) -> Vec<String> {
            self.contents
                .lock()
                .unwrap()
                .get(collection_id)
                .cloned()
                .unwrap_or_default()
        }

        pub fn add_count(&self) -> usize {
            self.add_calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TrackSource for MockSource {
        async fn list_tracks(&self) -> Result<Vec<Track>, ServiceError> {
            Ok(self.tracks.clone())
        }

        async fn list_collections(&self) -> Result<Vec<Collection>, ServiceError> {
            Ok(self.collections.lock().unwrap().clone())
        }

        async fn add_track_to_collection(
            &self,
            track_id: &str,
            collection_id: &str,
        ) -> Result<(), ServiceError> {
            self.add_calls
                .lock()
                .unwrap()
                .push((track_id.to_string(), collection_id.to_string()));
            if self.auth_failing.contains(collection_id) {
                return Err(ServiceError::Auth("token expired".to_string()));
            }
            if self.failing_adds.contains(collection_id) {
                return Err(ServiceError::Network("connection reset".to_string()));
            }
            self.contents
                .lock()
                .unwrap()
                .entry(collection_id.to_string())
                .or_default()
                .push(track_id.to_string());
            Ok(())
        }

        async fn remove_track_from_collection(
            &self,
            track_id: &str,
            collection_id: &str,
        ) -> Result<(), ServiceError> {
            self.remove_calls
                .lock()
                .unwrap()
                .push((track_id.to_string(), collection_id.to_string()));
            if self.failing_removes.contains(collection_id) {
                return Err(ServiceError::Network("timed out".to_string()));
            }
            if let Some(items) = self.contents.lock().unwrap().get_mut(collection_id) {
                items.retain(|t| t != track_id);
            }
            Ok(())
        }

        async fn create_collection(&self, name: &str) -> Result<Collection, ServiceError> {
            self.create_calls.lock().unwrap().push(name.to_string());
            if self.fail_create {
                return Err(ServiceError::Network("connection refused".to_string()));
            }
            let mut collections = self.collections.lock().unwrap();
            let created = collection(&format!("new{}", collections.len() + 1), name);
            collections.push(created.clone());
            Ok(created)
        }
    }

    /// Playback controller recording every call.
    #[derive(Default)]
    pub struct MockPlayback {
        pub targets: Mutex<Vec<DeviceInfo>>,
        /// Devices on which `play` fails
        pub failing_targets: Mutex<HashSet<String>>,
        /// Previews switched off entirely
        pub previews_disabled: bool,
        pub preview_fallback: bool,
        pub preview_fails: bool,
        pub played: Mutex<Vec<(String, String)>>,
        pub stops: Mutex<usize>,
        pub previews: Mutex<Vec<String>>,
        pub preview_stops: Mutex<usize>,
    }

    impl MockPlayback {
        pub fn with_targets(targets: Vec<DeviceInfo>) -> Self {
            Self {
                targets: Mutex::new(targets),
                ..Default::default()
            }
        }

        pub fn played_tracks(&self) -> Vec<String> {
            self.played
                .lock()
                .unwrap()
                .iter()
                .map(|(track, _)| track.clone())
                .collect()
        }

        pub fn stop_count(&self) -> usize {
            *self.stops.lock().unwrap()
        }

        pub fn preview_stop_count(&self) -> usize {
            *self.preview_stops.lock().unwrap()
        }
    }

    #[async_trait]
    impl PlaybackController for MockPlayback {
        async fn list_targets(&self) -> Result<Vec<DeviceInfo>, ServiceError> {
            Ok(self.targets.lock().unwrap().clone())
        }

        async fn play(&self, track_id: &str, target_id: &str) -> Result<(), ServiceError> {
            if self.failing_targets.lock().unwrap().contains(target_id) {
                return Err(ServiceError::NoActiveDevice);
            }
            self.played
                .lock()
                .unwrap()
                .push((track_id.to_string(), target_id.to_string()));
            Ok(())
        }

        async fn stop(&self) -> Result<(), ServiceError> {
            *self.stops.lock().unwrap() += 1;
            Ok(())
        }

        async fn play_preview(&self, track: &Track) -> Result<PreviewSource, ServiceError> {
            if self.preview_fails {
                return Err(ServiceError::PreviewUnavailable("no clip".to_string()));
            }
            self.previews.lock().unwrap().push(track.id.clone());
            Ok(if track.has_preview() {
                PreviewSource::Spotify
            } else {
                PreviewSource::Itunes
            })
        }

        async fn stop_preview(&self) {
            *self.preview_stops.lock().unwrap() += 1;
        }

        fn previews_enabled(&self) -> bool {
            !self.previews_disabled
        }

        fn has_preview_fallback(&self) -> bool {
            self.preview_fallback
        }
    }
}
