//! Session module - the organizing state machine
//!
//! The engine walks the liked-track list one track at a time, applies the
//! user's [`Action`]s against the collaborators and keeps the resume log in
//! step with every disposition.
//!
//! - `command`: parsing of the prompt line into an [`Action`]
//! - `traits`: the Track Source and Playback Controller interfaces

mod command;
mod traits;


use std::collections::{BTreeSet, HashSet};

pub use command::{parse, Action, ParseContext, ParseError};
pub use traits::{PlaybackController, TrackSource};

#[cfg(test)]
pub use traits::mocks;

use crate::error::{ServiceError, SessionError};
use crate::model::{Collection, DeviceInfo, PreviewSource, ResumeStore, Track};

#[derive(Clone, Copy, Debug)]
pub struct SessionOptions {
    /// Start each presented track on the selected device
    pub auto_play: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { auto_play: true }
    }
}

/// How a track was handled
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Disposition {
    Skip,
    Assign {
        /// Collections the track was actually added to
        collections: Vec<Collection>,
        /// Set when this step also created the collection
        created: Option<Collection>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryEntry {
    pub track_id: String,
    pub disposition: Disposition,
}

/// Traversal state owned by the engine
#[derive(Debug, Default)]
pub struct SessionState {
    cursor: usize,
    disposed: HashSet<String>,
    history: Vec<HistoryEntry>,
    preview_playing: Option<String>,
    now_playing: Option<String>,
}

impl SessionState {
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_disposed(&self, track_id: &str) -> bool {
        self.disposed.contains(track_id)
    }

    pub fn disposed_count(&self) -> usize {
        self.disposed.len()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn preview_playing(&self) -> Option<&str> {
        self.preview_playing.as_deref()
    }
}

/// Outcome of trying to start the presented track on a device
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlaybackStatus {
    Started(DeviceInfo),
    /// The track was already started earlier and keeps playing
    Continuing,
    /// Auto-play is switched off
    Disabled,
    /// No device has been selected; previews only
    NoTarget,
    /// Playback failed even after re-selecting a device
    Unavailable(String),
}

#[derive(Clone, Debug)]
pub enum Next {
    Track { track: Track, playback: PlaybackStatus },
    Complete,
}

/// Per-destination result of an assignment
#[derive(Clone, Debug)]
pub struct AssignReport {
    pub track: Track,
    pub succeeded: Vec<Collection>,
    pub failed: Vec<(Collection, ServiceError)>,
    pub created: Option<Collection>,
    /// Whether the resume log entry was written
    pub persisted: bool,
}

#[derive(Clone, Debug)]
pub struct RevertReport {
    pub track: Track,
    pub disposition: Disposition,
    /// Collections whose remote removal failed; they may still hold the track
    pub irreversible: Vec<(Collection, ServiceError)>,
    /// A collection created by the reverted step. It is left in place.
    pub orphaned: Option<Collection>,
    pub persisted: bool,
}

#[derive(Clone, Debug)]
pub enum ApplyResult {
    Skipped { track: Track },
    Assigned(AssignReport),
    /// No destination accepted the track; it stays current
    AssignFailed(AssignReport),
    PreviewStarted(PreviewSource),
    PreviewStopped,
    Open(String),
    Reverted(RevertReport),
    Quit,
}

impl ApplyResult {
    /// Whether the cursor moved past the track that was current.
    pub fn advances(&self) -> bool {
        matches!(self, ApplyResult::Skipped { .. } | ApplyResult::Assigned(_))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub skipped: usize,
    pub assigned: usize,
    pub created: Vec<Collection>,
    pub remaining: usize,
    pub total: usize,
}

pub struct SessionEngine<S, P> {
    source: S,
    playback: P,
    store: ResumeStore,
    tracks: Vec<Track>,
    collections: Vec<Collection>,
    created: Vec<Collection>,
    state: SessionState,
    target: Option<DeviceInfo>,
    options: SessionOptions,
    finished: bool,
}

impl<S: TrackSource, P: PlaybackController> SessionEngine<S, P> {
    /// Build the session from the fetched library and the resume log.
    ///
    /// Fails with [`SessionError::EmptyLibrary`] when nothing is left to organize.
    pub fn start(
        tracks: Vec<Track>,
        mut collections: Vec<Collection>,
        store: ResumeStore,
        source: S,
        playback: P,
        options: SessionOptions,
    ) -> Result<Self, SessionError> {
        collections.sort_by_key(|c| c.name.to_lowercase());

        let state = SessionState {
            disposed: store.ids().map(str::to_string).collect(),
            ..Default::default()
        };

        let mut engine = Self {
            source,
            playback,
            store,
            tracks,
            collections,
            created: Vec::new(),
            state,
            target: None,
            options,
            finished: false,
        };
        engine.seek();

        let already_done = engine
            .tracks
            .iter()
            .filter(|t| engine.state.is_disposed(&t.id))
            .count();
        if engine.current().is_none() {
            tracing::warn!(total = engine.tracks.len(), already_done, "Nothing left to organize");
            return Err(SessionError::EmptyLibrary);
        }

        tracing::info!(
            total = engine.tracks.len(),
            already_done,
            collections = engine.collections.len(),
            "Session started"
        );
        Ok(engine)
    }

    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.state.cursor)
    }

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn target(&self) -> Option<&DeviceInfo> {
        self.target.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn resume_path(&self) -> &std::path::Path {
        self.store.path()
    }

    /// Whether `p` can do anything for the current track.
    pub fn preview_available(&self) -> bool {
        self.current().is_some_and(|t| self.can_preview(t))
    }

    pub fn parse_context(&self) -> ParseContext {
        ParseContext {
            collection_count: self.collections.len(),
            preview_available: self.preview_available(),
        }
    }

    /// (1-based position of the current track, total tracks)
    pub fn progress(&self) -> (usize, usize) {
        let total = self.tracks.len();
        let done = self
            .tracks
            .iter()
            .filter(|t| self.state.is_disposed(&t.id))
            .count();
        ((done + 1).min(total), total)
    }

    pub fn summary(&self) -> SessionSummary {
        let skipped = self
            .state
            .history
            .iter()
            .filter(|e| e.disposition == Disposition::Skip)
            .count();
        let remaining = self
            .tracks
            .iter()
            .filter(|t| !self.state.is_disposed(&t.id))
            .count();

        SessionSummary {
            skipped,
            assigned: self.state.history.len() - skipped,
            created: self.created.clone(),
            remaining,
            total: self.tracks.len(),
        }
    }

    pub async fn targets(&self) -> Result<Vec<DeviceInfo>, ServiceError> {
        self.playback.list_targets().await
    }

    pub fn select_target(&mut self, device: DeviceInfo) {
        tracing::info!(device = %device.name, device_id = %device.id, "Playback device selected");
        self.target = Some(device);
        self.state.now_playing = None;
    }

    /// Move to the first track not yet disposed and start it on the device.
    pub async fn next(&mut self) -> Next {
        self.seek();
        if self.finished {
            return Next::Complete;
        }
        let Some(track) = self.current().cloned() else {
            return Next::Complete;
        };
        let playback = self.autoplay(&track).await;
        Next::Track { track, playback }
    }

    pub async fn apply(&mut self, action: Action) -> Result<ApplyResult, SessionError> {
        if self.finished {
            return Err(SessionError::Finished);
        }

        tracing::debug!(action = ?action, cursor = self.state.cursor, "Applying action");
        match action {
            Action::Skip => self.skip().await,
            Action::AssignToCollections(indices) => self.assign(&indices).await,
            Action::CreateAndAssign(name) => self.create_and_assign(name.as_deref()).await,
            Action::TogglePreview => self.toggle_preview().await,
            Action::OpenExternally => self.open(),
            Action::Back => self.back().await,
            Action::Quit => {
                self.finish().await?;
                tracing::info!("User quit the session");
                Ok(ApplyResult::Quit)
            }
        }
    }

    /// Stop audio and flush the resume log. Further actions are rejected.
    pub async fn finish(&mut self) -> Result<(), SessionError> {
        self.halt_audio().await;
        self.finished = true;
        self.store.flush()?;

        let summary = self.summary();
        tracing::info!(
            skipped = summary.skipped,
            assigned = summary.assigned,
            created = summary.created.len(),
            remaining = summary.remaining,
            "Session finished"
        );
        Ok(())
    }

    fn seek(&mut self) {
        self.state.cursor = self
            .tracks
            .iter()
            .position(|t| !self.state.disposed.contains(&t.id))
            .unwrap_or(self.tracks.len());
    }

    fn current_track(&self) -> Result<Track, SessionError> {
        self.current().cloned().ok_or(SessionError::NoCurrentTrack)
    }

    async fn autoplay(&mut self, track: &Track) -> PlaybackStatus {
        if !self.options.auto_play {
            return PlaybackStatus::Disabled;
        }
        if self.state.now_playing.as_deref() == Some(track.id.as_str()) {
            return PlaybackStatus::Continuing;
        }
        let Some(target) = self.target.clone() else {
            return PlaybackStatus::NoTarget;
        };

        let err = match self.playback.play(&track.id, &target.id).await {
            Ok(()) => {
                tracing::debug!(track_id = %track.id, device = %target.name, "Started playback");
                self.state.now_playing = Some(track.id.clone());
                return PlaybackStatus::Started(target);
            }
            Err(e) => e,
        };

        tracing::warn!(error = %err, device = %target.name, "Playback failed, re-selecting device");
        let Some(fallback) = self.reselect_target(&target).await else {
            self.target = None;
            return PlaybackStatus::Unavailable(err.to_string());
        };

        match self.playback.play(&track.id, &fallback.id).await {
            Ok(()) => {
                tracing::info!(device = %fallback.name, "Playback resumed on re-selected device");
                self.state.now_playing = Some(track.id.clone());
                self.target = Some(fallback.clone());
                PlaybackStatus::Started(fallback)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Playback unavailable, continuing with previews only");
                self.target = None;
                PlaybackStatus::Unavailable(e.to_string())
            }
        }
    }

    async fn reselect_target(&self, previous: &DeviceInfo) -> Option<DeviceInfo> {
        let devices = match self.playback.list_targets().await {
            Ok(devices) => devices,
            Err(e) => {
                tracing::debug!(error = %e, "Could not list devices");
                return None;
            }
        };
        devices
            .iter()
            .find(|d| d.id == previous.id)
            .or_else(|| devices.iter().find(|d| d.is_active))
            .or_else(|| devices.first())
            .cloned()
    }

    /// Stop the preview and any device playback started for the current track.
    async fn halt_audio(&mut self) {
        if self.state.preview_playing.take().is_some() {
            self.playback.stop_preview().await;
        }
        if self.state.now_playing.take().is_some() {
            if let Err(e) = self.playback.stop().await {
                tracing::debug!(error = %e, "Stopping device playback failed");
            }
        }
    }

    async fn skip(&mut self) -> Result<ApplyResult, SessionError> {
        let track = self.current_track()?;

        self.store.record(&track.id)?;
        self.state.disposed.insert(track.id.clone());
        self.state.history.push(HistoryEntry {
            track_id: track.id.clone(),
            disposition: Disposition::Skip,
        });
        self.halt_audio().await;
        self.seek();

        tracing::info!(action = "skip", track_id = %track.id, track = %track.label(), "Track skipped");
        Ok(ApplyResult::Skipped { track })
    }

    /// Map 1-based indices to collections, rejecting the whole selection on
    /// the first bad index so nothing is sent.
    fn resolve(&self, indices: &BTreeSet<usize>) -> Result<Vec<Collection>, SessionError> {
        let count = self.collections.len();
        if indices.is_empty() {
            return Err(SessionError::InvalidSelection { index: 0, count });
        }
        indices
            .iter()
            .map(|&index| {
                if index == 0 || index > count {
                    Err(SessionError::InvalidSelection { index, count })
                } else {
                    Ok(self.collections[index - 1].clone())
                }
            })
            .collect()
    }

    async fn assign(&mut self, indices: &BTreeSet<usize>) -> Result<ApplyResult, SessionError> {
        let track = self.current_track()?;
        let targets = self.resolve(indices)?;
        self.commit_assign(track, targets, None).await
    }

    async fn create_and_assign(&mut self, name: Option<&str>) -> Result<ApplyResult, SessionError> {
        let track = self.current_track()?;
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(SessionError::EmptyCollectionName)?;

        let lowered = name.to_lowercase();
        if self.collections.iter().any(|c| c.name.to_lowercase() == lowered) {
            return Err(SessionError::DuplicateCollection(name.to_string()));
        }

        let created = match self.source.create_collection(name).await {
            Ok(created) => created,
            Err(ServiceError::Auth(msg)) => return Err(SessionError::AuthFailure(msg)),
            Err(e) => {
                tracing::error!(name, error = %e, "Creating collection failed");
                return Err(e.into());
            }
        };

        tracing::info!(action = "create", name = %created.name, collection_id = %created.id, "Collection created");
        self.collections.push(created.clone());
        self.created.push(created.clone());

        self.commit_assign(track, vec![created.clone()], Some(created))
            .await
    }

    async fn commit_assign(
        &mut self,
        track: Track,
        targets: Vec<Collection>,
        created: Option<Collection>,
    ) -> Result<ApplyResult, SessionError> {
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        let mut auth_error: Option<String> = None;

        for collection in targets {
            if let Some(msg) = &auth_error {
                failed.push((collection, ServiceError::Auth(msg.clone())));
                continue;
            }
            match self
                .source
                .add_track_to_collection(&track.id, &collection.id)
                .await
            {
                Ok(()) => {
                    tracing::info!(
                        action = "assign",
                        track_id = %track.id,
                        collection = %collection.name,
                        "Added track to collection"
                    );
                    succeeded.push(collection);
                }
                Err(e) => {
                    tracing::warn!(
                        track_id = %track.id,
                        collection = %collection.name,
                        error = %e,
                        "Adding track to collection failed"
                    );
                    if let ServiceError::Auth(msg) = &e {
                        auth_error = Some(msg.clone());
                    }
                    failed.push((collection, e));
                }
            }
        }

        let mut report = AssignReport {
            track,
            succeeded,
            failed,
            created,
            persisted: false,
        };

        if report.succeeded.is_empty() {
            return match auth_error {
                Some(msg) => Err(SessionError::AuthFailure(msg)),
                None => Ok(ApplyResult::AssignFailed(report)),
            };
        }

        let track_id = report.track.id.clone();
        self.state.disposed.insert(track_id.clone());
        self.state.history.push(HistoryEntry {
            track_id: track_id.clone(),
            disposition: Disposition::Assign {
                collections: report.succeeded.clone(),
                created: report.created.clone(),
            },
        });
        report.persisted = match self.store.record(&track_id) {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(track_id = %track_id, error = %e, "Could not write resume log");
                false
            }
        };
        self.halt_audio().await;
        self.seek();

        match auth_error {
            Some(msg) => Err(SessionError::AuthFailure(msg)),
            None => Ok(ApplyResult::Assigned(report)),
        }
    }

    fn can_preview(&self, track: &Track) -> bool {
        self.playback.previews_enabled()
            && (track.has_preview() || self.playback.has_preview_fallback())
    }

    async fn toggle_preview(&mut self) -> Result<ApplyResult, SessionError> {
        let track = self.current_track()?;

        if self.state.preview_playing.as_deref() == Some(track.id.as_str()) {
            self.playback.stop_preview().await;
            self.state.preview_playing = None;
            tracing::debug!(track_id = %track.id, "Preview stopped");
            return Ok(ApplyResult::PreviewStopped);
        }

        if !self.can_preview(&track) {
            return Err(SessionError::PreviewUnavailable);
        }

        match self.playback.play_preview(&track).await {
            Ok(source) => {
                tracing::debug!(track_id = %track.id, source = %source, "Preview started");
                self.state.preview_playing = Some(track.id);
                Ok(ApplyResult::PreviewStarted(source))
            }
            Err(ServiceError::PreviewUnavailable(reason)) => {
                tracing::info!(track_id = %track.id, reason = %reason, "No preview found");
                Err(SessionError::PreviewUnavailable)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn open(&self) -> Result<ApplyResult, SessionError> {
        let track = self.current_track()?;
        tracing::info!(action = "open", track_id = %track.id, "Opening track externally");
        Ok(ApplyResult::Open(track.web_url()))
    }

    async fn back(&mut self) -> Result<ApplyResult, SessionError> {
        let entry = self
            .state
            .history
            .pop()
            .ok_or(SessionError::NothingToUndo)?;

        let track = self
            .tracks
            .iter()
            .find(|t| t.id == entry.track_id)
            .cloned()
            .ok_or(SessionError::NoCurrentTrack)?;

        let mut irreversible = Vec::new();
        let mut orphaned = None;
        if let Disposition::Assign {
            collections,
            created,
        } = &entry.disposition
        {
            for collection in collections {
                match self
                    .source
                    .remove_track_from_collection(&track.id, &collection.id)
                    .await
                {
                    Ok(()) => {
                        tracing::info!(
                            track_id = %track.id,
                            collection = %collection.name,
                            "Removed track from collection"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            track_id = %track.id,
                            collection = %collection.name,
                            error = %e,
                            "Remote collection may still contain the track"
                        );
                        irreversible.push((collection.clone(), e));
                    }
                }
            }
            if let Some(created) = created {
                tracing::warn!(collection = %created.name, "Collection created by the reverted step is kept");
                orphaned = Some(created.clone());
            }
        }

        self.state.disposed.remove(&track.id);
        let persisted = match self.store.retract(&track.id) {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(track_id = %track.id, error = %e, "Could not write resume log");
                false
            }
        };
        self.halt_audio().await;
        self.seek();

        tracing::info!(action = "back", track_id = %track.id, "Reopened previous track");

        let auth_error = irreversible.iter().find_map(|(_, e)| match e {
            ServiceError::Auth(msg) => Some(msg.clone()),
            _ => None,
        });
        if let Some(msg) = auth_error {
            return Err(SessionError::AuthFailure(msg));
        }

        Ok(ApplyResult::Reverted(RevertReport {
            track,
            disposition: entry.disposition,
            irreversible,
            orphaned,
            persisted,
        }))
    }
}
