//! Model module - library data and persisted session state
//!
//! - `types`: tracks, collections and devices as the session sees them
//! - `resume`: append-only log of tracks already handled
//! - `spotify_client`: Spotify Web API wrapper, the production Track Source

mod resume;
mod spotify_client;
mod types;

pub use resume::{ResumeStore, DEFAULT_RESUME_FILE};
pub use spotify_client::SpotifyClient;
pub use types::{Collection, DeviceInfo, PreviewSource, Track};
