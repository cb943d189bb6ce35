//! Local 30 second previews
//!
//! - `fetch`: finds and downloads a clip (Spotify preview URL, then iTunes)
//! - `player`: plays clips on a dedicated audio thread

mod fetch;
mod player;

pub use fetch::PreviewFetcher;
pub use player::PreviewPlayer;
