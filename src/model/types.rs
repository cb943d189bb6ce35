//! Core type definitions for the application

/// A saved track from the user's library
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artists: Vec<String>,
    pub album: String,
    pub year: Option<String>,
    pub duration_ms: u32,
    pub popularity: Option<u32>,
    pub preview_url: Option<String>,
    pub external_url: Option<String>,
}

impl Track {
    pub fn has_preview(&self) -> bool {
        self.preview_url.is_some()
    }

    pub fn uri(&self) -> String {
        format!("spotify:track:{}", self.id)
    }

    /// Web link for the track, falling back to the canonical open.spotify.com URL.
    pub fn web_url(&self) -> String {
        self.external_url
            .clone()
            .unwrap_or_else(|| format!("https://open.spotify.com/track/{}", self.id))
    }

    /// First three artists joined for display.
    pub fn artist_line(&self) -> String {
        if self.artists.is_empty() {
            return "Unknown".to_string();
        }
        self.artists
            .iter()
            .take(3)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Short label used in log lines and status messages.
    pub fn label(&self) -> String {
        format!("{} - {}", self.title, self.artist_line())
    }
}

/// A playlist the user can add tracks to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Collection {
    pub id: String,
    pub name: String,
}

/// Information about a Spotify playback device
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub is_active: bool,
}

/// Where a local preview clip came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreviewSource {
    Spotify,
    Itunes,
}

impl std::fmt::Display for PreviewSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreviewSource::Spotify => write!(f, "Spotify"),
            PreviewSource::Itunes => write!(f, "iTunes"),
        }
    }
}
