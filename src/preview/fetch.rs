use std::time::Duration;

use serde::Deserialize;

use crate::config::PreviewSettings;
use crate::error::ServiceError;
use crate::model::{PreviewSource, Track};

const ITUNES_SEARCH_URL: &str = "https://itunes.apple.com/search";

/// Downloads preview clips, trying Spotify's own preview URL before iTunes.
pub struct PreviewFetcher {
    http_client: reqwest::Client,
    itunes_fallback: bool,
    itunes_url: String,
}

#[derive(Debug, Deserialize)]
struct ItunesSearch {
    #[serde(default)]
    results: Vec<ItunesResult>,
}

#[derive(Debug, Deserialize)]
struct ItunesResult {
    #[serde(rename = "previewUrl")]
    preview_url: Option<String>,
}

impl PreviewFetcher {
    pub fn new(settings: &PreviewSettings) -> Result<Self, ServiceError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self {
            http_client,
            itunes_fallback: settings.itunes_fallback,
            itunes_url: ITUNES_SEARCH_URL.to_string(),
        })
    }

    pub fn has_fallback(&self) -> bool {
        self.itunes_fallback
    }

    /// Encoded audio for `track` and where it came from.
    pub async fn fetch(&self, track: &Track) -> Result<(Vec<u8>, PreviewSource), ServiceError> {
        if let Some(url) = &track.preview_url {
            match self.download(url).await {
                Ok(clip) => return Ok((clip, PreviewSource::Spotify)),
                Err(e) => {
                    tracing::debug!(track_id = %track.id, error = %e, "Spotify preview download failed")
                }
            }
        }

        if !self.itunes_fallback {
            return Err(ServiceError::PreviewUnavailable(
                "no Spotify preview".to_string(),
            ));
        }

        let url = self.itunes_preview_url(track).await?.ok_or_else(|| {
            ServiceError::PreviewUnavailable("no match on iTunes".to_string())
        })?;
        let clip = self.download(&url).await?;
        Ok((clip, PreviewSource::Itunes))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ServiceError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await?
            .error_for_status()?;
        let clip = response.bytes().await?;
        tracing::debug!(bytes = clip.len(), "Downloaded preview clip");
        Ok(clip.to_vec())
    }

    async fn itunes_preview_url(&self, track: &Track) -> Result<Option<String>, ServiceError> {
        let term = search_term(track);
        tracing::debug!(term = %term, "Searching iTunes for a preview");

        let search: ItunesSearch = self
            .http_client
            .get(&self.itunes_url)
            .query(&[("term", term.as_str()), ("entity", "song"), ("limit", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(first_preview_url(search))
    }
}

/// "<first artist> <title>", the query iTunes matches best.
fn search_term(track: &Track) -> String {
    match track.artists.first() {
        Some(artist) => format!("{} {}", artist, track.title),
        None => track.title.clone(),
    }
}

fn first_preview_url(search: ItunesSearch) -> Option<String> {
    search
        .results
        .into_iter()
        .next()
        .and_then(|r| r.preview_url)
        .filter(|url| !url.is_empty())
}
