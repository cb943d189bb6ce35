//! Error types shared by the session engine and its collaborators.
//!
//! Collaborators (Spotify, preview audio) report [`ServiceError`]; the engine
//! reports [`SessionError`]. Setup code in `main` wraps everything in `anyhow`.

/// Failure reported by a collaborator (Track Source or Playback Controller).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Credentials were rejected or expired. Fatal to the session.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Transport error, timeout or unexpected response.
    #[error("network error: {0}")]
    Network(String),

    /// Spotify has no device to play on.
    #[error("no active playback device")]
    NoActiveDevice,

    /// No preview audio could be found or played.
    #[error("preview unavailable: {0}")]
    PreviewUnavailable(String),

    /// Anything the remote service rejected for another reason.
    #[error("{0}")]
    Rejected(String),
}

impl ServiceError {
    /// Map an HTTP status returned by the Web API.
    ///
    /// 404 is left as `Rejected` here: only the playback endpoints read it as
    /// "no active device" (see [`ServiceError::from_playback`]).
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => ServiceError::Auth(message),
            400 | 404 | 429 => ServiceError::Rejected(message),
            _ => ServiceError::Network(message),
        }
    }

    /// Like the `From` conversion, but a 404 from a player endpoint means
    /// Spotify has no device to act on.
    pub fn from_playback(err: rspotify::ClientError) -> Self {
        match http_status(&err) {
            Some(status) => ServiceError::from_playback_status(status, err.to_string()),
            None => err.into(),
        }
    }

    fn from_playback_status(status: u16, message: String) -> Self {
        match status {
            404 => ServiceError::NoActiveDevice,
            _ => ServiceError::from_status(status, message),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ServiceError::Auth(_))
    }
}

/// Status code of a response the Web API rejected, if that is what failed.
fn http_status(err: &rspotify::ClientError) -> Option<u16> {
    match err {
        rspotify::ClientError::Http(http) => match &**http {
            rspotify::http::HttpError::StatusCode(response) => Some(response.status().as_u16()),
            _ => None,
        },
        _ => None,
    }
}

impl From<rspotify::ClientError> for ServiceError {
    fn from(err: rspotify::ClientError) -> Self {
        if matches!(err, rspotify::ClientError::InvalidToken) {
            return ServiceError::Auth(err.to_string());
        }
        match http_status(&err) {
            Some(status) => ServiceError::from_status(status, err.to_string()),
            None => ServiceError::Network(err.to_string()),
        }
    }
}

impl From<rspotify::model::IdError> for ServiceError {
    fn from(err: rspotify::model::IdError) -> Self {
        ServiceError::Rejected(format!("invalid Spotify id: {}", err))
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::Network("request timed out".to_string())
        } else {
            ServiceError::Network(err.to_string())
        }
    }
}

/// Failure of a single session transition.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Every track in the library has already been handled.
    #[error("no unprocessed tracks left in the library")]
    EmptyLibrary,

    /// A selection index is outside the displayed collection list.
    #[error("selection {index} is out of range (1-{count})")]
    InvalidSelection { index: usize, count: usize },

    #[error("no track is currently selected")]
    NoCurrentTrack,

    #[error("nothing to go back to")]
    NothingToUndo,

    #[error("collection name must not be empty")]
    EmptyCollectionName,

    #[error("a collection named '{0}' already exists")]
    DuplicateCollection(String),

    /// Local preview requested for a track that has none.
    #[error("no preview available for this track")]
    PreviewUnavailable,

    /// Credentials were rejected by a collaborator; the session must end.
    #[error("authentication failed: {0}")]
    AuthFailure(String),

    /// A collaborator call failed in a way that left nothing to commit.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The resume log could not be written.
    #[error("could not update resume log: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("the session has already finished")]
    Finished,
}

impl SessionError {
    /// Whether the interactive loop must stop after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::AuthFailure(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_kinds() {
        assert!(ServiceError::from_status(401, "Unauthorized").is_auth());
        assert!(ServiceError::from_status(403, "Forbidden").is_auth());
        assert!(matches!(
            ServiceError::from_status(404, "Not Found"),
            ServiceError::Rejected(_)
        ));
        assert!(matches!(
            ServiceError::from_status(429, "Too Many Requests"),
            ServiceError::Rejected(_)
        ));
        assert!(matches!(
            ServiceError::from_status(502, "Bad Gateway"),
            ServiceError::Network(_)
        ));
    }

    #[test]
    fn not_found_means_no_device_only_for_playback() {
        assert_eq!(
            ServiceError::from_playback_status(404, "Not Found".into()),
            ServiceError::NoActiveDevice
        );
        assert!(ServiceError::from_playback_status(401, "Unauthorized".into()).is_auth());
        assert_ne!(
            ServiceError::from_status(404, "Not Found"),
            ServiceError::NoActiveDevice
        );
    }

    #[test]
    fn transport_errors_stay_network_whatever_the_url() {
        let err = rspotify::ClientError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "error sending request for url \
             (https://api.spotify.com/v1/playlists/3cEYpjA9oz9GiPac4AsH401/tracks): \
             connection reset by peer",
        ));
        let mapped = ServiceError::from(err);
        assert!(!mapped.is_auth());
        assert!(matches!(mapped, ServiceError::Network(_)));

        let err = rspotify::ClientError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "https://api.spotify.com/v1/playlists/0404aBcD/tracks timed out",
        ));
        assert!(matches!(ServiceError::from_playback(err), ServiceError::Network(_)));
    }

    #[test]
    fn invalid_token_is_an_auth_failure() {
        assert!(ServiceError::from(rspotify::ClientError::InvalidToken).is_auth());
    }

    #[test]
    fn only_auth_failures_are_fatal() {
        assert!(SessionError::AuthFailure("expired".into()).is_fatal());
        assert!(!SessionError::EmptyLibrary.is_fatal());
        assert!(!SessionError::InvalidSelection { index: 9, count: 5 }.is_fatal());
        assert!(!SessionError::Service(ServiceError::Network("x".into())).is_fatal());
    }
}
