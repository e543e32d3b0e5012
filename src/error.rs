//! Unified error handling for the tracking engine.
//!
//! Failures are handled locally by the component that hits them: callers
//! of the public controller/monitor operations never see errors, only
//! state (status strings, presence or absence of data). `TrackError` is
//! the internal currency of the store and geocoder modules.

use thiserror::Error;

/// Unified error type for tracking-engine operations.
#[derive(Debug, Error)]
pub enum TrackError {
    /// Durable record store read or write failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Snapshot (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reverse-geocode lookup failed.
    #[error("geocode error: {0}")]
    Geocode(String),

    /// HTTP transport error from the remote geocoder.
    #[error("http error: {0}")]
    Http(String),
}

impl From<rusqlite::Error> for TrackError {
    fn from(e: rusqlite::Error) -> Self {
        TrackError::Persistence(e.to_string())
    }
}

impl From<reqwest::Error> for TrackError {
    fn from(e: reqwest::Error) -> Self {
        TrackError::Http(e.to_string())
    }
}

/// Result type alias for tracking-engine operations.
pub type Result<T> = std::result::Result<T, TrackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrackError::Persistence("disk full".to_string());
        assert!(err.to_string().contains("disk full"));

        let err = TrackError::Geocode("no placemark".to_string());
        assert!(err.to_string().starts_with("geocode error"));
    }
}
