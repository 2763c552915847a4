//! Error types for the Plex API client

use std::fmt;

/// Errors that can occur when interacting with a Plex Media Server
#[derive(Debug)]
pub enum PlexError {
    /// HTTP request failed
    Http(reqwest::Error),
    /// Failed to parse JSON response
    Json(serde_json::Error),
    /// Server answered with a non-success status
    Status(u16),
    /// Rating key is not a numeric Plex identifier
    InvalidRatingKey(String),
}

impl fmt::Display for PlexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "Plex HTTP error: {}", e),
            Self::Json(e) => write!(f, "Plex JSON parse error: {}", e),
            Self::Status(code) => write!(f, "Plex returned status {}", code),
            Self::InvalidRatingKey(key) => write!(f, "Invalid rating key: {:?}", key),
        }
    }
}

impl std::error::Error for PlexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PlexError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

impl From<serde_json::Error> for PlexError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Result type for Plex API operations
pub type Result<T> = std::result::Result<T, PlexError>;
