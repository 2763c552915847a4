//! Error types for the pre-cache server

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt;

/// Startup and configuration failures; these end the process
#[derive(Debug)]
pub enum ServerError {
    Config(String),
    Ledger(precache_core::LedgerError),
    Plex(plex_api::PlexError),
    Io(Box<std::io::Error>),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ServerError::Ledger(err) => write!(f, "Ledger error: {}", err),
            ServerError::Plex(err) => write!(f, "Plex client error: {}", err),
            ServerError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Ledger(err) => Some(err),
            ServerError::Plex(err) => Some(err),
            ServerError::Io(err) => Some(err.as_ref()),
            ServerError::Config(_) => None,
        }
    }
}

impl From<precache_core::LedgerError> for ServerError {
    fn from(err: precache_core::LedgerError) -> Self {
        ServerError::Ledger(err)
    }
}

impl From<redis::RedisError> for ServerError {
    fn from(err: redis::RedisError) -> Self {
        ServerError::Ledger(err.into())
    }
}

impl From<plex_api::PlexError> for ServerError {
    fn from(err: plex_api::PlexError) -> Self {
        ServerError::Plex(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for ServerError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ServerError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

/// Webhook failures, mapped onto HTTP status codes
#[derive(Debug)]
pub enum WebhookError {
    /// Missing or unparsable payload
    BadPayload(String),
    /// Season metadata could not be fetched
    Upstream(String),
    /// Copying into the cache pool failed
    Copy(String),
}

impl From<precache_core::PrecacheError> for WebhookError {
    fn from(err: precache_core::PrecacheError) -> Self {
        match err {
            precache_core::PrecacheError::Metadata(e) => WebhookError::Upstream(e.to_string()),
            precache_core::PrecacheError::Copy(e) => WebhookError::Copy(e.to_string()),
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            WebhookError::BadPayload(msg) => {
                tracing::warn!(error = %msg, "Could not parse payload");
                (StatusCode::BAD_REQUEST, "No payload found".to_string())
            }
            WebhookError::Upstream(msg) => {
                tracing::error!(error = %msg, "Failed to fetch season metadata");
                (
                    StatusCode::BAD_REQUEST,
                    "Failed to fetch season metadata".to_string(),
                )
            }
            WebhookError::Copy(msg) => {
                tracing::error!(error = %msg, "Could not copy episodes");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to copy episodes".to_string(),
                )
            }
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ServerError::Config("PLEX_API_KEY is required".to_string());
        assert_eq!(
            format!("{}", err),
            "Configuration error: PLEX_API_KEY is required"
        );
    }

    #[test]
    fn test_webhook_error_statuses() {
        let cases = [
            (WebhookError::BadPayload("x".into()), StatusCode::BAD_REQUEST),
            (WebhookError::Upstream("x".into()), StatusCode::BAD_REQUEST),
            (WebhookError::Copy("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_precache_error_mapping() {
        let err = WebhookError::from(precache_core::PrecacheError::Metadata(
            precache_core::MetadataError("timeout".to_string()),
        ));
        assert!(matches!(err, WebhookError::Upstream(msg) if msg.contains("timeout")));
    }
}
