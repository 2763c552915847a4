//! Plex Media Server HTTP client

use crate::error::{PlexError, Result};
use crate::types::MetadataChildren;
use std::time::Duration;
use tracing::debug;

/// Client for a single Plex Media Server
///
/// Every request carries the server token in the `X-Plex-Token` header and
/// asks for JSON instead of the default XML.
pub struct PlexClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl PlexClient {
    /// Header Plex reads the access token from
    pub const TOKEN_HEADER: &'static str = "X-Plex-Token";

    /// Create a new client with default settings (30 second timeout)
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        Self::with_timeout(base_url, token, Duration::from_secs(30))
    }

    /// Create a new client with a custom timeout
    pub fn with_timeout(base_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the children of a season, i.e. its episodes, including stream details
    ///
    /// # Arguments
    /// * `season_rating_key` - The rating key of the season (numeric Plex ID)
    pub async fn season_children(&self, season_rating_key: &str) -> Result<MetadataChildren> {
        let url = self.children_url(season_rating_key)?;
        debug!(url = %url, "Fetching season children from Plex");

        let response = self
            .http
            .get(&url)
            .header(Self::TOKEN_HEADER, &self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PlexError::Status(response.status().as_u16()));
        }

        let body = response.bytes().await?;
        let children: MetadataChildren = serde_json::from_slice(&body)?;

        debug!(
            season = season_rating_key,
            episodes = children.media_container.metadata.len(),
            "Fetched season children"
        );
        Ok(children)
    }

    fn children_url(&self, rating_key: &str) -> Result<String> {
        let key: u64 = rating_key
            .trim()
            .parse()
            .map_err(|_| PlexError::InvalidRatingKey(rating_key.to_string()))?;

        Ok(format!(
            "{}/library/metadata/{}/children?includeElements=Stream",
            self.base_url, key
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_url() {
        let client = PlexClient::new("http://plex.local:32400/", "secret").unwrap();
        assert_eq!(client.base_url(), "http://plex.local:32400");
        assert_eq!(
            client.children_url("1000").unwrap(),
            "http://plex.local:32400/library/metadata/1000/children?includeElements=Stream"
        );
    }

    #[test]
    fn test_children_url_rejects_non_numeric_key() {
        let client = PlexClient::new("http://plex.local:32400", "secret").unwrap();
        let err = client.children_url("../etc").unwrap_err();
        assert!(matches!(err, PlexError::InvalidRatingKey(_)));
    }

    #[tokio::test]
    async fn test_season_children_invalid_key_makes_no_request() {
        let client = PlexClient::new("http://127.0.0.1:9", "secret").unwrap();
        let result = client.season_children("not-a-number").await;
        assert!(matches!(result, Err(PlexError::InvalidRatingKey(_))));
    }
}
