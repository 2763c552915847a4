//! Upstream season metadata

use crate::error::MetadataError;
use crate::types::EpisodeDescriptor;
use async_trait::async_trait;

/// Source of the episode listing of a season
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn season_episodes(&self, season_id: &str) -> Result<Vec<EpisodeDescriptor>, MetadataError>;
}
