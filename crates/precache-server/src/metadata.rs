//! Season listings backed by the Plex API

use async_trait::async_trait;
use plex_api::{MetadataChildren, PlexClient};
use precache_core::{EpisodeDescriptor, MetadataError, MetadataSource, StreamDescriptor};
use tracing::warn;

pub struct PlexMetadataSource {
    client: PlexClient,
}

impl PlexMetadataSource {
    pub fn new(client: PlexClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetadataSource for PlexMetadataSource {
    async fn season_episodes(&self, season_id: &str) -> Result<Vec<EpisodeDescriptor>, MetadataError> {
        let children = self
            .client
            .season_children(season_id)
            .await
            .map_err(|e| MetadataError(e.to_string()))?;
        Ok(episodes_from(children))
    }
}

/// Flatten a season listing into episode descriptors.
///
/// Items without a media part have nothing to copy and are left out. Only
/// streams that carry a file format (sidecar files) are kept.
fn episodes_from(children: MetadataChildren) -> Vec<EpisodeDescriptor> {
    children
        .media_container
        .metadata
        .into_iter()
        .filter_map(|item| {
            let Some(part) = item.primary_part() else {
                warn!(episode = %item.rating_key, "No media part in season listing, skipping");
                return None;
            };

            let container = if part.container.is_empty() {
                item.media
                    .first()
                    .and_then(|m| m.container.clone())
                    .unwrap_or_default()
            } else {
                part.container.clone()
            };

            let streams = part
                .streams
                .iter()
                .filter_map(|s| {
                    let format = s.format.clone()?;
                    Some(StreamDescriptor {
                        language_tag: s.language_tag.clone().unwrap_or_default(),
                        format,
                    })
                })
                .collect();

            Some(EpisodeDescriptor {
                file: part.file.clone(),
                container,
                streams,
                rating_key: item.rating_key,
                parent_rating_key: item.parent_rating_key,
                grandparent_rating_key: item.grandparent_rating_key,
                title: item.title,
                index: item.index,
                parent_index: item.parent_index,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(json: &str) -> MetadataChildren {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_episodes_from_listing() {
        let children = listing(
            r#"{"MediaContainer": {"Metadata": [
                {"ratingKey": "2003", "parentRatingKey": "2000", "grandparentRatingKey": "1900",
                 "title": "Three", "index": 3, "parentIndex": 2,
                 "Media": [{"container": "mkv", "Part": [{
                    "file": "/data/tvshows/Show/S02/e3.mkv", "container": "mkv",
                    "Stream": [
                        {"streamType": 1, "codec": "h264"},
                        {"streamType": 3, "codec": "srt", "languageTag": "en", "format": "srt"},
                        {"streamType": 3, "codec": "srt", "format": "srt"}
                    ]}]}]}
            ]}}"#,
        );

        let episodes = episodes_from(children);
        assert_eq!(episodes.len(), 1);

        let episode = &episodes[0];
        assert_eq!(episode.rating_key, "2003");
        assert_eq!(episode.parent_rating_key, "2000");
        assert_eq!(episode.index, 3);
        assert_eq!(episode.parent_index, 2);
        assert_eq!(episode.file, "/data/tvshows/Show/S02/e3.mkv");
        assert_eq!(episode.container, "mkv");
        assert_eq!(
            episode.streams,
            vec![
                StreamDescriptor {
                    language_tag: "en".to_string(),
                    format: "srt".to_string(),
                },
                StreamDescriptor {
                    language_tag: String::new(),
                    format: "srt".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_items_without_media_are_skipped() {
        let children = listing(
            r#"{"MediaContainer": {"Metadata": [
                {"ratingKey": "2004", "index": 4, "parentIndex": 2},
                {"ratingKey": "2005", "index": 5, "parentIndex": 2,
                 "Media": [{"Part": [{"file": "/data/tvshows/Show/S02/e5.mp4", "container": "mp4"}]}]}
            ]}}"#,
        );

        let episodes = episodes_from(children);
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].rating_key, "2005");
        assert_eq!(episodes[0].container, "mp4");
    }

    #[test]
    fn test_container_falls_back_to_media_version() {
        let children = listing(
            r#"{"MediaContainer": {"Metadata": [
                {"ratingKey": "2006", "index": 6, "parentIndex": 2,
                 "Media": [{"container": "avi", "Part": [{"file": "/data/tvshows/Show/S02/e6.avi"}]}]}
            ]}}"#,
        );

        let episodes = episodes_from(children);
        assert_eq!(episodes[0].container, "avi");
    }

    #[test]
    fn test_empty_season() {
        let children = listing(r#"{"MediaContainer": {"size": 0}}"#);
        assert!(episodes_from(children).is_empty());
    }
}
