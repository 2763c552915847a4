//! Data types for Plex library metadata responses
//!
//! These structs mirror the subset of the Plex JSON payloads that the client
//! consumes. Unknown fields are ignored.

use serde::Deserialize;

/// Response envelope of `/library/metadata/{id}/children`
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataChildren {
    #[serde(rename = "MediaContainer")]
    pub media_container: MediaContainer,
}

/// Container holding the children of a metadata item
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaContainer {
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub parent_index: Option<u32>,
    #[serde(default)]
    pub parent_title: Option<String>,
    #[serde(default)]
    pub title1: Option<String>,
    #[serde(rename = "Metadata", default)]
    pub metadata: Vec<ChildMetadata>,
}

/// A single child item (an episode, when the parent is a season)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildMetadata {
    pub rating_key: String,
    #[serde(default)]
    pub parent_rating_key: String,
    #[serde(default)]
    pub grandparent_rating_key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub grandparent_title: Option<String>,
    #[serde(rename = "type", default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub parent_index: u32,
    #[serde(rename = "Media", default)]
    pub media: Vec<MediaItem>,
}

impl ChildMetadata {
    /// First part of the first media version, which is the file Plex plays by default
    pub fn primary_part(&self) -> Option<&MediaPart> {
        self.media.first().and_then(|m| m.parts.first())
    }
}

/// One media version of an item
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub video_resolution: Option<String>,
    #[serde(rename = "Part", default)]
    pub parts: Vec<MediaPart>,
}

/// A file backing a media version
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPart {
    #[serde(default)]
    pub id: u64,
    pub file: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub container: String,
    #[serde(rename = "Stream", default)]
    pub streams: Vec<Stream>,
}

/// Audio, video or subtitle stream of a part
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stream {
    #[serde(default)]
    pub id: u64,
    /// 1 = video, 2 = audio, 3 = subtitle
    #[serde(default)]
    pub stream_type: u8,
    #[serde(default)]
    pub codec: Option<String>,
    #[serde(default)]
    pub language_tag: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    /// Present for sidecar files (external subtitles)
    #[serde(default)]
    pub key: Option<String>,
}
