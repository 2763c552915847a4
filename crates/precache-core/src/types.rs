//! Core types for the pre-cache engine

use serde::{Deserialize, Deserializer, Serialize};

/// Kind of a Plex webhook event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "media.play")]
    Play,
    #[serde(rename = "media.resume")]
    Resume,
    #[serde(rename = "media.pause")]
    Pause,
    #[serde(rename = "media.stop")]
    Stop,
    #[serde(rename = "media.scrobble")]
    Scrobble,
    #[serde(rename = "media.rate")]
    Rate,
    #[serde(other)]
    Other,
}

impl EventKind {
    /// Whether the event means someone just started watching
    pub fn is_playback_start(self) -> bool {
        matches!(self, EventKind::Play | EventKind::Resume)
    }
}

/// Playback event as delivered by the media server webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackEvent {
    pub event: EventKind,
    #[serde(rename = "Account", default)]
    pub account: Option<EventAccount>,
    #[serde(rename = "Player", default)]
    pub player: Option<EventPlayer>,
    #[serde(rename = "Metadata", default)]
    pub metadata: EventMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventAccount {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPlayer {
    #[serde(default)]
    pub title: String,
}

/// Metadata of the item the event refers to
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    #[serde(default)]
    pub library_section_type: String,
    /// Episode identifier
    #[serde(default)]
    pub rating_key: String,
    /// Season identifier
    #[serde(default)]
    pub parent_rating_key: String,
    /// Series identifier
    #[serde(default)]
    pub grandparent_rating_key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub grandparent_title: String,
    /// Episode ordinal within its season
    #[serde(default)]
    pub index: u32,
    /// Season ordinal within its series
    #[serde(default)]
    pub parent_index: u32,
}

impl PlaybackEvent {
    pub fn episode_id(&self) -> &str {
        &self.metadata.rating_key
    }

    pub fn season_id(&self) -> &str {
        &self.metadata.parent_rating_key
    }
}

/// Subtitle (or any other) stream attached to an episode file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub language_tag: String,
    pub format: String,
}

/// One episode from a season listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeDescriptor {
    pub rating_key: String,
    pub parent_rating_key: String,
    pub grandparent_rating_key: String,
    pub title: String,
    pub index: u32,
    pub parent_index: u32,
    /// Source file path as reported by the media server
    pub file: String,
    /// Container of the source file, which is also its extension
    pub container: String,
    pub streams: Vec<StreamDescriptor>,
}

/// Ledger entry describing one cached episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    pub rating_key: String,
    pub parent_rating_key: String,
    pub grandparent_rating_key: String,
    pub title: String,
    pub index: u32,
    pub parent_index: u32,
    /// Location of the episode inside the cache pool
    pub episode_file_path: String,
    /// Locations of the episode's sidecar subtitles inside the cache pool
    #[serde(default, deserialize_with = "null_as_empty")]
    pub srt_file_paths: Vec<String>,
    /// Tail of the lookahead batch this episode was cached with
    #[serde(rename = "isLast")]
    pub is_last_in_window: bool,
}

impl CacheRecord {
    /// Every cache pool file belonging to this episode, episode file first
    pub fn files(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.episode_file_path.as_str())
            .chain(self.srt_file_paths.iter().map(String::as_str))
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
