//! Lookahead window selection

use crate::paths::{subtitle_path, PathMapper};
use crate::types::{CacheRecord, EpisodeDescriptor, PlaybackEvent};
use tracing::{debug, warn};

/// Number of upcoming episodes fetched after the one being watched
pub const DEFAULT_LOOKAHEAD: u32 = 4;

/// Only sidecar subtitles in this format are carried along
const SUBTITLE_FORMAT: &str = "srt";

/// Picks the episodes to pre-fetch and resolves where they go in the cache pool
#[derive(Debug, Clone)]
pub struct LookaheadPlanner {
    mapper: PathMapper,
    lookahead: u32,
}

impl LookaheadPlanner {
    pub fn new(mapper: PathMapper, lookahead: u32) -> Self {
        Self { mapper, lookahead }
    }

    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }

    /// Inclusive ordinal range following the episode being watched
    pub fn window(&self, index: u32) -> (u32, u32) {
        (
            index.saturating_add(1),
            index.saturating_add(self.lookahead),
        )
    }

    /// Build the cache batch for an event.
    ///
    /// Records come back ordered by ordinal. The highest ordinal selected is
    /// the tail of the window, also when the season ends before the window
    /// is full.
    pub fn plan(&self, event: &PlaybackEvent, episodes: &[EpisodeDescriptor]) -> Vec<CacheRecord> {
        let (start, end) = self.window(event.metadata.index);

        let mut selected: Vec<&EpisodeDescriptor> = episodes
            .iter()
            .filter(|e| e.index >= start && e.index <= end)
            .collect();
        selected.sort_by_key(|e| e.index);

        let mut batch: Vec<CacheRecord> = selected
            .into_iter()
            .filter_map(|episode| self.record_for(episode))
            .collect();
        if let Some(tail) = batch.last_mut() {
            tail.is_last_in_window = true;
        }

        debug!(
            episode = event.episode_id(),
            start,
            end,
            planned = batch.len(),
            "Planned lookahead window"
        );
        batch
    }

    fn record_for(&self, episode: &EpisodeDescriptor) -> Option<CacheRecord> {
        let Some(episode_file_path) = self.mapper.to_cache(&episode.file) else {
            warn!(
                episode = %episode.rating_key,
                file = %episode.file,
                "Episode file is outside the library root, skipping"
            );
            return None;
        };

        let srt_file_paths = episode
            .streams
            .iter()
            .filter(|s| s.format == SUBTITLE_FORMAT)
            .map(|s| subtitle_path(&episode_file_path, &episode.container, &s.language_tag, &s.format))
            .collect();

        Some(CacheRecord {
            rating_key: episode.rating_key.clone(),
            parent_rating_key: episode.parent_rating_key.clone(),
            grandparent_rating_key: episode.grandparent_rating_key.clone(),
            title: episode.title.clone(),
            index: episode.index,
            parent_index: episode.parent_index,
            episode_file_path,
            srt_file_paths,
            is_last_in_window: false,
        })
    }
}

impl Default for LookaheadPlanner {
    fn default() -> Self {
        Self::new(PathMapper::default(), DEFAULT_LOOKAHEAD)
    }
}
