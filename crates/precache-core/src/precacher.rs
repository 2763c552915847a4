//! Handling of a single playback event, from admission to copied files

use crate::classifier::{self, Rejection};
use crate::error::Result;
use crate::file_sync::FileSync;
use crate::ledger::CacheLedger;
use crate::metadata::MetadataSource;
use crate::planner::LookaheadPlanner;
use crate::types::{CacheRecord, PlaybackEvent};
use std::sync::Arc;
use tracing::{error, info, warn};

/// What happened to a playback event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Event does not qualify for pre-caching
    Ignored(Rejection),
    /// Episode sits inside a window that is already cached
    AlreadyCached,
    /// Another request is pre-caching from this episode right now
    InProgress,
    /// Nothing left in the season after this episode
    NothingToCache,
    Cached { episodes: usize, files: usize },
}

/// Pre-fetch pipeline shared by every entry point
#[derive(Clone)]
pub struct Precacher {
    ledger: CacheLedger,
    planner: LookaheadPlanner,
    file_sync: FileSync,
    metadata: Arc<dyn MetadataSource>,
}

impl Precacher {
    pub fn new(
        ledger: CacheLedger,
        planner: LookaheadPlanner,
        file_sync: FileSync,
        metadata: Arc<dyn MetadataSource>,
    ) -> Self {
        Self {
            ledger,
            planner,
            file_sync,
            metadata,
        }
    }

    pub fn ledger(&self) -> &CacheLedger {
        &self.ledger
    }

    pub async fn handle(&self, event: &PlaybackEvent) -> Result<Outcome> {
        let episode_id = event.episode_id();

        if let Some(reason) = classifier::rejection(event) {
            info!(event = ?event.event, episode = episode_id, reason = %reason, "Not caching");
            return Ok(Outcome::Ignored(reason));
        }

        if self.ledger.already_cached(episode_id).await {
            info!(episode = episode_id, "Already cached");
            return Ok(Outcome::AlreadyCached);
        }

        let claimed = match self.ledger.claim(episode_id).await {
            Ok(true) => true,
            Ok(false) => {
                info!(episode = episode_id, "Pre-fetch already in progress");
                return Ok(Outcome::InProgress);
            }
            Err(e) => {
                warn!(episode = episode_id, error = %e, "Could not claim episode, continuing unguarded");
                false
            }
        };

        let result = self.fetch_ahead(event).await;

        if claimed {
            if let Err(e) = self.ledger.release(episode_id).await {
                warn!(episode = episode_id, error = %e, "Failed to release claim");
            }
        }
        result
    }

    async fn fetch_ahead(&self, event: &PlaybackEvent) -> Result<Outcome> {
        let episode_id = event.episode_id();
        let episodes = self.metadata.season_episodes(event.season_id()).await?;

        let batch = self.planner.plan(event, &episodes);
        if batch.is_empty() {
            info!(episode = episode_id, "No upcoming episodes to cache");
            return Ok(Outcome::NothingToCache);
        }

        // Copying goes ahead without a ledger entry; those files are never evicted
        if let Err(e) = self.ledger.record(&batch).await {
            error!(episode = episode_id, error = %e, "Failed to record cache batch");
        }

        let mut files = 0;
        for (position, record) in batch.iter().enumerate() {
            match self.file_sync.copy_record(record, self.planner.mapper()).await {
                Ok(copied) => files += copied,
                Err(e) => {
                    self.withdraw(&batch[position..]).await;
                    return Err(e.into());
                }
            }
        }

        info!(
            episode = episode_id,
            show = %event.metadata.grandparent_title,
            episodes = batch.len(),
            files,
            "Cached upcoming episodes"
        );
        Ok(Outcome::Cached {
            episodes: batch.len(),
            files,
        })
    }

    /// Drop ledger entries of records whose files were not all copied
    async fn withdraw(&self, records: &[CacheRecord]) {
        for record in records {
            if let Err(e) = self.ledger.forget(&record.rating_key).await {
                error!(episode = %record.rating_key, error = %e, "Failed to withdraw ledger record");
            }
        }
        warn!(records = records.len(), "Withdrew records after failed copy");
    }
}
