//! Ledger of cached episodes
//!
//! Each cached episode is stored twice:
//! - `<episode id>` holds the JSON [`CacheRecord`] and never expires
//! - `<episode id>:plex-expirer` is an empty marker with the retention TTL
//!
//! The marker's expiry notification is the eviction clock; the record is the
//! data of record and is only deleted once its files are gone.

use crate::error::LedgerResult;
use crate::store::{LedgerStore, LedgerWrite};
use crate::types::CacheRecord;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Suffix that turns an episode id into its expiry marker key
pub const MARKER_SUFFIX: &str = ":plex-expirer";

/// Suffix of the short-lived key guarding an in-flight pre-fetch
pub const CLAIM_SUFFIX: &str = ":plex-claim";

/// How long cached episodes stay in the pool
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(20 * 24 * 60 * 60);

/// Upper bound on how long a crashed request can hold a claim
pub const DEFAULT_CLAIM_TTL: Duration = Duration::from_secs(60 * 60);

pub fn marker_key(episode_id: &str) -> String {
    format!("{}{}", episode_id, MARKER_SUFFIX)
}

pub fn claim_key(episode_id: &str) -> String {
    format!("{}{}", episode_id, CLAIM_SUFFIX)
}

/// Episode id behind an expired key, or `None` if the key is not a marker
pub fn episode_id_from_marker(key: &str) -> Option<&str> {
    key.strip_suffix(MARKER_SUFFIX).filter(|id| !id.is_empty())
}

/// Record store mapping episode ids to their cache metadata
#[derive(Clone)]
pub struct CacheLedger {
    store: Arc<dyn LedgerStore>,
    retention: Duration,
    claim_ttl: Duration,
}

impl CacheLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self::with_retention(store, DEFAULT_RETENTION)
    }

    pub fn with_retention(store: Arc<dyn LedgerStore>, retention: Duration) -> Self {
        Self {
            store,
            retention,
            claim_ttl: DEFAULT_CLAIM_TTL,
        }
    }

    /// Whether an episode is already covered by a cached window.
    ///
    /// The tail of a previous window reports `false` so that reaching it
    /// extends the cache further into the season. Store failures and
    /// unreadable records also count as not cached.
    pub async fn already_cached(&self, episode_id: &str) -> bool {
        match self.lookup(episode_id).await {
            Ok(Some(record)) => !record.is_last_in_window,
            Ok(None) => false,
            Err(e) => {
                warn!(episode = episode_id, error = %e, "Failed to read ledger record");
                false
            }
        }
    }

    /// Write every record of a batch together with its expiry marker.
    ///
    /// The batch goes out in one pipeline but is not transactional.
    pub async fn record(&self, batch: &[CacheRecord]) -> LedgerResult<()> {
        let mut writes = Vec::with_capacity(batch.len() * 2);
        for record in batch {
            writes.push(LedgerWrite {
                key: record.rating_key.clone(),
                value: serde_json::to_string(record)?,
                ttl: None,
            });
            writes.push(LedgerWrite {
                key: marker_key(&record.rating_key),
                value: String::new(),
                ttl: Some(self.retention),
            });
        }

        self.store.write_batch(writes).await?;
        debug!(records = batch.len(), "Recorded cache batch");
        Ok(())
    }

    pub async fn lookup(&self, episode_id: &str) -> LedgerResult<Option<CacheRecord>> {
        match self.store.get(episode_id).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Remove an episode's record; succeeds if it is already gone
    pub async fn delete(&self, episode_id: &str) -> LedgerResult<()> {
        self.store.delete(episode_id).await
    }

    /// Withdraw an episode that never made it into the cache pool, together
    /// with its expiry marker
    pub async fn forget(&self, episode_id: &str) -> LedgerResult<()> {
        self.store.delete(episode_id).await?;
        self.store.delete(&marker_key(episode_id)).await
    }

    /// Take the pre-fetch claim for an episode; `false` if another request holds it
    pub async fn claim(&self, episode_id: &str) -> LedgerResult<bool> {
        self.store
            .set_if_absent(&claim_key(episode_id), "", self.claim_ttl)
            .await
    }

    pub async fn release(&self, episode_id: &str) -> LedgerResult<()> {
        self.store.delete(&claim_key(episode_id)).await
    }
}
