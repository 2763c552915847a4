//! Episode pre-cache engine
//!
//! Decides whether a playback event should pull the next episodes of a
//! season into the cache pool, copies them there, records them in a
//! Redis-backed ledger and evicts them again when their retention marker
//! expires.

pub mod classifier;
pub mod error;
pub mod expiry;
pub mod file_sync;
pub mod ledger;
pub mod metadata;
pub mod paths;
pub mod planner;
pub mod precacher;
pub mod store;
pub mod types;

pub use classifier::{admit, Rejection};
pub use error::{FileSyncError, LedgerError, MetadataError, PrecacheError, Result};
pub use expiry::{
    Eviction, ExpiredKeys, ExpirySubscription, ExpiryWatcher, RunEnd, WatcherHandle, WatcherState,
};
pub use file_sync::FileSync;
pub use ledger::{CacheLedger, DEFAULT_RETENTION, MARKER_SUFFIX};
pub use metadata::MetadataSource;
pub use paths::PathMapper;
pub use planner::{LookaheadPlanner, DEFAULT_LOOKAHEAD};
pub use precacher::{Outcome, Precacher};
pub use store::{LedgerStore, LedgerWrite, MemoryLedgerStore, RedisLedgerStore};
pub use types::{CacheRecord, EpisodeDescriptor, EventKind, PlaybackEvent, StreamDescriptor};
