//! Core types for the pre-cache server

use precache_core::{PathMapper, DEFAULT_LOOKAHEAD};
use serde::Serialize;
use std::time::Duration;

/// Configuration for the pre-cache server
#[derive(Debug, Clone)]
pub struct PrecacheConfig {
    pub port: u16,
    pub redis_url: String,
    pub redis_db: i64,
    /// Issue `CONFIG SET notify-keyspace-events Ex` at startup
    pub configure_notifications: bool,
    pub plex_url: String,
    pub plex_token: String,
    /// Root of the TV library as Plex reports it
    pub library_root: String,
    /// Same library as mounted in this process
    pub media_root: String,
    pub cache_root: String,
    pub cache_ttl_days: u64,
    pub lookahead: u32,
}

impl PrecacheConfig {
    pub fn path_mapper(&self) -> PathMapper {
        PathMapper::new(&self.library_root, &self.media_root, &self.cache_root)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_days * 24 * 60 * 60)
    }
}

impl Default for PrecacheConfig {
    fn default() -> Self {
        Self {
            port: 4001,
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            redis_db: 0,
            configure_notifications: false,
            plex_url: "http://127.0.0.1:32400".to_string(),
            plex_token: String::new(),
            library_root: "/data/tvshows".to_string(),
            media_root: "/media/tvshows".to_string(),
            cache_root: "/cache".to_string(),
            cache_ttl_days: 20,
            lookahead: DEFAULT_LOOKAHEAD,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    /// `listening`, `processing` or `stopped`
    pub watcher: String,
}
