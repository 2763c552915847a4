//! Plex Pre-cache Server
//!
//! Receives Plex playback webhooks, copies the next episodes of a season into
//! the cache pool and removes them again once their retention expires.

mod error;
mod metadata;
mod server;
mod types;

use crate::error::{Result, ServerError};
use crate::metadata::PlexMetadataSource;
use crate::server::{start_server, ServerState, SharedState};
use crate::types::PrecacheConfig;
use plex_api::PlexClient;
use precache_core::{
    CacheLedger, ExpirySubscription, ExpiryWatcher, FileSync, LookaheadPlanner, Precacher,
    RedisLedgerStore,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the environment may already be set
    let _ = dotenvy::dotenv();

    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("precache_server=info".parse()?)
        .add_directive("precache_core=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting Plex pre-cache server...");

    let config = load_config()?;
    info!("Port: {}", config.port);
    info!("Plex: {}", config.plex_url);
    info!(
        "Library root: {} -> media root: {}",
        config.library_root, config.media_root
    );
    info!("Cache root: {}", config.cache_root);
    info!("Cache TTL: {} days", config.cache_ttl_days);
    info!("Lookahead: {} episodes", config.lookahead);

    // Ledger store
    let client = redis::Client::open(config.redis_url.as_str())?;
    let store = RedisLedgerStore::connect(client.clone()).await?;
    info!("Connected to Redis");

    if config.configure_notifications {
        if let Err(e) = store.enable_expiry_notifications().await {
            warn!(error = %e, "Could not enable keyspace expiry notifications");
        }
    }

    let ledger = CacheLedger::with_retention(Arc::new(store), config.retention());

    // Expiry watcher
    let subscription = ExpirySubscription::connect(&client, config.redis_db).await?;
    let watcher = ExpiryWatcher::new(ledger.clone(), FileSync::new()).spawn(subscription);
    info!("Expiry watcher listening");

    // Pre-fetch pipeline
    let plex = PlexClient::new(&config.plex_url, &config.plex_token)?;
    let planner = LookaheadPlanner::new(config.path_mapper(), config.lookahead);
    let precacher = Precacher::new(
        ledger,
        planner,
        FileSync::new(),
        Arc::new(PlexMetadataSource::new(plex)),
    );

    let state: SharedState = Arc::new(ServerState::new(
        precacher,
        Some(watcher.state_receiver()),
    ));

    let served = start_server(state, config.port, shutdown_signal()).await;

    info!("Stopping expiry watcher");
    watcher.close().await;

    served?;
    info!("Shut down cleanly");
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

fn load_config() -> Result<PrecacheConfig> {
    config_from(|key| std::env::var(key).ok())
}

fn config_from<F>(var: F) -> Result<PrecacheConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = PrecacheConfig::default();

    let port = var("PORT")
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(defaults.port);

    let redis_url = match var("REDIS_URL") {
        Some(url) if url.starts_with("redis://") || url.starts_with("rediss://") => url,
        Some(url) => format!("redis://{}", url),
        None => defaults.redis_url,
    };

    let redis_db = var("REDIS_DB")
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(defaults.redis_db);

    let configure_notifications = var("REDIS_CONFIGURE_NOTIFICATIONS")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(defaults.configure_notifications);

    let plex_token = var("PLEX_API_KEY")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ServerError::Config("PLEX_API_KEY is required".to_string()))?;

    let plex_url = match (var("PLEX_URL"), var("PLEX_IP")) {
        (Some(url), _) => url,
        (None, Some(ip)) => format!("http://{}", ip),
        (None, None) => defaults.plex_url,
    };
    url::Url::parse(&plex_url)
        .map_err(|e| ServerError::Config(format!("invalid Plex URL {:?}: {}", plex_url, e)))?;

    let library_root = var("PLEX_LIBRARY_ROOT").unwrap_or(defaults.library_root);
    let media_root = var("MEDIA_ROOT").unwrap_or(defaults.media_root);
    let cache_root = var("CACHE_ROOT").unwrap_or(defaults.cache_root);

    let cache_ttl_days = var("CACHE_TTL_DAYS")
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(defaults.cache_ttl_days);

    let lookahead = var("LOOKAHEAD")
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(defaults.lookahead);
    if lookahead == 0 {
        return Err(ServerError::Config(
            "LOOKAHEAD must be at least 1".to_string(),
        ));
    }

    Ok(PrecacheConfig {
        port,
        redis_url,
        redis_db,
        configure_notifications,
        plex_url,
        plex_token,
        library_root,
        media_root,
        cache_root,
        cache_ttl_days,
        lookahead,
    })
}
