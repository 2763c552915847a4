//! HTTP server for the Plex webhook
//!
//! Provides `POST /` (webhook receiver) and `/health`.

use crate::error::WebhookError;
use crate::types::HealthResponse;
use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use precache_core::{Outcome, PlaybackEvent, Precacher, WatcherState};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Form field carrying the JSON event
const PAYLOAD_FIELD: &str = "payload";

/// Upper bound for webhook bodies; Plex attaches a thumbnail to some events
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Shared state for the HTTP server
pub struct ServerState {
    pub precacher: Precacher,
    pub watcher: Option<watch::Receiver<WatcherState>>,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(precacher: Precacher, watcher: Option<watch::Receiver<WatcherState>>) -> Self {
        Self {
            precacher,
            watcher,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Webhook response body
#[derive(Debug, Serialize)]
struct WebhookResponse {
    outcome: String,
}

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/", post(webhook))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server and run until `shutdown` resolves
pub async fn start_server<F>(state: SharedState, port: u16, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds() as u64;

    let watcher = match &state.watcher {
        Some(rx) if rx.has_changed().is_ok() => match *rx.borrow() {
            WatcherState::Listening => "listening",
            WatcherState::Processing => "processing",
        },
        _ => "stopped",
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        watcher: watcher.to_string(),
    })
}

/// Plex webhook receiver
async fn webhook(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<WebhookResponse>, WebhookError> {
    let multipart = multipart.map_err(|e| WebhookError::BadPayload(e.body_text()))?;
    let payload = read_payload(multipart).await?;
    let event: PlaybackEvent = serde_json::from_str(&payload)
        .map_err(|e| WebhookError::BadPayload(format!("invalid event JSON: {}", e)))?;

    debug!(
        event = ?event.event,
        episode = event.episode_id(),
        account = event.account.as_ref().map(|a| a.title.as_str()).unwrap_or(""),
        "Received webhook"
    );

    let outcome = state.precacher.handle(&event).await?;
    Ok(Json(WebhookResponse {
        outcome: outcome_label(&outcome).to_string(),
    }))
}

/// Text of the `payload` form field
async fn read_payload(mut multipart: Multipart) -> Result<String, WebhookError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| WebhookError::BadPayload(e.body_text()))?
    {
        if field.name() == Some(PAYLOAD_FIELD) {
            return field
                .text()
                .await
                .map_err(|e| WebhookError::BadPayload(e.body_text()));
        }
    }
    Err(WebhookError::BadPayload(format!(
        "missing `{}` form field",
        PAYLOAD_FIELD
    )))
}

fn outcome_label(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::Ignored(_) => "ignored",
        Outcome::AlreadyCached => "already_cached",
        Outcome::InProgress => "in_progress",
        Outcome::NothingToCache => "nothing_to_cache",
        Outcome::Cached { .. } => "cached",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use precache_core::{
        CacheLedger, EpisodeDescriptor, FileSync, LookaheadPlanner, MemoryLedgerStore,
        MetadataError, MetadataSource, PathMapper, DEFAULT_LOOKAHEAD,
    };
    use std::path::Path;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    const BOUNDARY: &str = "precache-test-boundary";

    struct StaticSeason {
        episodes: Vec<EpisodeDescriptor>,
        fail: bool,
    }

    #[async_trait]
    impl MetadataSource for StaticSeason {
        async fn season_episodes(
            &self,
            _season_id: &str,
        ) -> Result<Vec<EpisodeDescriptor>, MetadataError> {
            if self.fail {
                return Err(MetadataError("connection refused".to_string()));
            }
            Ok(self.episodes.clone())
        }
    }

    struct Fixture {
        dir: TempDir,
        store: Arc<MemoryLedgerStore>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempdir().unwrap(),
                store: Arc::new(MemoryLedgerStore::new()),
            }
        }

        fn media_root(&self) -> String {
            self.dir.path().join("media").to_string_lossy().into_owned()
        }

        fn cache_root(&self) -> String {
            self.dir.path().join("cache").to_string_lossy().into_owned()
        }

        fn router(&self, season: StaticSeason, watcher: Option<watch::Receiver<WatcherState>>) -> Router {
            let mapper = PathMapper::new("/data/tvshows", &self.media_root(), &self.cache_root());
            let precacher = Precacher::new(
                CacheLedger::new(self.store.clone()),
                LookaheadPlanner::new(mapper, DEFAULT_LOOKAHEAD),
                FileSync::new(),
                Arc::new(season),
            );
            create_router(Arc::new(ServerState::new(precacher, watcher)))
        }

        fn add_source_episode(&self, index: u32) -> EpisodeDescriptor {
            let relative = format!("Show/Season 02/e{}.mkv", index);
            let source = Path::new(&self.media_root()).join(&relative);
            std::fs::create_dir_all(source.parent().unwrap()).unwrap();
            std::fs::write(&source, format!("episode {}", index)).unwrap();

            EpisodeDescriptor {
                rating_key: format!("20{:02}", index),
                parent_rating_key: "2000".to_string(),
                grandparent_rating_key: "1900".to_string(),
                title: format!("Episode {}", index),
                index,
                parent_index: 2,
                file: format!("/data/tvshows/{}", relative),
                container: "mkv".to_string(),
                streams: Vec::new(),
            }
        }
    }

    fn event_json(kind: &str, index: u32) -> String {
        serde_json::json!({
            "event": kind,
            "Account": { "title": "viewer" },
            "Metadata": {
                "librarySectionType": "show",
                "ratingKey": format!("20{:02}", index),
                "parentRatingKey": "2000",
                "grandparentRatingKey": "1900",
                "grandparentTitle": "Show",
                "index": index,
                "parentIndex": 2
            }
        })
        .to_string()
    }

    fn multipart_request(field: &str, value: &str) -> Request<Body> {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"\r\n\r\n{v}\r\n--{b}--\r\n",
            b = BOUNDARY,
            f = field,
            v = value
        );
        Request::builder()
            .method("POST")
            .uri("/")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn empty_season() -> StaticSeason {
        StaticSeason {
            episodes: Vec::new(),
            fail: false,
        }
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let fixture = Fixture::new();
        let (_tx, rx) = watch::channel(WatcherState::Listening);
        let router = fixture.router(empty_season(), Some(rx));

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert!(json["uptime_secs"].as_u64().is_some());
        assert_eq!(json["watcher"], "listening");
    }

    #[tokio::test]
    async fn test_health_reports_stopped_watcher() {
        let fixture = Fixture::new();
        let (tx, rx) = watch::channel(WatcherState::Listening);
        drop(tx);
        let router = fixture.router(empty_season(), Some(rx));

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let json = json_body(response).await;
        assert_eq!(json["watcher"], "stopped");
    }

    #[tokio::test]
    async fn test_stop_event_is_ignored() {
        let fixture = Fixture::new();
        let router = fixture.router(empty_season(), None);

        let response = router
            .oneshot(multipart_request("payload", &event_json("media.stop", 3)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["outcome"], "ignored");
        assert!(fixture.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_play_event_caches_lookahead() {
        let fixture = Fixture::new();
        let episodes: Vec<_> = (1..=5).map(|i| fixture.add_source_episode(i)).collect();
        let router = fixture.router(
            StaticSeason {
                episodes,
                fail: false,
            },
            None,
        );

        let response = router
            .oneshot(multipart_request("payload", &event_json("media.play", 3)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["outcome"], "cached");

        for index in [4, 5] {
            let cached = format!(
                "{}{}/Show/Season 02/e{}.mkv",
                fixture.cache_root(),
                fixture.media_root(),
                index
            );
            assert_eq!(
                std::fs::read_to_string(&cached).unwrap(),
                format!("episode {}", index)
            );
        }
        let keys = fixture.store.keys().await;
        assert!(keys.contains(&"2004:plex-expirer".to_string()));
        assert!(keys.contains(&"2005".to_string()));
    }

    #[tokio::test]
    async fn test_missing_payload_field() {
        let fixture = Fixture::new();
        let router = fixture.router(empty_season(), None);

        let response = router
            .oneshot(multipart_request("thumb", "not an event"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "No payload found");
    }

    #[tokio::test]
    async fn test_non_multipart_body() {
        let fixture = Fixture::new();
        let router = fixture.router(empty_season(), None);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(event_json("media.play", 3)))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unparsable_payload() {
        let fixture = Fixture::new();
        let router = fixture.router(empty_season(), None);

        let response = router
            .oneshot(multipart_request("payload", "{not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(fixture.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_metadata_failure_is_bad_request() {
        let fixture = Fixture::new();
        let router = fixture.router(
            StaticSeason {
                episodes: Vec::new(),
                fail: true,
            },
            None,
        );

        let response = router
            .oneshot(multipart_request("payload", &event_json("media.play", 3)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["error"],
            "Failed to fetch season metadata"
        );
    }

    #[tokio::test]
    async fn test_missing_source_file_is_server_error() {
        let fixture = Fixture::new();
        let mut episode = fixture.add_source_episode(4);
        episode.file = "/data/tvshows/Show/Season 02/gone.mkv".to_string();
        let router = fixture.router(
            StaticSeason {
                episodes: vec![episode],
                fail: false,
            },
            None,
        );

        let response = router
            .oneshot(multipart_request("payload", &event_json("media.play", 3)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_server_state_new() {
        let precacher = Precacher::new(
            CacheLedger::new(Arc::new(MemoryLedgerStore::new())),
            LookaheadPlanner::default(),
            FileSync::new(),
            Arc::new(empty_season()),
        );
        let state = ServerState::new(precacher, None);

        let diff = (Utc::now() - state.started_at).num_seconds();
        assert!((0..5).contains(&diff));
    }
}
