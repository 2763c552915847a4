//! Time-driven eviction
//!
//! Redis publishes the name of every expired key on
//! `__keyevent@<db>__:expired` once `notify-keyspace-events` includes `Ex`.
//! The watcher follows that channel, picks out ledger markers and evicts the
//! matching episode from the cache pool.
//!
//! When the pub/sub connection drops, the watcher resubscribes with
//! exponential backoff and keeps going until it is shut down. Delivery is
//! at-most-once: markers that expire while the watcher is not subscribed are
//! never seen again and their records stay behind.

use crate::error::LedgerResult;
use crate::file_sync::FileSync;
use crate::ledger::{episode_id_from_marker, CacheLedger};
use futures::stream::BoxStream;
use futures::{future, Stream, StreamExt};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Keyevent channel carrying expired key names for a database
pub fn expired_channel(db: i64) -> String {
    format!("__keyevent@{}__:expired", db)
}

/// What the watcher is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Listening,
    Processing,
}

/// Outcome of handling one expired key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eviction {
    /// Key is not a ledger marker
    Ignored,
    /// No record left for the episode
    Missing,
    /// Files removed and record deleted
    Evicted { files: usize },
    /// Something went wrong; the record, if any, is left in place
    Failed,
}

/// First delay before resubscribing after the notification stream ends
pub const RECONNECT_DELAY: Duration = Duration::from_millis(500);

/// Upper bound for the resubscribe backoff
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// Expired key names, as handed to the watcher
pub type ExpiredKeys = BoxStream<'static, String>;

/// Pattern subscription to the expired-key channel
pub struct ExpirySubscription {
    client: redis::Client,
    db: i64,
    pubsub: redis::aio::PubSub,
}

impl ExpirySubscription {
    pub async fn connect(client: &redis::Client, db: i64) -> LedgerResult<Self> {
        let channel = expired_channel(db);
        let mut pubsub = client.get_async_pubsub().await?;
        pubsub.psubscribe(&channel).await?;
        info!(channel = %channel, "Subscribed to expired-key notifications");
        Ok(Self {
            client: client.clone(),
            db,
            pubsub,
        })
    }

    /// Names of expired keys. The stream owns the pub/sub connection; dropping
    /// it closes the connection, which ends the subscription on the server.
    pub fn into_keys(self) -> ExpiredKeys {
        self.pubsub
            .into_on_message()
            .filter_map(|msg| future::ready(msg.get_payload::<String>().ok()))
            .boxed()
    }
}

/// Why a pass over an expired-key stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    Shutdown,
    StreamEnded,
}

/// Evicts episodes whose expiry marker has fired
#[derive(Clone)]
pub struct ExpiryWatcher {
    ledger: CacheLedger,
    file_sync: FileSync,
    reconnect_delay: Duration,
    max_reconnect_delay: Duration,
}

impl ExpiryWatcher {
    pub fn new(ledger: CacheLedger, file_sync: FileSync) -> Self {
        Self {
            ledger,
            file_sync,
            reconnect_delay: RECONNECT_DELAY,
            max_reconnect_delay: MAX_RECONNECT_DELAY,
        }
    }

    /// Backoff used between resubscribe attempts; doubles up to `max`
    pub fn with_reconnect_delay(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_delay = initial;
        self.max_reconnect_delay = max.max(initial);
        self
    }

    /// Handle one expired key
    pub async fn process(&self, key: &str) -> Eviction {
        let Some(episode_id) = episode_id_from_marker(key) else {
            return Eviction::Ignored;
        };
        info!(episode = episode_id, "Retention elapsed, evicting episode");

        let record = match self.ledger.lookup(episode_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(episode = episode_id, "No ledger record, nothing to evict");
                return Eviction::Missing;
            }
            Err(e) => {
                error!(episode = episode_id, error = %e, "Failed to read ledger record");
                return Eviction::Failed;
            }
        };

        let mut removed = 0;
        let mut failed = false;
        for file in record.files() {
            match self.file_sync.remove(Path::new(file)).await {
                Ok(()) => {
                    info!(episode = episode_id, file, "Removed from cache pool");
                    removed += 1;
                }
                Err(e) => {
                    error!(episode = episode_id, file, error = %e, "Failed to remove cached file");
                    failed = true;
                }
            }
        }

        if failed {
            warn!(episode = episode_id, "Keeping ledger record after failed removal");
            return Eviction::Failed;
        }

        if let Err(e) = self.ledger.delete(episode_id).await {
            error!(episode = episode_id, error = %e, "Failed to delete ledger record");
            return Eviction::Failed;
        }

        Eviction::Evicted { files: removed }
    }

    /// Consume expired keys one at a time until the stream ends or shutdown is signalled
    pub async fn run<S>(
        &self,
        keys: S,
        shutdown: &mut oneshot::Receiver<()>,
        state: &watch::Sender<WatcherState>,
    ) -> RunEnd
    where
        S: Stream<Item = String>,
    {
        tokio::pin!(keys);

        loop {
            tokio::select! {
                _ = &mut *shutdown => return RunEnd::Shutdown,
                next = keys.next() => match next {
                    Some(key) => {
                        state.send_replace(WatcherState::Processing);
                        let outcome = self.process(&key).await;
                        debug!(key = %key, outcome = ?outcome, "Processed expired key");
                        state.send_replace(WatcherState::Listening);
                    }
                    None => return RunEnd::StreamEnded,
                }
            }
        }
    }

    /// Run on a Redis subscription in a background task, resubscribing
    /// whenever the connection drops.
    pub fn spawn(self, subscription: ExpirySubscription) -> WatcherHandle {
        let client = subscription.client.clone();
        let db = subscription.db;
        self.spawn_with(subscription.into_keys(), move || {
            let client = client.clone();
            async move {
                ExpirySubscription::connect(&client, db)
                    .await
                    .map(ExpirySubscription::into_keys)
            }
        })
    }

    /// Run on `keys` in a background task. When a stream ends, `resubscribe`
    /// is called with exponential backoff until it yields the next one. Only
    /// the handle's shutdown signal stops the task.
    pub fn spawn_with<C, F>(self, keys: ExpiredKeys, resubscribe: C) -> WatcherHandle
    where
        C: FnMut() -> F + Send + 'static,
        F: Future<Output = LedgerResult<ExpiredKeys>> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (state_tx, state_rx) = watch::channel(WatcherState::Listening);

        let task = tokio::spawn(async move {
            self.supervise(keys, resubscribe, shutdown_rx, state_tx).await;
            info!("Expiry watcher stopped");
        });

        WatcherHandle {
            shutdown: Some(shutdown_tx),
            state: state_rx,
            task,
        }
    }

    async fn supervise<C, F>(
        &self,
        mut keys: ExpiredKeys,
        mut resubscribe: C,
        mut shutdown: oneshot::Receiver<()>,
        state: watch::Sender<WatcherState>,
    ) where
        C: FnMut() -> F,
        F: Future<Output = LedgerResult<ExpiredKeys>>,
    {
        loop {
            if self.run(keys, &mut shutdown, &state).await == RunEnd::Shutdown {
                return;
            }
            warn!("Expired-key stream ended, resubscribing");

            let mut delay = self.reconnect_delay;
            keys = loop {
                tokio::select! {
                    _ = &mut shutdown => return,
                    _ = tokio::time::sleep(delay) => {}
                }
                let attempt = tokio::select! {
                    _ = &mut shutdown => return,
                    attempt = resubscribe() => attempt,
                };
                match attempt {
                    Ok(keys) => break keys,
                    Err(e) => {
                        delay = (delay * 2).min(self.max_reconnect_delay);
                        warn!(error = %e, retry_in = ?delay, "Failed to resubscribe to expired-key notifications");
                    }
                }
            };
        }
    }
}

/// Control handle of a running watcher. Dropping it also stops the watcher.
pub struct WatcherHandle {
    shutdown: Option<oneshot::Sender<()>>,
    state: watch::Receiver<WatcherState>,
    task: JoinHandle<()>,
}

impl WatcherHandle {
    pub fn state(&self) -> WatcherState {
        *self.state.borrow()
    }

    /// Independent view of the watcher state, e.g. for health reporting
    pub fn state_receiver(&self) -> watch::Receiver<WatcherState> {
        self.state.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signal shutdown and wait for the watcher to release its subscription
    pub async fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(e) = (&mut self.task).await {
            error!(error = %e, "Expiry watcher task failed");
        }
    }
}
