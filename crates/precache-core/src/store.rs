//! Key-value stores backing the cache ledger

use crate::error::LedgerResult;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// One key written as part of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerWrite {
    pub key: String,
    pub value: String,
    /// `None` keeps the key until it is deleted
    pub ttl: Option<Duration>,
}

/// Storage primitives the ledger needs from a key-value store with TTL support
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get(&self, key: &str) -> LedgerResult<Option<String>>;

    /// Write every entry in one buffered round trip, not atomically
    async fn write_batch(&self, writes: Vec<LedgerWrite>) -> LedgerResult<()>;

    /// Set `key` only if it does not exist yet; returns whether it was set
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> LedgerResult<bool>;

    /// Remove `key`; removing a missing key is not an error
    async fn delete(&self, key: &str) -> LedgerResult<()>;
}

/// Redis-backed ledger store
#[derive(Clone)]
pub struct RedisLedgerStore {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisLedgerStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisLedgerStore")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl RedisLedgerStore {
    pub async fn connect(client: redis::Client) -> LedgerResult<Self> {
        let conn = ConnectionManager::new(client).await?;
        let store = Self { conn };
        store.ping().await?;
        info!("Connected to Redis ledger");
        Ok(store)
    }

    pub async fn ping(&self) -> LedgerResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    /// Turn on expired-key notifications (`notify-keyspace-events Ex`)
    pub async fn enable_expiry_notifications(&self) -> LedgerResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("CONFIG")
            .arg("SET")
            .arg("notify-keyspace-events")
            .arg("Ex")
            .query_async::<()>(&mut conn)
            .await?;
        info!("Enabled Redis expired-key notifications");
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for RedisLedgerStore {
    async fn get(&self, key: &str) -> LedgerResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn write_batch(&self, writes: Vec<LedgerWrite>) -> LedgerResult<()> {
        if writes.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for write in &writes {
            match write.ttl {
                Some(ttl) => {
                    pipe.set_ex(&write.key, &write.value, ttl.as_secs()).ignore();
                }
                None => {
                    pipe.set(&write.key, &write.value).ignore();
                }
            }
        }

        let mut conn = self.conn.clone();
        pipe.query_async::<()>(&mut conn).await?;
        debug!(keys = writes.len(), "Pipelined ledger batch");
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> LedgerResult<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> LedgerResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    ttl: Option<Duration>,
}

/// In-process ledger store.
///
/// TTLs are recorded but never enforced and no expiry notifications are
/// emitted, so entries only go away through `delete`.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// TTL a key was written with; `None` if the key is absent
    pub async fn ttl(&self, key: &str) -> Option<Option<Duration>> {
        self.entries.lock().await.get(key).map(|e| e.ttl)
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn get(&self, key: &str) -> LedgerResult<Option<String>> {
        Ok(self.entries.lock().await.get(key).map(|e| e.value.clone()))
    }

    async fn write_batch(&self, writes: Vec<LedgerWrite>) -> LedgerResult<()> {
        let mut entries = self.entries.lock().await;
        for write in writes {
            entries.insert(
                write.key,
                MemoryEntry {
                    value: write.value,
                    ttl: write.ttl,
                },
            );
        }
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> LedgerResult<bool> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                ttl: Some(ttl),
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> LedgerResult<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}
