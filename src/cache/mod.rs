// Cache module with an in-memory fallback when Redis is not configured

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Invalid TTL")]
    InvalidTtl,
}

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;
    /// Stores `value` only when `key` is absent. Returns whether it was stored.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration)
        -> Result<bool, CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|expires_at| Instant::now() > expires_at)
            .unwrap_or(false)
    }
}

/// Entry count at which writes first sweep expired entries.
const DEFAULT_PURGE_THRESHOLD: usize = 1024;

#[derive(Debug)]
struct Entries {
    map: HashMap<String, CacheEntry>,
    purge_at: usize,
}

impl Entries {
    /// Inserts `entry`, first dropping expired entries once the map has
    /// grown past `purge_at`. Keys that are only ever written never hit the
    /// lazy expiry in `get`.
    fn insert(&mut self, key: &str, entry: CacheEntry, threshold: usize) {
        if self.map.len() >= self.purge_at {
            let before = self.map.len();
            self.map.retain(|_, e| !e.is_expired());
            self.purge_at = (self.map.len() * 2).max(threshold);
            debug!(
                purged = before - self.map.len(),
                remaining = self.map.len(),
                "purged expired cache entries"
            );
        }
        self.map.insert(key.to_string(), entry);
    }
}

/// Process-local cache. Entries expire on access and are swept on write
/// when the map grows.
#[derive(Debug, Clone)]
pub struct InMemoryCache {
    store: Arc<RwLock<Entries>>,
    purge_threshold: usize,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::with_purge_threshold(DEFAULT_PURGE_THRESHOLD)
    }
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_purge_threshold(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            store: Arc::new(RwLock::new(Entries {
                map: HashMap::new(),
                purge_at: threshold,
            })),
            purge_threshold: threshold,
        }
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        {
            let store = self.store.read().await;
            match store.map.get(key) {
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        self.store.write().await.map.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        if ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(CacheError::InvalidTtl);
        }
        let mut store = self.store.write().await;
        store.insert(
            key,
            CacheEntry::new(value.to_string(), ttl),
            self.purge_threshold,
        );
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        if ttl.is_zero() {
            return Err(CacheError::InvalidTtl);
        }
        let mut store = self.store.write().await;
        if store.map.get(key).is_some_and(|entry| !entry.is_expired()) {
            return Ok(false);
        }
        store.insert(
            key,
            CacheEntry::new(value.to_string(), Some(ttl)),
            self.purge_threshold,
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.store.write().await.map.remove(key);
        Ok(())
    }
}

/// Redis-backed cache shared across service instances.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(client: &redis::Client) -> Result<Self, CacheError> {
        let conn = ConnectionManager::new(client.clone()).await?;
        debug!("redis cache connection established");
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value = redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut conn)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            let millis = ttl.as_millis() as u64;
            if millis == 0 {
                return Err(CacheError::InvalidTtl);
            }
            cmd.arg("PX").arg(millis);
        }
        cmd.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let millis = ttl.as_millis() as u64;
        if millis == 0 {
            return Err(CacheError::InvalidTtl);
        }
        let mut conn = self.conn.clone();
        // SET NX replies OK when stored and nil otherwise
        let reply = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(millis)
            .query_async::<_, Option<String>>(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, i64>(&mut conn)
            .await?;
        Ok(())
    }
}
