use crate::models::TrackedMarket;
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::collections::HashMap;
use tokio::time::{timeout, Duration};

/// Tracked markets keyed by base mint
pub const MARKETS: &str = "markets";
/// Free-form bookkeeping written at shutdown
pub const TRACK: &str = "track";

/// Flat key-value storage grouped into named collections
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<String>>;

    async fn set(&self, collection: &str, key: &str, value: &str) -> Result<()>;

    /// Returns whether the key existed
    async fn delete(&self, collection: &str, key: &str) -> Result<bool>;

    async fn entries(&self, collection: &str) -> Result<Vec<(String, String)>>;
}

/// Redis-backed store
///
/// Each collection is one hash: `{namespace}:{collection}`
pub struct RedisStore {
    conn: ConnectionManager,
    namespace: String,
}

impl RedisStore {
    /// Connect to Redis
    ///
    /// # Arguments
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    /// * `namespace` - Key prefix shared by every collection
    pub async fn new(redis_url: &str, namespace: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;

        // Add 5 second timeout to connection attempt
        let conn = timeout(Duration::from_secs(5), ConnectionManager::new(client))
            .await
            .map_err(|_| {
                crate::error::BotError::Persistence(
                    "Redis connection timeout after 5 seconds".to_string(),
                )
            })??;

        tracing::info!("Connected to Redis at {}", redis_url);

        Ok(Self {
            conn,
            namespace: namespace.to_string(),
        })
    }

    fn hash_key(&self, collection: &str) -> String {
        format!("{}:{}", self.namespace, collection)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.hget(self.hash_key(collection), key).await?;
        Ok(value)
    }

    async fn set(&self, collection: &str, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(self.hash_key(collection), key, value)
            .await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: usize = conn.hdel(self.hash_key(collection), key).await?;
        Ok(removed > 0)
    }

    async fn entries(&self, collection: &str) -> Result<Vec<(String, String)>> {
        let mut conn = self.conn.clone();
        let all: HashMap<String, String> = conn.hgetall(self.hash_key(collection)).await?;
        Ok(all.into_iter().collect())
    }
}

/// Process-local store for tests and runs without Redis
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<String>> {
        Ok(self
            .collections
            .lock()
            .get(collection)
            .and_then(|c| c.get(key).cloned()))
    }

    async fn set(&self, collection: &str, key: &str, value: &str) -> Result<()> {
        self.collections
            .lock()
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        Ok(self
            .collections
            .lock()
            .get_mut(collection)
            .map(|c| c.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn entries(&self, collection: &str) -> Result<Vec<(String, String)>> {
        Ok(self
            .collections
            .lock()
            .get(collection)
            .map(|c| c.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }
}

/// Read the tracking list. Malformed entries are logged and skipped.
pub async fn load_tracking_list(store: &dyn KeyValueStore) -> Result<Vec<TrackedMarket>> {
    let mut markets = Vec::new();

    for (base_mint, raw) in store.entries(MARKETS).await? {
        match serde_json::from_str::<TrackedMarket>(&raw) {
            Ok(entry) => markets.push(entry),
            Err(e) => tracing::warn!(mint = %base_mint, "skipping malformed tracking entry: {}", e),
        }
    }

    tracing::info!("Loaded {} tracked markets", markets.len());

    Ok(markets)
}

/// Write every entry under its base mint. Returns how many were written.
pub async fn save_tracking_list(store: &dyn KeyValueStore, markets: &[TrackedMarket]) -> Result<usize> {
    for entry in markets {
        let value = serde_json::to_string(entry)?;
        store.set(MARKETS, &entry.base_mint, &value).await?;
    }

    tracing::debug!("Saved {} tracked markets", markets.len());

    Ok(markets.len())
}

/// Best-effort record of in-flight work at shutdown
pub async fn save_shutdown_snapshot(store: &dyn KeyValueStore, active_sells: usize) -> Result<()> {
    store
        .set(TRACK, "active_sells", &active_sells.to_string())
        .await?;
    store
        .set(TRACK, "snapshot_at", &Utc::now().to_rfc3339())
        .await?;
    Ok(())
}
