use crate::models::LivePoolInfo;
use crate::rpc::{self, LedgerClient};
use crate::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// How long a tombstone outlives its delete. Refreshes in flight at
/// eviction time finish well within it.
pub const TOMBSTONE_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Default)]
struct Entries {
    live: HashMap<String, LivePoolInfo>,
    /// Pool ids deleted within the ttl; saves for them are dropped
    deleted: HashMap<String, Instant>,
}

/// Live pool snapshots by pool id, with tombstones.
///
/// The swap and price paths always `refresh`, so the live map holds the
/// last snapshot seen per pool and mainly exists for the tombstone rule:
/// once a pool's position is closed, a refresh still running for it must
/// not re-populate the cache.
pub struct PoolInfoCache {
    client: Arc<dyn LedgerClient>,
    entries: RwLock<Entries>,
    tombstone_ttl: Duration,
}

impl PoolInfoCache {
    pub fn new(client: Arc<dyn LedgerClient>) -> Self {
        Self {
            client,
            entries: RwLock::new(Entries::default()),
            tombstone_ttl: TOMBSTONE_TTL,
        }
    }

    pub fn with_tombstone_ttl(mut self, ttl: Duration) -> Self {
        self.tombstone_ttl = ttl;
        self
    }

    /// Last cached snapshot, without touching the ledger
    pub fn get(&self, pool_id: &str) -> Option<LivePoolInfo> {
        self.entries.read().live.get(pool_id).cloned()
    }

    /// Store a snapshot. Ignored once the pool id has been deleted.
    pub fn save(&self, pool_id: &str, info: LivePoolInfo) -> bool {
        let mut entries = self.entries.write();
        if entries.deleted.contains_key(pool_id) {
            tracing::trace!(pool = %pool_id, "ignoring save for deleted pool info");
            return false;
        }
        entries.live.insert(pool_id.to_string(), info);
        true
    }

    /// Evict and tombstone. Tombstones past the ttl are pruned here.
    pub fn delete(&self, pool_id: &str) {
        let now = Instant::now();
        let ttl = self.tombstone_ttl;
        let mut entries = self.entries.write();
        entries.live.remove(pool_id);
        entries.deleted.retain(|_, at| now.duration_since(*at) < ttl);
        entries.deleted.insert(pool_id.to_string(), now);
    }

    pub fn is_deleted(&self, pool_id: &str) -> bool {
        self.entries.read().deleted.contains_key(pool_id)
    }

    pub fn tombstones(&self) -> usize {
        self.entries.read().deleted.len()
    }

    /// Fetch a fresh snapshot from the ledger and cache it (subject to the
    /// tombstone). The fresh value is returned either way.
    pub async fn refresh(&self, pool_id: &str) -> Result<LivePoolInfo> {
        let info = rpc::load_live_pool_info(self.client.as_ref(), pool_id).await?;
        self.save(pool_id, info.clone());
        Ok(info)
    }
}
