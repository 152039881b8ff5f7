use crate::models::PoolIdentity;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Pool identities keyed by base mint. Entries are never replaced.
///
/// This is the record of every pool the bot qualified since start (or
/// loaded from the tracking list). It is what a later balance change is
/// resolved against, and the first-writer-wins save is also what keeps
/// repeated notifications for one pool from triggering repeat buys, so
/// entries are kept for the life of the process.
#[derive(Default)]
pub struct PoolCache {
    pools: RwLock<HashMap<String, PoolIdentity>>,
}

impl PoolCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pool. A second save for the same base mint is a no-op.
    pub fn save(&self, identity: PoolIdentity) -> bool {
        let mut pools = self.pools.write();
        if pools.contains_key(&identity.base_mint) {
            return false;
        }
        tracing::trace!(mint = %identity.base_mint, pool = %identity.pool_id, "caching pool");
        pools.insert(identity.base_mint.clone(), identity);
        true
    }

    pub fn get(&self, base_mint: &str) -> Option<PoolIdentity> {
        self.pools.read().get(base_mint).cloned()
    }

    pub fn has(&self, base_mint: &str) -> bool {
        self.pools.read().contains_key(base_mint)
    }

    pub fn len(&self) -> usize {
        self.pools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.read().is_empty()
    }

    pub fn snapshot(&self) -> Vec<PoolIdentity> {
        self.pools.read().values().cloned().collect()
    }

    /// Bulk insert under the same first-writer-wins rule
    pub fn load(&self, identities: impl IntoIterator<Item = PoolIdentity>) -> usize {
        identities
            .into_iter()
            .filter(|identity| self.save(identity.clone()))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(mint: &str, pool: &str) -> PoolIdentity {
        PoolIdentity {
            pool_id: pool.to_string(),
            base_mint: mint.to_string(),
            market_id: format!("market-{}", pool),
            base_decimals: 6,
            pool_open_time: 0,
        }
    }

    #[test]
    fn test_save_existing_key_is_noop() {
        let cache = PoolCache::new();

        assert!(cache.save(identity("mint", "pool-1")));
        assert!(!cache.save(identity("mint", "pool-2")));

        assert_eq!(cache.get("mint").unwrap().pool_id, "pool-1");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_has_and_snapshot() {
        let cache = PoolCache::new();
        cache.save(identity("a", "p1"));
        cache.save(identity("b", "p2"));

        assert!(cache.has("a"));
        assert!(!cache.has("c"));

        let mut pools: Vec<_> = cache.snapshot().into_iter().map(|p| p.pool_id).collect();
        pools.sort();
        assert_eq!(pools, vec!["p1", "p2"]);
    }

    #[test]
    fn test_load_counts_new_entries_only() {
        let cache = PoolCache::new();
        cache.save(identity("a", "p1"));

        let stored = cache.load(vec![identity("a", "p9"), identity("b", "p2")]);

        assert_eq!(stored, 1);
        assert_eq!(cache.get("a").unwrap().pool_id, "p1");
    }
}
