use crate::error::BotError;
use crate::layout;
use crate::models::MarketDescriptor;
use crate::rpc::LedgerClient;
use crate::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Market descriptors by market id, first-writer-wins, fetched on miss
pub struct MarketCache {
    client: Arc<dyn LedgerClient>,
    markets: RwLock<HashMap<String, MarketDescriptor>>,
}

impl MarketCache {
    pub fn new(client: Arc<dyn LedgerClient>) -> Self {
        Self {
            client,
            markets: RwLock::new(HashMap::new()),
        }
    }

    /// Store a descriptor unless one is already present. Returns whether it was stored.
    pub fn save(&self, market_id: &str, market: MarketDescriptor) -> bool {
        let mut markets = self.markets.write();
        if markets.contains_key(market_id) {
            return false;
        }
        tracing::trace!(market = %market_id, "caching market");
        markets.insert(market_id.to_string(), market);
        true
    }

    pub fn get(&self, market_id: &str) -> Option<MarketDescriptor> {
        self.markets.read().get(market_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.markets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.read().is_empty()
    }

    /// Cached descriptor, or fetch and decode the market account.
    /// Concurrent misses may both fetch; the first stored value wins.
    pub async fn get_or_fetch(&self, market_id: &str) -> Result<MarketDescriptor> {
        if let Some(market) = self.get(market_id) {
            return Ok(market);
        }

        let data = self
            .client
            .get_account_data(market_id)
            .await?
            .ok_or_else(|| BotError::AccountNotFound(market_id.to_string()))?;
        let market = layout::decode_market(&data)?;

        self.save(market_id, market.clone());
        Ok(self.get(market_id).unwrap_or(market))
    }

    /// Warm the cache with a batch fetch. Missing or undecodable
    /// accounts are skipped. Returns how many descriptors were stored.
    pub async fn load(&self, market_ids: &[String]) -> Result<usize> {
        if market_ids.is_empty() {
            return Ok(0);
        }

        let accounts = self.client.get_multiple_accounts(market_ids).await?;
        let mut stored = 0;

        for (market_id, data) in market_ids.iter().zip(accounts) {
            let Some(data) = data else {
                tracing::warn!(market = %market_id, "tracked market account not found");
                continue;
            };
            match layout::decode_market(&data) {
                Ok(market) => {
                    if self.save(market_id, market) {
                        stored += 1;
                    }
                }
                Err(e) => tracing::warn!(market = %market_id, "skipping tracked market: {}", e),
            }
        }

        Ok(stored)
    }
}
