pub mod json_rpc;
#[cfg(test)]
pub(crate) mod testing;

pub use json_rpc::JsonRpcClient;

use crate::error::BotError;
use crate::layout;
use crate::models::{Blockhash, LivePoolInfo, SignatureStatus, TokenAmount};
use crate::Result;
use async_trait::async_trait;

/// Point queries against the ledger node.
///
/// Every method is one round trip; callers own retry policy.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Raw account bytes, `None` when the account does not exist
    async fn get_account_data(&self, address: &str) -> Result<Option<Vec<u8>>>;

    async fn get_multiple_accounts(&self, addresses: &[String]) -> Result<Vec<Option<Vec<u8>>>>;

    async fn get_token_supply(&self, mint: &str) -> Result<TokenAmount>;

    async fn get_token_account_balance(&self, account: &str) -> Result<TokenAmount>;

    async fn get_latest_blockhash(&self) -> Result<Blockhash>;

    async fn get_block_height(&self) -> Result<u64>;

    /// Submit a base64 wire transaction, returning its signature
    async fn send_transaction(&self, encoded: &str) -> Result<String>;

    async fn get_signature_status(&self, signature: &str) -> Result<Option<SignatureStatus>>;
}

/// Fetch a fresh snapshot of a pool: the pool account plus both vault balances.
pub async fn load_live_pool_info(
    client: &dyn LedgerClient,
    pool_id: &str,
) -> Result<LivePoolInfo> {
    let data = client
        .get_account_data(pool_id)
        .await?
        .ok_or_else(|| BotError::AccountNotFound(pool_id.to_string()))?;
    let pool = layout::decode_pool_state(&data)?;

    let vaults = client
        .get_multiple_accounts(&[pool.base_vault.clone(), pool.quote_vault.clone()])
        .await?;

    let mut reserves = [0u64; 2];
    for (i, vault) in [&pool.base_vault, &pool.quote_vault].into_iter().enumerate() {
        let bytes = vaults
            .get(i)
            .cloned()
            .flatten()
            .ok_or_else(|| BotError::AccountNotFound(vault.clone()))?;
        reserves[i] = layout::decode_token_account(&bytes)?.amount;
    }

    Ok(LivePoolInfo {
        pool_id: pool_id.to_string(),
        status: pool.status,
        base_mint: pool.base_mint,
        quote_mint: pool.quote_mint,
        base_decimals: pool.base_decimals,
        quote_decimals: pool.quote_decimals,
        base_reserve: reserves[0],
        quote_reserve: reserves[1],
        lp_reserve: pool.lp_reserve,
        pool_open_time: pool.pool_open_time,
    })
}
