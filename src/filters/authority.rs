use crate::error::BotError;
use crate::layout;
use crate::models::{FilterOutcome, MintInfo};
use crate::rpc::LedgerClient;
use crate::Result;

pub async fn fetch_mint(client: &dyn LedgerClient, mint: &str) -> Result<MintInfo> {
    let data = client
        .get_account_data(mint)
        .await?
        .ok_or_else(|| BotError::AccountNotFound(mint.to_string()))?;
    Ok(layout::decode_mint(&data)?)
}

/// Creator can no longer mint
pub fn check_renounced(mint: &MintInfo) -> FilterOutcome {
    match &mint.mint_authority {
        None => FilterOutcome::pass(),
        Some(authority) => FilterOutcome::fail(format!("mint authority {} not renounced", authority)),
    }
}

/// Holders cannot be frozen
pub fn check_freezable(mint: &MintInfo) -> FilterOutcome {
    match &mint.freeze_authority {
        None => FilterOutcome::pass(),
        Some(authority) => FilterOutcome::fail(format!("freeze authority {} present", authority)),
    }
}
