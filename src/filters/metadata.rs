use crate::error::BotError;
use crate::layout;
use crate::models::{FilterOutcome, TokenMetadata};
use crate::pubkey;
use crate::rpc::LedgerClient;
use crate::Result;
use once_cell::sync::Lazy;
use regex::Regex;

static LINK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)https?://(www\.)?[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b([-a-zA-Z0-9()@:%_+.~#?&/=]*)",
    )
    .expect("Invalid link pattern regex")
});

/// Fetch and decode the metadata account derived from the mint
pub async fn fetch_metadata(client: &dyn LedgerClient, mint: &str) -> Result<TokenMetadata> {
    let address = pubkey::metadata_address(mint)?;
    let data = client
        .get_account_data(&address)
        .await?
        .ok_or_else(|| BotError::AccountNotFound(address.clone()))?;
    Ok(layout::decode_metadata(&data)?)
}

pub fn check_mutable(metadata: &TokenMetadata) -> FilterOutcome {
    if metadata.is_mutable {
        FilterOutcome::fail("metadata is mutable")
    } else {
        FilterOutcome::pass()
    }
}

pub fn has_socials(uri: &str) -> bool {
    !uri.is_empty() && LINK_PATTERN.is_match(uri)
}

pub fn check_socials(metadata: &TokenMetadata) -> FilterOutcome {
    if has_socials(&metadata.uri) {
        FilterOutcome::pass()
    } else {
        FilterOutcome::fail("metadata has no links")
    }
}
