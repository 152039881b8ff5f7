use crate::error::AmountError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// AMM pool status value for "swap enabled"
pub const POOL_STATUS_SWAP: u64 = 6;

/// Swap direction relative to the quote token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Quote in, base out
    Buy,
    /// Base in, quote out
    Sell,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Buy => write!(f, "buy"),
            Direction::Sell => write!(f, "sell"),
        }
    }
}

/// Identity of a pool, recorded once per base mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolIdentity {
    pub pool_id: String,
    pub base_mint: String,
    pub market_id: String,
    pub base_decimals: u8,
    pub pool_open_time: u64,
}

impl From<&PoolIdentity> for TrackedMarket {
    fn from(identity: &PoolIdentity) -> Self {
        Self {
            market_id: identity.market_id.clone(),
            pool_id: identity.pool_id.clone(),
            pool_open_time: identity.pool_open_time,
            base_mint: identity.base_mint.clone(),
        }
    }
}

/// Decoded subset of an AMM v4 pool account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolState {
    pub status: u64,
    pub base_decimals: u8,
    pub quote_decimals: u8,
    pub pool_open_time: u64,
    pub base_vault: String,
    pub quote_vault: String,
    pub base_mint: String,
    pub quote_mint: String,
    pub lp_mint: String,
    pub market_id: String,
    pub market_program_id: String,
    pub lp_reserve: u64,
}

impl PoolState {
    pub fn identity(&self, pool_id: &str) -> PoolIdentity {
        PoolIdentity {
            pool_id: pool_id.to_string(),
            base_mint: self.base_mint.clone(),
            market_id: self.market_id.clone(),
            base_decimals: self.base_decimals,
            pool_open_time: self.pool_open_time,
        }
    }
}

/// Volatile snapshot of a pool's tradable state.
/// Never authoritative: re-fetch before building a swap.
#[derive(Debug, Clone, PartialEq)]
pub struct LivePoolInfo {
    pub pool_id: String,
    pub status: u64,
    pub base_mint: String,
    pub quote_mint: String,
    pub base_decimals: u8,
    pub quote_decimals: u8,
    pub base_reserve: u64,
    pub quote_reserve: u64,
    pub lp_reserve: u64,
    pub pool_open_time: u64,
}

/// Market accounts needed to route a swap through the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketDescriptor {
    pub event_queue: String,
    pub bids: String,
    pub asks: String,
}

/// SPL token account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAccount {
    pub mint: String,
    pub owner: String,
    pub amount: u64,
}

/// SPL mint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintInfo {
    pub mint_authority: Option<String>,
    pub supply: u64,
    pub decimals: u8,
    pub freeze_authority: Option<String>,
}

/// Token metadata fields the filters look at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub update_authority: String,
    pub mint: String,
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub is_mutable: bool,
}

/// Raw token amount with its decimals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAmount {
    pub amount: u64,
    pub decimals: u8,
}

impl TokenAmount {
    pub fn ui_amount(&self) -> Result<Decimal, AmountError> {
        to_ui(self.amount, self.decimals)
    }
}

/// Result of one filter invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOutcome {
    pub ok: bool,
    pub reason: Option<String>,
}

impl FilterOutcome {
    pub fn pass() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
        }
    }
}

/// Result of one submission attempt
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionOutcome {
    pub confirmed: bool,
    pub signature: Option<String>,
    pub error: Option<String>,
}

impl ExecutionOutcome {
    pub fn confirmed(signature: impl Into<String>) -> Self {
        Self {
            confirmed: true,
            signature: Some(signature.into()),
            error: None,
        }
    }

    pub fn rejected(signature: Option<String>, error: impl Into<String>) -> Self {
        Self {
            confirmed: false,
            signature,
            error: Some(error.into()),
        }
    }
}

/// Recent blockhash with its expiry height
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blockhash {
    pub blockhash: String,
    pub last_valid_block_height: u64,
}

/// A transaction ready for submission, produced by the swap builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// First signature, base58
    pub signature: String,
    /// Wire bytes, base64
    pub encoded: String,
    pub last_valid_block_height: u64,
}

/// Confirmation state of a submitted signature
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureStatus {
    pub confirmation_status: Option<String>,
    pub err: Option<serde_json::Value>,
}

impl SignatureStatus {
    pub fn is_landed(&self) -> bool {
        matches!(
            self.confirmation_status.as_deref(),
            Some("confirmed") | Some("finalized")
        )
    }
}

/// Entry of the persisted tracking list (warm start)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedMarket {
    pub market_id: String,
    pub pool_id: String,
    pub pool_open_time: u64,
    pub base_mint: String,
}

/// Notification delivered by the subscription feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    PoolOpened(PoolOpened),
    BalanceChanged(BalanceChanged),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOpened {
    pub pool_id: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceChanged {
    pub account_id: String,
    pub data: Vec<u8>,
}

/// Convert a UI amount into raw units, truncating extra precision.
/// Negative amounts clamp to zero.
pub fn to_raw(ui_amount: Decimal, decimals: u8) -> Result<u64, AmountError> {
    let factor = 10u64
        .checked_pow(decimals as u32)
        .ok_or(AmountError::Precision { decimals })?;
    if ui_amount.is_sign_negative() {
        return Ok(0);
    }

    ui_amount
        .checked_mul(Decimal::from(factor))
        .and_then(|scaled| scaled.trunc().to_u64())
        .ok_or_else(|| AmountError::Overflow {
            amount: ui_amount.to_string(),
            decimals,
        })
}

/// Convert raw units into a UI amount
pub fn to_ui(raw: u64, decimals: u8) -> Result<Decimal, AmountError> {
    Decimal::try_from_i128_with_scale(raw as i128, decimals as u32)
        .map_err(|_| AmountError::Precision { decimals })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_amount_conversions() {
        assert_eq!(to_raw(Decimal::from_str("0.01").unwrap(), 9), Ok(10_000_000));
        assert_eq!(to_raw(Decimal::from_str("1.5").unwrap(), 6), Ok(1_500_000));
        assert_eq!(to_ui(1_500_000, 6), Ok(Decimal::from_str("1.5").unwrap()));
    }

    #[test]
    fn test_to_raw_truncates_and_clamps_negative() {
        assert_eq!(to_raw(Decimal::from_str("0.0000001239").unwrap(), 9), Ok(123));
        assert_eq!(to_raw(Decimal::from_str("-1").unwrap(), 9), Ok(0));
    }

    #[test]
    fn test_conversions_reject_out_of_range_precision() {
        assert_eq!(to_ui(1, 30), Err(AmountError::Precision { decimals: 30 }));
        assert_eq!(to_ui(u64::MAX, 28).map(|d| d.is_zero()), Ok(false));
        assert_eq!(to_raw(Decimal::ONE, 20), Err(AmountError::Precision { decimals: 20 }));
        assert_eq!(to_raw(Decimal::ONE, 19), Ok(10_000_000_000_000_000_000));
    }

    #[test]
    fn test_to_raw_overflow_is_an_error() {
        let huge = Decimal::from_str("100000000000").unwrap();
        assert!(matches!(to_raw(huge, 9), Err(AmountError::Overflow { decimals: 9, .. })));

        let amount = TokenAmount { amount: 5, decimals: 255 };
        assert!(amount.ui_amount().is_err());
    }

    #[test]
    fn test_signature_status_landed() {
        let landed = SignatureStatus {
            confirmation_status: Some("confirmed".to_string()),
            err: None,
        };
        let processed = SignatureStatus {
            confirmation_status: Some("processed".to_string()),
            err: None,
        };

        assert!(landed.is_landed());
        assert!(!processed.is_landed());
    }

    #[test]
    fn test_tracked_market_json_shape() {
        let entry = TrackedMarket {
            market_id: "m".to_string(),
            pool_id: "p".to_string(),
            pool_open_time: 42,
            base_mint: "b".to_string(),
        };

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"poolOpenTime\":42"));
        assert!(json.contains("\"baseMint\":\"b\""));
    }
}
