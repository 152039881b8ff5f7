//! Swap quoting and transaction construction
//!
//! The controller never builds instructions itself; it asks a
//! `SwapBuilder` for a quote and a ready-to-submit transaction.

pub mod paper;

pub use paper::PaperSwapBuilder;

use crate::models::{Direction, LivePoolInfo, MarketDescriptor, PoolIdentity, SignedTransaction};
use crate::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Output of a quote in raw units of the output token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapQuote {
    pub amount_out: u64,
    /// `amount_out` less the slippage tolerance
    pub min_amount_out: u64,
}

/// Priority fee settings, attached only when no relay tip is paid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeBudget {
    pub unit_limit: u32,
    pub unit_price_micro_lamports: u64,
}

#[derive(Debug, Clone)]
pub struct SwapRequest {
    pub direction: Direction,
    pub identity: PoolIdentity,
    pub pool: LivePoolInfo,
    pub market: MarketDescriptor,
    pub amount_in: u64,
    pub min_amount_out: u64,
    pub compute_budget: Option<ComputeBudget>,
}

#[async_trait]
pub trait SwapBuilder: Send + Sync {
    /// Expected output for `amount_in` against the pool's current reserves
    fn quote(
        &self,
        pool: &LivePoolInfo,
        direction: Direction,
        amount_in: u64,
        slippage_percent: Decimal,
    ) -> Result<SwapQuote>;

    async fn build_swap(&self, request: &SwapRequest) -> Result<SignedTransaction>;

    /// Transfer of `lamports` to a relay tip account
    async fn build_tip(&self, tip_account: &str, lamports: u64) -> Result<SignedTransaction>;
}
