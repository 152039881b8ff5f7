use super::{SwapBuilder, SwapQuote, SwapRequest};
use crate::error::BotError;
use crate::models::{Direction, LivePoolInfo, SignedTransaction};
use crate::rpc::LedgerClient;
use crate::Result;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

/// Pool trade fee, 25 bps
const FEE_NUMERATOR: u128 = 25;
const FEE_DENOMINATOR: u128 = 10_000;

/// Constant-product output with the pool fee taken from the input
pub fn constant_product_out(amount_in: u64, reserve_in: u64, reserve_out: u64) -> u64 {
    if amount_in == 0 || reserve_in == 0 || reserve_out == 0 {
        return 0;
    }
    let in_after_fee = amount_in as u128 * (FEE_DENOMINATOR - FEE_NUMERATOR) / FEE_DENOMINATOR;
    let out = reserve_out as u128 * in_after_fee / (reserve_in as u128 + in_after_fee);
    out as u64
}

/// Lower `amount` by `slippage_percent`
pub fn apply_slippage(amount: u64, slippage_percent: Decimal) -> Result<u64> {
    if slippage_percent < Decimal::ZERO || slippage_percent > Decimal::ONE_HUNDRED {
        return Err(BotError::Swap(format!("slippage {}% out of range", slippage_percent)));
    }
    let kept = Decimal::from(amount) * (Decimal::ONE_HUNDRED - slippage_percent) / Decimal::ONE_HUNDRED;
    kept.trunc()
        .to_u64()
        .ok_or_else(|| BotError::Swap(format!("min amount out overflow for {}", amount)))
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum PaperInstruction<'a> {
    Swap {
        pool_id: &'a str,
        direction: Direction,
        amount_in: u64,
        min_amount_out: u64,
        compute_unit_price: Option<u64>,
    },
    Tip {
        tip_account: &'a str,
        lamports: u64,
    },
}

#[derive(Serialize)]
struct PaperTransaction<'a> {
    blockhash: &'a str,
    instruction: PaperInstruction<'a>,
}

/// Simulation builder: real quotes from live reserves, unsigned
/// placeholder transactions. Never touches a wallet.
pub struct PaperSwapBuilder {
    client: Arc<dyn LedgerClient>,
}

impl PaperSwapBuilder {
    pub fn new(client: Arc<dyn LedgerClient>) -> Self {
        Self { client }
    }

    async fn wrap(&self, instruction: PaperInstruction<'_>) -> Result<SignedTransaction> {
        let blockhash = self.client.get_latest_blockhash().await?;
        let tx = PaperTransaction {
            blockhash: &blockhash.blockhash,
            instruction,
        };

        let mut signature = [0u8; 64];
        rand::thread_rng().fill_bytes(&mut signature);

        Ok(SignedTransaction {
            signature: bs58::encode(signature).into_string(),
            encoded: BASE64.encode(serde_json::to_vec(&tx)?),
            last_valid_block_height: blockhash.last_valid_block_height,
        })
    }
}

#[async_trait]
impl SwapBuilder for PaperSwapBuilder {
    fn quote(
        &self,
        pool: &LivePoolInfo,
        direction: Direction,
        amount_in: u64,
        slippage_percent: Decimal,
    ) -> Result<SwapQuote> {
        let amount_out = match direction {
            Direction::Buy => constant_product_out(amount_in, pool.quote_reserve, pool.base_reserve),
            Direction::Sell => constant_product_out(amount_in, pool.base_reserve, pool.quote_reserve),
        };

        Ok(SwapQuote {
            amount_out,
            min_amount_out: apply_slippage(amount_out, slippage_percent)?,
        })
    }

    async fn build_swap(&self, request: &SwapRequest) -> Result<SignedTransaction> {
        self.wrap(PaperInstruction::Swap {
            pool_id: &request.identity.pool_id,
            direction: request.direction,
            amount_in: request.amount_in,
            min_amount_out: request.min_amount_out,
            compute_unit_price: request.compute_budget.map(|b| b.unit_price_micro_lamports),
        })
        .await
    }

    async fn build_tip(&self, tip_account: &str, lamports: u64) -> Result<SignedTransaction> {
        self.wrap(PaperInstruction::Tip {
            tip_account,
            lamports,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::testing::FakeLedger;
    use std::str::FromStr;

    fn pool(base_reserve: u64, quote_reserve: u64) -> LivePoolInfo {
        LivePoolInfo {
            pool_id: "pool".to_string(),
            status: 6,
            base_mint: "base".to_string(),
            quote_mint: "quote".to_string(),
            base_decimals: 6,
            quote_decimals: 9,
            base_reserve,
            quote_reserve,
            lp_reserve: 0,
            pool_open_time: 0,
        }
    }

    #[test]
    fn test_constant_product_with_fee() {
        // 1000 in, fee leaves 997 (truncated from 997.5)
        let out = constant_product_out(1_000, 1_000_000, 1_000_000);
        assert_eq!(out, 1_000_000 * 997 / (1_000_000 + 997));
    }

    #[test]
    fn test_empty_pool_quotes_zero() {
        assert_eq!(constant_product_out(1_000, 0, 1_000), 0);
        assert_eq!(constant_product_out(0, 1_000, 1_000), 0);
    }

    #[test]
    fn test_apply_slippage() {
        assert_eq!(apply_slippage(1_000, Decimal::from(20)).unwrap(), 800);
        assert_eq!(apply_slippage(999, Decimal::from_str("0.5").unwrap()).unwrap(), 994);
        assert!(apply_slippage(1_000, Decimal::from(101)).is_err());
    }

    #[test]
    fn test_quote_direction_uses_matching_reserves() {
        let builder = PaperSwapBuilder::new(Arc::new(FakeLedger::new()));
        let pool = pool(2_000_000, 1_000_000);

        let buy = builder.quote(&pool, Direction::Buy, 10_000, Decimal::ZERO).unwrap();
        let sell = builder.quote(&pool, Direction::Sell, 10_000, Decimal::ZERO).unwrap();

        assert!(buy.amount_out > sell.amount_out);
        assert_eq!(buy.amount_out, buy.min_amount_out);
    }

    #[tokio::test]
    async fn test_tip_transaction_carries_blockhash_expiry() {
        let ledger = Arc::new(FakeLedger::new());
        ledger.set_block_height(500);
        let builder = PaperSwapBuilder::new(ledger);

        let tx = builder.build_tip("tip", 1_000).await.unwrap();

        assert_eq!(tx.last_valid_block_height, 650);
        let payload = BASE64.decode(&tx.encoded).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(json["instruction"]["kind"], "tip");
        assert_eq!(json["instruction"]["lamports"], 1_000);
    }
}
