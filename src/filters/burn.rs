use crate::error::INVALID_PARAMS;
use crate::models::{to_ui, FilterOutcome, PoolState};
use crate::rpc::LedgerClient;
use crate::Result;
use rust_decimal::Decimal;

/// Share of the LP supply that has been burned, in percent.
///
/// Max supply is `max(current_supply, lp_reserve - 1)`; whatever is
/// missing from it has been burned. Returns `None` when there is no
/// LP supply to reason about.
pub fn burned_percent(current_supply: Decimal, lp_reserve: Decimal) -> Option<Decimal> {
    let max_supply = current_supply.max(lp_reserve - Decimal::ONE);
    if max_supply <= Decimal::ZERO {
        return None;
    }
    let burned = max_supply - current_supply;
    Some(burned / max_supply * Decimal::ONE_HUNDRED)
}

pub async fn check(
    client: &dyn LedgerClient,
    pool: &PoolState,
    min_percent: Decimal,
) -> Result<FilterOutcome> {
    let supply = match client.get_token_supply(&pool.lp_mint).await {
        Ok(supply) => supply,
        Err(e) if e.rpc_code() == Some(INVALID_PARAMS) => {
            tracing::warn!(
                mint = %pool.base_mint,
                lp_mint = %pool.lp_mint,
                "lp supply query rejected as invalid params, passing burn check"
            );
            return Ok(FilterOutcome::pass());
        }
        Err(e) => return Err(e),
    };

    let current = supply.ui_amount()?;
    let reserve = to_ui(pool.lp_reserve, supply.decimals)?;

    let Some(percent) = burned_percent(current, reserve) else {
        return Ok(FilterOutcome::fail("no lp supply"));
    };

    if percent >= min_percent {
        Ok(FilterOutcome::pass())
    } else {
        Ok(FilterOutcome::fail(format!(
            "lp burned {}% < {}%",
            percent.round_dp(2),
            min_percent
        )))
    }
}
