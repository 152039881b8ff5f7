use crate::models::{FilterOutcome, PoolState};
use crate::rpc::LedgerClient;
use crate::Result;

/// Bounds are raw quote units; zero disables that side
pub fn within_bounds(size: u64, min: u64, max: u64) -> FilterOutcome {
    if max != 0 && size > max {
        return FilterOutcome::fail(format!("pool size {} > max {}", size, max));
    }
    if min != 0 && size < min {
        return FilterOutcome::fail(format!("pool size {} < min {}", size, min));
    }
    FilterOutcome::pass()
}

pub async fn check(
    client: &dyn LedgerClient,
    pool: &PoolState,
    min: u64,
    max: u64,
) -> Result<FilterOutcome> {
    let balance = client.get_token_account_balance(&pool.quote_vault).await?;
    Ok(within_bounds(balance.amount, min, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        assert!(within_bounds(50, 10, 100).ok);
        assert!(within_bounds(10, 10, 100).ok);
        assert!(within_bounds(100, 10, 100).ok);
        assert!(!within_bounds(101, 10, 100).ok);
        assert!(!within_bounds(9, 10, 100).ok);
    }

    #[test]
    fn test_zero_bound_is_open() {
        assert!(within_bounds(u64::MAX, 10, 0).ok);
        assert!(within_bounds(0, 0, 100).ok);
    }
}
