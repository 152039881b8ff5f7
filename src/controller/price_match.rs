use crate::caches::PoolInfoCache;
use crate::models::{to_ui, Direction, PoolIdentity};
use crate::swap::SwapBuilder;
use crate::Result;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

/// Absolute exit levels in quote units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub take_profit: Decimal,
    pub stop_loss: Option<Decimal>,
}

impl Thresholds {
    /// `entry * (1 + tp/100)` and, when set, `entry * (1 - sl/100)`
    pub fn from_entry(entry: Decimal, take_profit_percent: Decimal, stop_loss_percent: Option<Decimal>) -> Self {
        let hundred = Decimal::ONE_HUNDRED;
        Self {
            take_profit: entry * (Decimal::ONE + take_profit_percent / hundred),
            stop_loss: stop_loss_percent.map(|sl| entry * (Decimal::ONE - sl / hundred)),
        }
    }

    pub fn evaluate(&self, amount_out: Decimal) -> Option<PriceMatch> {
        if amount_out > self.take_profit {
            return Some(PriceMatch::TakeProfit(amount_out));
        }
        match self.stop_loss {
            Some(stop_loss) if amount_out < stop_loss => Some(PriceMatch::StopLoss(amount_out)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceMatch {
    TakeProfit(Decimal),
    StopLoss(Decimal),
    /// Check budget used up without crossing either level
    NoMatch,
    /// Polling turned off by a zero interval or duration
    Disabled,
}

/// Polls the pool until the held balance is worth more than take profit
/// or less than stop loss, or the check budget runs out
pub struct PriceWatcher {
    pool_info: Arc<PoolInfoCache>,
    builder: Arc<dyn SwapBuilder>,
    interval: Duration,
    duration: Duration,
    slippage_percent: Decimal,
}

impl PriceWatcher {
    pub fn new(
        pool_info: Arc<PoolInfoCache>,
        builder: Arc<dyn SwapBuilder>,
        interval: Duration,
        duration: Duration,
        slippage_percent: Decimal,
    ) -> Self {
        Self {
            pool_info,
            builder,
            interval,
            duration,
            slippage_percent,
        }
    }

    pub fn checks(&self) -> u64 {
        if self.interval.is_zero() || self.duration.is_zero() {
            return 0;
        }
        (self.duration.as_millis() / self.interval.as_millis()) as u64
    }

    pub async fn watch(&self, identity: &PoolIdentity, amount_in: u64, thresholds: &Thresholds) -> PriceMatch {
        if self.interval.is_zero() || self.duration.is_zero() {
            return PriceMatch::Disabled;
        }

        let checks = self.checks();
        for check in 1..=checks {
            match self.current_value(identity, amount_in).await {
                Ok(amount_out) => {
                    tracing::debug!(
                        mint = %identity.base_mint,
                        check,
                        checks,
                        amount_out = %amount_out,
                        take_profit = %thresholds.take_profit,
                        stop_loss = ?thresholds.stop_loss,
                        "price check"
                    );
                    if let Some(matched) = thresholds.evaluate(amount_out) {
                        return matched;
                    }
                }
                Err(e) => {
                    tracing::warn!(mint = %identity.base_mint, check, checks, "price check failed: {}", e);
                }
            }

            if check < checks {
                tokio::time::sleep(self.interval).await;
            }
        }

        PriceMatch::NoMatch
    }

    /// Quote value of selling `amount_in` now, net of slippage
    async fn current_value(&self, identity: &PoolIdentity, amount_in: u64) -> Result<Decimal> {
        let pool = self.pool_info.refresh(&identity.pool_id).await?;
        let quote = self
            .builder
            .quote(&pool, Direction::Sell, amount_in, self.slippage_percent)?;
        Ok(to_ui(quote.min_amount_out, pool.quote_decimals)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BotError;
    use crate::models::{LivePoolInfo, SignedTransaction};
    use crate::rpc::testing::{FakeLedger, PoolFixture};
    use crate::swap::{SwapQuote, SwapRequest};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    /// Quotes a scripted sequence of UI amounts (9 decimals); `None` fails the quote
    struct ScriptedQuotes {
        script: Mutex<VecDeque<Option<Decimal>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedQuotes {
        fn new(script: Vec<Option<&str>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().map(|v| v.map(dec)).collect()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock()
        }
    }

    #[async_trait]
    impl SwapBuilder for ScriptedQuotes {
        fn quote(&self, _: &LivePoolInfo, _: Direction, _: u64, _: Decimal) -> Result<SwapQuote> {
            *self.calls.lock() += 1;
            match self.script.lock().pop_front().flatten() {
                Some(ui) => {
                    let raw = crate::models::to_raw(ui, 9).unwrap();
                    Ok(SwapQuote {
                        amount_out: raw,
                        min_amount_out: raw,
                    })
                }
                None => Err(BotError::Swap("no quote".to_string())),
            }
        }

        async fn build_swap(&self, _: &SwapRequest) -> Result<SignedTransaction> {
            Err(BotError::Swap("quote only".to_string()))
        }

        async fn build_tip(&self, _: &str, _: u64) -> Result<SignedTransaction> {
            Err(BotError::Swap("quote only".to_string()))
        }
    }

    fn watcher(builder: Arc<ScriptedQuotes>, interval_ms: u64, duration_ms: u64) -> (PriceWatcher, PoolIdentity) {
        let ledger = Arc::new(FakeLedger::new());
        let pool = PoolFixture::new(70);
        pool.install(&ledger, 1_000_000, 1_000_000_000);

        let watcher = PriceWatcher::new(
            Arc::new(PoolInfoCache::new(ledger)),
            builder,
            Duration::from_millis(interval_ms),
            Duration::from_millis(duration_ms),
            Decimal::from(20),
        );
        (watcher, pool.identity())
    }

    #[test]
    fn test_thresholds_from_entry() {
        let t = Thresholds::from_entry(dec("1.0"), dec("10"), None);
        assert_eq!(t.take_profit, dec("1.10"));
        assert_eq!(t.stop_loss, None);

        let t = Thresholds::from_entry(dec("0.5"), dec("40"), Some(dec("20")));
        assert_eq!(t.take_profit, dec("0.7"));
        assert_eq!(t.stop_loss, Some(dec("0.4")));
    }

    #[test]
    fn test_threshold_edges_are_strict() {
        let t = Thresholds::from_entry(dec("1"), dec("10"), Some(dec("10")));
        assert_eq!(t.evaluate(dec("1.1")), None);
        assert_eq!(t.evaluate(dec("0.9")), None);
        assert_eq!(t.evaluate(dec("1.11")), Some(PriceMatch::TakeProfit(dec("1.11"))));
        assert_eq!(t.evaluate(dec("0.89")), Some(PriceMatch::StopLoss(dec("0.89"))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_profit_on_first_check() {
        let builder = Arc::new(ScriptedQuotes::new(vec![Some("1.15")]));
        let (watcher, identity) = watcher(builder.clone(), 100, 1_000);
        let thresholds = Thresholds::from_entry(dec("1.0"), dec("10"), None);

        let result = watcher.watch(&identity, 1_000, &thresholds).await;

        assert_eq!(result, PriceMatch::TakeProfit(dec("1.15")));
        assert_eq!(builder.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_match_after_budget() {
        let builder = Arc::new(ScriptedQuotes::new(vec![Some("1.05"), Some("1.05")]));
        let (watcher, identity) = watcher(builder.clone(), 100, 200);
        let thresholds = Thresholds::from_entry(dec("1.0"), dec("10"), None);

        let result = watcher.watch(&identity, 1_000, &thresholds).await;

        assert_eq!(result, PriceMatch::NoMatch);
        assert_eq!(builder.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_checks_count_toward_budget() {
        let builder = Arc::new(ScriptedQuotes::new(vec![None, Some("0.5")]));
        let (watcher, identity) = watcher(builder.clone(), 100, 300);
        let thresholds = Thresholds::from_entry(dec("1.0"), dec("10"), Some(dec("20")));

        let result = watcher.watch(&identity, 1_000, &thresholds).await;

        assert_eq!(result, PriceMatch::StopLoss(dec("0.5")));
        assert_eq!(builder.calls(), 2);
    }

    #[tokio::test]
    async fn test_zero_interval_disables_polling() {
        let builder = Arc::new(ScriptedQuotes::new(vec![]));
        let (watcher, identity) = watcher(builder.clone(), 0, 1_000);
        let thresholds = Thresholds::from_entry(dec("1.0"), dec("10"), None);

        assert_eq!(watcher.watch(&identity, 1_000, &thresholds).await, PriceMatch::Disabled);
        assert_eq!(builder.calls(), 0);
    }
}
