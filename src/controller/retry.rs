use crate::caches::PoolInfoCache;
use crate::execution::ExecutionStrategy;
use crate::models::{Direction, ExecutionOutcome, MarketDescriptor, PoolIdentity};
use crate::swap::{ComputeBudget, SwapBuilder, SwapRequest};
use crate::Result;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

/// Everything one buy or sell needs from the retry loop
#[derive(Debug, Clone)]
pub struct SwapPlan {
    pub direction: Direction,
    pub identity: PoolIdentity,
    pub market: MarketDescriptor,
    /// Raw units of the input token
    pub amount_in: u64,
    pub slippage_percent: Decimal,
    pub max_attempts: u32,
    /// Abort when a fresh quote reserve is below this (raw). Buys only.
    pub min_quote_reserve: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    Confirmed {
        outcome: ExecutionOutcome,
        attempts: u32,
    },
    /// Every attempt used; carries the last execution result if any attempt got that far
    Exhausted {
        last: Option<ExecutionOutcome>,
        attempts: u32,
    },
    /// Suspected rug: liquidity pulled between discovery and execution
    Aborted { reason: String, attempts: u32 },
}

impl RetryOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Confirmed { attempts, .. }
            | RetryOutcome::Exhausted { attempts, .. }
            | RetryOutcome::Aborted { attempts, .. } => *attempts,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, RetryOutcome::Confirmed { .. })
    }
}

enum Attempt {
    Executed(ExecutionOutcome),
    RugSuspected(String),
}

/// Bounded submit-and-confirm loop
pub struct SwapRetry {
    pool_info: Arc<PoolInfoCache>,
    builder: Arc<dyn SwapBuilder>,
    strategy: Arc<dyn ExecutionStrategy>,
    compute_budget: ComputeBudget,
    retry_delay: Duration,
}

impl SwapRetry {
    pub fn new(
        pool_info: Arc<PoolInfoCache>,
        builder: Arc<dyn SwapBuilder>,
        strategy: Arc<dyn ExecutionStrategy>,
        compute_budget: ComputeBudget,
        retry_delay: Duration,
    ) -> Self {
        Self {
            pool_info,
            builder,
            strategy,
            compute_budget,
            retry_delay,
        }
    }

    /// Never fails: transient errors are logged and retried, the rug
    /// condition aborts, and running out of attempts is reported.
    pub async fn run(&self, plan: &SwapPlan) -> RetryOutcome {
        let mut last = None;

        for attempt in 1..=plan.max_attempts {
            match self.attempt(plan).await {
                Ok(Attempt::Executed(outcome)) if outcome.confirmed => {
                    tracing::info!(
                        direction = %plan.direction,
                        attempt,
                        signature = outcome.signature.as_deref().unwrap_or(""),
                        "swap confirmed"
                    );
                    return RetryOutcome::Confirmed {
                        outcome,
                        attempts: attempt,
                    };
                }
                Ok(Attempt::Executed(outcome)) => {
                    tracing::warn!(
                        direction = %plan.direction,
                        attempt,
                        max_attempts = plan.max_attempts,
                        signature = outcome.signature.as_deref().unwrap_or(""),
                        "swap not confirmed: {}",
                        outcome.error.as_deref().unwrap_or("unknown")
                    );
                    last = Some(outcome);
                }
                Ok(Attempt::RugSuspected(reason)) => {
                    tracing::warn!(direction = %plan.direction, attempt, "🚨 aborting swap: {}", reason);
                    return RetryOutcome::Aborted {
                        reason,
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    tracing::warn!(
                        direction = %plan.direction,
                        attempt,
                        max_attempts = plan.max_attempts,
                        "swap attempt failed: {}",
                        e
                    );
                }
            }

            if attempt < plan.max_attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        RetryOutcome::Exhausted {
            last,
            attempts: plan.max_attempts,
        }
    }

    async fn attempt(&self, plan: &SwapPlan) -> Result<Attempt> {
        let pool = self.pool_info.refresh(&plan.identity.pool_id).await?;
        let quote = self
            .builder
            .quote(&pool, plan.direction, plan.amount_in, plan.slippage_percent)?;

        if plan.direction == Direction::Buy {
            if let Some(min) = plan.min_quote_reserve {
                if pool.quote_reserve < min {
                    return Ok(Attempt::RugSuspected(format!(
                        "quote reserve {} fell below minimum pool size {}",
                        pool.quote_reserve, min
                    )));
                }
            }
        }

        let request = SwapRequest {
            direction: plan.direction,
            identity: plan.identity.clone(),
            pool,
            market: plan.market.clone(),
            amount_in: plan.amount_in,
            min_amount_out: quote.min_amount_out,
            compute_budget: (!self.strategy.uses_tip()).then_some(self.compute_budget),
        };

        let tx = self.builder.build_swap(&request).await?;
        tracing::debug!(
            direction = %plan.direction,
            amount_in = plan.amount_in,
            min_amount_out = quote.min_amount_out,
            signature = %tx.signature,
            strategy = self.strategy.name(),
            "submitting swap"
        );

        Ok(Attempt::Executed(self.strategy.execute(&tx).await?))
    }
}
