//! Pre-buy safety checks
//!
//! Filters are an ordered list of enum variants built once from the
//! validated configuration. All of them run concurrently against a pool
//! and the pipeline passes only if every one passes. Any error counts as
//! a failure.

pub mod authority;
pub mod burn;
pub mod metadata;
pub mod pool_size;

use crate::config::FilterSettings;
use crate::error::AmountError;
use crate::models::{to_raw, FilterOutcome, PoolState};
use crate::rpc::LedgerClient;
use crate::Result;
use futures::future::join_all;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterKind {
    /// Mint authority must be revoked
    Renounced,
    /// Freeze authority must be absent
    Freezable,
    /// At least `min_percent` of LP must be burned
    Burned { min_percent: Decimal },
    /// Metadata must be immutable
    Mutable,
    /// Metadata URI must link somewhere
    Socials,
    /// Quote vault balance bounds in raw units, zero means unbounded
    PoolSize { min: u64, max: u64 },
}

impl FilterKind {
    pub fn name(&self) -> &'static str {
        match self {
            FilterKind::Renounced => "renounced",
            FilterKind::Freezable => "freezable",
            FilterKind::Burned { .. } => "burned",
            FilterKind::Mutable => "mutable",
            FilterKind::Socials => "socials",
            FilterKind::PoolSize { .. } => "pool_size",
        }
    }
}

/// Build the filter list in its fixed order
pub fn build_filters(
    settings: &FilterSettings,
    quote_decimals: u8,
) -> std::result::Result<Vec<FilterKind>, AmountError> {
    let mut filters = Vec::new();

    if settings.check_renounced {
        filters.push(FilterKind::Renounced);
    }
    if settings.check_freezable {
        filters.push(FilterKind::Freezable);
    }
    if settings.check_burned {
        filters.push(FilterKind::Burned {
            min_percent: settings.min_lp_burned_percent,
        });
    }
    if settings.check_mutable {
        filters.push(FilterKind::Mutable);
    }
    if settings.check_socials {
        filters.push(FilterKind::Socials);
    }

    let min = to_raw(settings.min_pool_size, quote_decimals)?;
    let max = to_raw(settings.max_pool_size, quote_decimals)?;
    if min != 0 || max != 0 {
        filters.push(FilterKind::PoolSize { min, max });
    }

    Ok(filters)
}

/// AND of all results; an empty list passes, any `Err` fails
pub fn combine(results: &[Result<FilterOutcome>]) -> bool {
    results
        .iter()
        .all(|result| matches!(result, Ok(outcome) if outcome.ok))
}

/// Re-check cadence for the consecutive-match mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecheckPolicy {
    pub interval: Duration,
    pub duration: Duration,
    pub consecutive_matches: u32,
}

impl RecheckPolicy {
    pub fn from_settings(settings: &FilterSettings) -> Option<Self> {
        if settings.filter_check_interval_ms == 0 || settings.filter_check_duration_ms == 0 {
            return None;
        }
        Some(Self {
            interval: Duration::from_millis(settings.filter_check_interval_ms),
            duration: Duration::from_millis(settings.filter_check_duration_ms),
            consecutive_matches: settings.consecutive_filter_matches.max(1),
        })
    }

    fn checks(&self) -> u64 {
        let interval = self.interval.as_millis().max(1);
        (self.duration.as_millis() / interval) as u64
    }
}

pub struct PoolFilters {
    client: Arc<dyn LedgerClient>,
    filters: Vec<FilterKind>,
    recheck: Option<RecheckPolicy>,
}

impl PoolFilters {
    pub fn new(client: Arc<dyn LedgerClient>, filters: Vec<FilterKind>) -> Self {
        Self {
            client,
            filters,
            recheck: None,
        }
    }

    pub fn with_recheck(mut self, recheck: Option<RecheckPolicy>) -> Self {
        self.recheck = recheck;
        self
    }

    pub fn filters(&self) -> &[FilterKind] {
        &self.filters
    }

    /// Run every filter once, concurrently
    pub async fn execute(&self, pool: &PoolState) -> bool {
        if self.filters.is_empty() {
            return true;
        }

        let results = join_all(self.filters.iter().map(|f| self.run(f, pool))).await;

        for (filter, result) in self.filters.iter().zip(&results) {
            match result {
                Ok(outcome) if outcome.ok => {}
                Ok(outcome) => tracing::info!(
                    mint = %pool.base_mint,
                    filter = filter.name(),
                    "filter rejected: {}",
                    outcome.reason.as_deref().unwrap_or("no reason")
                ),
                Err(e) => tracing::warn!(
                    mint = %pool.base_mint,
                    filter = filter.name(),
                    "filter check failed: {}",
                    e
                ),
            }
        }

        combine(&results)
    }

    /// Single evaluation, or when a recheck policy is set, re-run every
    /// interval until enough consecutive passes or the budget runs out.
    pub async fn evaluate(&self, pool: &PoolState) -> bool {
        let Some(policy) = self.recheck else {
            return self.execute(pool).await;
        };

        let checks = policy.checks();
        let mut streak = 0;

        for check in 1..=checks {
            if self.execute(pool).await {
                streak += 1;
                tracing::debug!(
                    mint = %pool.base_mint,
                    streak,
                    needed = policy.consecutive_matches,
                    "filter match"
                );
                if streak >= policy.consecutive_matches {
                    return true;
                }
            } else {
                streak = 0;
            }

            if check < checks {
                tokio::time::sleep(policy.interval).await;
            }
        }

        false
    }

    async fn run(&self, filter: &FilterKind, pool: &PoolState) -> Result<FilterOutcome> {
        let client = self.client.as_ref();
        match filter {
            FilterKind::Renounced => {
                let mint = authority::fetch_mint(client, &pool.base_mint).await?;
                Ok(authority::check_renounced(&mint))
            }
            FilterKind::Freezable => {
                let mint = authority::fetch_mint(client, &pool.base_mint).await?;
                Ok(authority::check_freezable(&mint))
            }
            FilterKind::Burned { min_percent } => burn::check(client, pool, *min_percent).await,
            FilterKind::Mutable => {
                let meta = metadata::fetch_metadata(client, &pool.base_mint).await?;
                Ok(metadata::check_mutable(&meta))
            }
            FilterKind::Socials => {
                let meta = metadata::fetch_metadata(client, &pool.base_mint).await?;
                Ok(metadata::check_socials(&meta))
            }
            FilterKind::PoolSize { min, max } => pool_size::check(client, pool, *min, *max).await,
        }
    }
}
