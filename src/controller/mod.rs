//! Position lifecycle: qualify new pools, buy behind the position gate,
//! then sell on balance changes once the price poll settles.

pub mod gate;
pub mod price_match;
pub mod retry;

pub use gate::{BuyPermit, PositionGate, SellPermit};
pub use price_match::{PriceMatch, PriceWatcher, Thresholds};
pub use retry::{RetryOutcome, SwapPlan, SwapRetry};

use crate::caches::{MarketCache, PoolCache, PoolInfoCache};
use crate::config::BotConfig;
use crate::error::{BotError, ConfigError};
use crate::execution::ExecutionStrategy;
use crate::filters::{build_filters, FilterKind, PoolFilters, RecheckPolicy};
use crate::layout;
use crate::models::{
    to_raw, to_ui, BalanceChanged, Direction, PoolOpened, PoolState, TokenAccount, TrackedMarket,
};
use crate::persistence::{self, KeyValueStore};
use crate::rpc::LedgerClient;
use crate::swap::{ComputeBudget, SwapBuilder};
use crate::Result;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// `getMultipleAccounts` accepts at most this many keys
const MULTIPLE_ACCOUNTS_CHUNK: usize = 100;

/// Controller settings with amounts already in raw units
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub quote_mint: String,
    pub quote_decimals: u8,
    pub quote_token_account: String,
    pub quote_amount: u64,
    pub auto_buy_delay: Duration,
    pub max_buy_retries: u32,
    pub buy_slippage: Decimal,
    pub single_position: bool,
    pub auto_sell: bool,
    pub auto_sell_delay: Duration,
    pub max_sell_retries: u32,
    pub sell_slippage: Decimal,
    pub take_profit_percent: Decimal,
    pub stop_loss_percent: Option<Decimal>,
    pub price_check_interval: Duration,
    pub price_check_duration: Duration,
    pub sell_on_unmatched_price: bool,
    /// Buy-side rug threshold on the quote reserve, zero disables it
    pub min_pool_size: u64,
    pub filters: Vec<FilterKind>,
    pub recheck: Option<RecheckPolicy>,
    pub retry_delay: Duration,
    pub compute_budget: ComputeBudget,
    pub use_tracking_list: bool,
    /// Unix seconds; pools opened earlier are ignored
    pub started_at: u64,
}

impl BotSettings {
    pub fn from_config(config: &BotConfig, started_at: u64) -> std::result::Result<Self, ConfigError> {
        let decimals = config.wallet.quote_decimals;

        Ok(Self {
            quote_mint: config.wallet.quote_mint.clone(),
            quote_decimals: decimals,
            quote_token_account: config.wallet.quote_token_account()?,
            quote_amount: to_raw(config.buy.quote_amount, decimals)?,
            auto_buy_delay: Duration::from_millis(config.buy.auto_buy_delay_ms),
            max_buy_retries: config.buy.max_retries,
            buy_slippage: config.buy.slippage_percent,
            single_position: config.buy.single_position,
            auto_sell: config.sell.auto_sell,
            auto_sell_delay: Duration::from_millis(config.sell.auto_sell_delay_ms),
            max_sell_retries: config.sell.max_retries,
            sell_slippage: config.sell.slippage_percent,
            take_profit_percent: config.sell.take_profit_percent,
            stop_loss_percent: config.sell.stop_loss_percent,
            price_check_interval: Duration::from_millis(config.sell.price_check_interval_ms),
            price_check_duration: Duration::from_millis(config.sell.price_check_duration_ms),
            sell_on_unmatched_price: config.sell.sell_on_unmatched_price,
            min_pool_size: to_raw(config.filters.min_pool_size, decimals)?,
            filters: build_filters(&config.filters, decimals)?,
            recheck: RecheckPolicy::from_settings(&config.filters),
            retry_delay: config.execution.retry_delay(),
            compute_budget: ComputeBudget {
                unit_limit: config.execution.compute_unit_limit,
                unit_price_micro_lamports: config.execution.compute_unit_price,
            },
            use_tracking_list: config.persistence.use_tracking_list,
            started_at,
        })
    }
}

/// External collaborators the controller is wired with
pub struct BotDeps {
    pub client: Arc<dyn LedgerClient>,
    pub builder: Arc<dyn SwapBuilder>,
    pub strategy: Arc<dyn ExecutionStrategy>,
    pub store: Arc<dyn KeyValueStore>,
}

pub struct Bot {
    settings: BotSettings,
    client: Arc<dyn LedgerClient>,
    store: Arc<dyn KeyValueStore>,
    markets: MarketCache,
    pools: PoolCache,
    pool_info: Arc<PoolInfoCache>,
    filters: PoolFilters,
    gate: PositionGate,
    retry: SwapRetry,
    watcher: PriceWatcher,
    shutdown: CancellationToken,
}

/// Tombstones a pool's live info when the sell cycle ends, however it ends
struct EvictOnDrop<'a> {
    cache: &'a PoolInfoCache,
    pool_id: String,
}

impl Drop for EvictOnDrop<'_> {
    fn drop(&mut self) {
        self.cache.delete(&self.pool_id);
    }
}

impl Bot {
    pub fn new(settings: BotSettings, deps: BotDeps) -> Self {
        let pool_info = Arc::new(PoolInfoCache::new(deps.client.clone()));
        let filters = PoolFilters::new(deps.client.clone(), settings.filters.clone())
            .with_recheck(settings.recheck);
        let retry = SwapRetry::new(
            pool_info.clone(),
            deps.builder.clone(),
            deps.strategy,
            settings.compute_budget,
            settings.retry_delay,
        );
        let watcher = PriceWatcher::new(
            pool_info.clone(),
            deps.builder,
            settings.price_check_interval,
            settings.price_check_duration,
            settings.sell_slippage,
        );

        Self {
            gate: PositionGate::new(settings.single_position),
            markets: MarketCache::new(deps.client.clone()),
            pools: PoolCache::new(),
            client: deps.client,
            store: deps.store,
            pool_info,
            filters,
            retry,
            watcher,
            shutdown: CancellationToken::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &BotSettings {
        &self.settings
    }

    pub fn gate(&self) -> &PositionGate {
        &self.gate
    }

    pub fn pools(&self) -> &PoolCache {
        &self.pools
    }

    pub fn pool_info(&self) -> &PoolInfoCache {
        &self.pool_info
    }

    /// Token observed by the listener and cancelled at shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Check the quote token account exists and holds the quote mint
    pub async fn validate(&self) -> Result<TokenAccount> {
        let account_id = &self.settings.quote_token_account;
        let data = self.client.get_account_data(account_id).await?.ok_or_else(|| {
            BotError::Config(ConfigError::Invalid(format!(
                "quote token account {} not found, fund the wallet with {} first",
                account_id, self.settings.quote_mint
            )))
        })?;

        let account = layout::decode_token_account(&data)?;
        if account.mint != self.settings.quote_mint {
            return Err(BotError::Config(ConfigError::Invalid(format!(
                "quote token account {} holds mint {}, expected {}",
                account_id, account.mint, self.settings.quote_mint
            ))));
        }

        let balance = to_ui(account.amount, self.settings.quote_decimals)?;
        tracing::info!(
            account = %account_id,
            balance = %balance,
            "💰 Quote token account ready"
        );

        Ok(account)
    }

    /// Pools recorded so far, in tracking-list form
    pub fn tracked_markets(&self) -> Vec<TrackedMarket> {
        self.pools.snapshot().iter().map(TrackedMarket::from).collect()
    }

    /// Seed the market and pool caches from the persisted tracking list.
    /// Returns how many pools were restored.
    pub async fn warm_start(&self) -> Result<usize> {
        let tracked = persistence::load_tracking_list(self.store.as_ref()).await?;
        if tracked.is_empty() {
            return Ok(0);
        }

        let pool_ids: Vec<String> = tracked.iter().map(|t| t.pool_id.clone()).collect();
        let mut identities = Vec::with_capacity(pool_ids.len());

        for chunk in pool_ids.chunks(MULTIPLE_ACCOUNTS_CHUNK) {
            let accounts = self.client.get_multiple_accounts(chunk).await?;
            for (pool_id, data) in chunk.iter().zip(accounts) {
                let Some(data) = data else {
                    tracing::warn!(pool = %pool_id, "tracked pool no longer exists");
                    continue;
                };
                match layout::decode_pool_state(&data) {
                    Ok(state) => identities.push(state.identity(pool_id)),
                    Err(e) => tracing::warn!(pool = %pool_id, "tracked pool could not be decoded: {}", e),
                }
            }
        }

        let market_ids: Vec<String> = identities.iter().map(|i| i.market_id.clone()).collect();
        let markets = self.markets.load(&market_ids).await?;
        let pools = self.pools.load(identities);

        tracing::info!(pools, markets, "♻️  Warm start restored tracking list");

        Ok(pools)
    }

    pub async fn persist_tracking_list(&self) -> Result<usize> {
        persistence::save_tracking_list(self.store.as_ref(), &self.tracked_markets()).await
    }

    /// Stop the listener and record what was in flight. Best effort.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        if self.settings.use_tracking_list {
            match self.persist_tracking_list().await {
                Ok(count) => tracing::info!("Saved {} tracked markets", count),
                Err(e) => tracing::warn!("Failed to save tracking list: {}", e),
            }
        }

        let active_sells = self.gate.active_sells();
        if let Err(e) = persistence::save_shutdown_snapshot(self.store.as_ref(), active_sells).await {
            tracing::warn!("Failed to save shutdown snapshot: {}", e);
        }

        tracing::info!(active_sells, "👋 Controller stopped");
    }

    /// Qualify a newly opened pool and spawn a buy for it
    pub fn on_pool_opened(self: &Arc<Self>, event: PoolOpened) -> Option<JoinHandle<()>> {
        let pool = match layout::decode_pool_state(&event.data) {
            Ok(pool) => pool,
            Err(e) => {
                tracing::warn!(pool = %event.pool_id, "undecodable pool account: {}", e);
                return None;
            }
        };

        if pool.quote_mint != self.settings.quote_mint {
            return None;
        }
        if pool.pool_open_time < self.settings.started_at {
            tracing::trace!(pool = %event.pool_id, "pool opened before start, ignoring");
            return None;
        }
        if !self.pools.save(pool.identity(&event.pool_id)) {
            return None;
        }

        tracing::info!(pool = %event.pool_id, mint = %pool.base_mint, "🆕 New pool");

        let span = tracing::info_span!("buy", cycle = %Uuid::new_v4(), mint = %pool.base_mint);
        let bot = Arc::clone(self);
        Some(tokio::spawn(
            async move { bot.buy(&event.pool_id, pool).await }.instrument(span),
        ))
    }

    /// Spawn a sell for a wallet token account that changed
    pub fn on_balance_changed(self: &Arc<Self>, event: BalanceChanged) -> Option<JoinHandle<()>> {
        if !self.settings.auto_sell {
            return None;
        }

        let account = match layout::decode_token_account(&event.data) {
            Ok(account) => account,
            Err(e) => {
                tracing::warn!(account = %event.account_id, "undecodable token account: {}", e);
                return None;
            }
        };

        if account.mint == self.settings.quote_mint {
            return None;
        }

        let span = tracing::info_span!("sell", cycle = %Uuid::new_v4(), mint = %account.mint);
        let bot = Arc::clone(self);
        Some(tokio::spawn(
            async move { bot.sell(&event.account_id, account).await }.instrument(span),
        ))
    }

    /// One buy cycle. Never fails; every outcome is logged.
    pub async fn buy(&self, pool_id: &str, pool: PoolState) {
        if !self.settings.auto_buy_delay.is_zero() {
            tracing::debug!(delay_ms = self.settings.auto_buy_delay.as_millis() as u64, "waiting before buy");
            tokio::time::sleep(self.settings.auto_buy_delay).await;
        }

        let Some(_permit) = self.gate.try_enter_buy() else {
            tracing::info!(mint = %pool.base_mint, "⏭️  Skipping buy, position already open");
            return;
        };

        if !self.filters.evaluate(&pool).await {
            tracing::info!(mint = %pool.base_mint, "Skipping buy, filters did not match");
            return;
        }

        let market = match self.markets.get_or_fetch(&pool.market_id).await {
            Ok(market) => market,
            Err(e) => {
                tracing::warn!(mint = %pool.base_mint, market = %pool.market_id, "market unavailable: {}", e);
                return;
            }
        };

        let plan = SwapPlan {
            direction: Direction::Buy,
            identity: pool.identity(pool_id),
            market,
            amount_in: self.settings.quote_amount,
            slippage_percent: self.settings.buy_slippage,
            max_attempts: self.settings.max_buy_retries,
            min_quote_reserve: (self.settings.min_pool_size > 0).then_some(self.settings.min_pool_size),
        };

        match self.retry.run(&plan).await {
            RetryOutcome::Confirmed { outcome, attempts } => tracing::info!(
                mint = %pool.base_mint,
                attempts,
                signature = outcome.signature.as_deref().unwrap_or(""),
                "✅ Bought"
            ),
            RetryOutcome::Exhausted { attempts, .. } => {
                self.pool_info.delete(pool_id);
                tracing::warn!(mint = %pool.base_mint, attempts, "❌ Buy failed, retries exhausted");
            }
            RetryOutcome::Aborted { reason, attempts } => {
                self.pool_info.delete(pool_id);
                tracing::warn!(mint = %pool.base_mint, attempts, "❌ Buy aborted: {}", reason);
            }
        }
    }

    /// One sell cycle for the full balance of `account`. Never fails.
    pub async fn sell(&self, account_id: &str, account: TokenAccount) {
        if account.amount == 0 {
            tracing::debug!(account = %account_id, "empty balance, nothing to sell");
            return;
        }

        let _permit = self.gate.enter_sell();

        let Some(identity) = self.pools.get(&account.mint) else {
            tracing::warn!(mint = %account.mint, "no pool recorded for mint, cannot sell");
            return;
        };
        let _evict = EvictOnDrop {
            cache: &self.pool_info,
            pool_id: identity.pool_id.clone(),
        };

        if !self.settings.auto_sell_delay.is_zero() {
            tracing::debug!(delay_ms = self.settings.auto_sell_delay.as_millis() as u64, "waiting before sell");
            tokio::time::sleep(self.settings.auto_sell_delay).await;
        }

        let market = match self.markets.get_or_fetch(&identity.market_id).await {
            Ok(market) => market,
            Err(e) => {
                tracing::warn!(mint = %account.mint, market = %identity.market_id, "market unavailable: {}", e);
                return;
            }
        };

        let price_match = match to_ui(self.settings.quote_amount, self.settings.quote_decimals) {
            Ok(entry) => {
                let thresholds = Thresholds::from_entry(
                    entry,
                    self.settings.take_profit_percent,
                    self.settings.stop_loss_percent,
                );
                self.watcher.watch(&identity, account.amount, &thresholds).await
            }
            Err(e) => {
                tracing::warn!(mint = %account.mint, "cannot value entry, skipping price check: {}", e);
                PriceMatch::Disabled
            }
        };

        match price_match {
            PriceMatch::TakeProfit(value) => {
                tracing::info!(mint = %account.mint, value = %value, "🎯 Take profit reached")
            }
            PriceMatch::StopLoss(value) => {
                tracing::info!(mint = %account.mint, value = %value, "🛑 Stop loss reached")
            }
            PriceMatch::NoMatch if !self.settings.sell_on_unmatched_price => {
                tracing::info!(mint = %account.mint, "Price never matched, holding position");
                return;
            }
            PriceMatch::NoMatch => {
                tracing::info!(mint = %account.mint, "Price never matched, selling anyway")
            }
            PriceMatch::Disabled => {}
        }

        let plan = SwapPlan {
            direction: Direction::Sell,
            identity,
            market,
            amount_in: account.amount,
            slippage_percent: self.settings.sell_slippage,
            max_attempts: self.settings.max_sell_retries,
            min_quote_reserve: None,
        };

        match self.retry.run(&plan).await {
            RetryOutcome::Confirmed { outcome, attempts } => tracing::info!(
                mint = %account.mint,
                attempts,
                signature = outcome.signature.as_deref().unwrap_or(""),
                "✅ Sold"
            ),
            other => tracing::warn!(
                mint = %account.mint,
                attempts = other.attempts(),
                "❌ Sell failed: {:?}",
                other
            ),
        }
    }
}
