//! Layered configuration
//!
//! Values come from an optional TOML file overridden by environment
//! variables such as `RAYSNIPER__BUY__QUOTE_AMOUNT=0.05`. Amounts are UI
//! units and are converted with the configured decimals at the point of use.

use crate::error::ConfigError;
use crate::execution::bundle::{BLOCK_ENGINE_ENDPOINTS, TIP_ACCOUNTS_MAINNET};
use crate::models::to_raw;
use crate::pubkey::{self, WSOL_MINT};
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const ENV_PREFIX: &str = "RAYSNIPER";
pub const DEFAULT_CONFIG_FILE: &str = "raysniper.toml";

/// Largest decimals whose raw scale factor fits in a u64
const MAX_QUOTE_DECIMALS: u8 = 19;

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub rpc: RpcSettings,
    pub wallet: WalletSettings,
    #[serde(default)]
    pub buy: BuySettings,
    #[serde(default)]
    pub sell: SellSettings,
    #[serde(default)]
    pub filters: FilterSettings,
    #[serde(default)]
    pub execution: ExecutionSettings,
    #[serde(default)]
    pub persistence: PersistenceSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RpcSettings {
    pub endpoint: String,
    pub websocket_endpoint: String,
    pub commitment: String,
    pub requests_per_second: u32,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.mainnet-beta.solana.com".to_string(),
            websocket_endpoint: "wss://api.mainnet-beta.solana.com".to_string(),
            commitment: "confirmed".to_string(),
            requests_per_second: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletSettings {
    /// Wallet public key, base58
    pub owner: String,
    #[serde(default = "default_quote_mint")]
    pub quote_mint: String,
    #[serde(default = "default_quote_decimals")]
    pub quote_decimals: u8,
    /// Defaults to the owner's associated token account for the quote mint
    #[serde(default)]
    pub quote_token_account: Option<String>,
}

fn default_quote_mint() -> String {
    WSOL_MINT.to_string()
}

fn default_quote_decimals() -> u8 {
    9
}

impl WalletSettings {
    pub fn quote_token_account(&self) -> Result<String, ConfigError> {
        match &self.quote_token_account {
            Some(account) => Ok(account.clone()),
            None => pubkey::associated_token_address(&self.owner, &self.quote_mint)
                .map_err(|e| ConfigError::Invalid(format!("wallet: {}", e))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuySettings {
    /// Quote spent per buy
    pub quote_amount: Decimal,
    pub auto_buy_delay_ms: u64,
    pub max_retries: u32,
    pub slippage_percent: Decimal,
    /// At most one buy in flight and no buys while selling
    pub single_position: bool,
}

impl Default for BuySettings {
    fn default() -> Self {
        Self {
            quote_amount: Decimal::new(1, 2),
            auto_buy_delay_ms: 0,
            max_retries: 10,
            slippage_percent: Decimal::from(20),
            single_position: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SellSettings {
    pub auto_sell: bool,
    pub auto_sell_delay_ms: u64,
    pub max_retries: u32,
    pub slippage_percent: Decimal,
    pub take_profit_percent: Decimal,
    pub stop_loss_percent: Option<Decimal>,
    pub price_check_interval_ms: u64,
    pub price_check_duration_ms: u64,
    /// Sell anyway when the price poll ends without crossing a threshold
    pub sell_on_unmatched_price: bool,
}

impl Default for SellSettings {
    fn default() -> Self {
        Self {
            auto_sell: true,
            auto_sell_delay_ms: 0,
            max_retries: 10,
            slippage_percent: Decimal::from(20),
            take_profit_percent: Decimal::from(40),
            stop_loss_percent: Some(Decimal::from(20)),
            price_check_interval_ms: 2_000,
            price_check_duration_ms: 600_000,
            sell_on_unmatched_price: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub check_renounced: bool,
    pub check_freezable: bool,
    pub check_burned: bool,
    pub min_lp_burned_percent: Decimal,
    pub check_mutable: bool,
    pub check_socials: bool,
    /// Quote units, zero disables the bound
    pub min_pool_size: Decimal,
    pub max_pool_size: Decimal,
    pub filter_check_interval_ms: u64,
    pub filter_check_duration_ms: u64,
    pub consecutive_filter_matches: u32,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            check_renounced: true,
            check_freezable: true,
            check_burned: true,
            min_lp_burned_percent: Decimal::from(90),
            check_mutable: false,
            check_socials: false,
            min_pool_size: Decimal::from(5),
            max_pool_size: Decimal::from(50),
            filter_check_interval_ms: 0,
            filter_check_duration_ms: 0,
            consecutive_filter_matches: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Paper,
    Direct,
    Bundle,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    pub strategy: StrategyKind,
    pub retry_delay_ms: u64,
    pub compute_unit_limit: u32,
    pub compute_unit_price: u64,
    /// Tip paid per bundle, in SOL
    pub bundle_tip: Decimal,
    pub confirm_poll_ms: u64,
    pub relay_endpoints: Vec<String>,
    pub tip_accounts: Vec<String>,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Paper,
            retry_delay_ms: 1_000,
            compute_unit_limit: 101_337,
            compute_unit_price: 421_197,
            bundle_tip: Decimal::new(6, 3),
            confirm_poll_ms: 500,
            relay_endpoints: BLOCK_ENGINE_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
            tip_accounts: TIP_ACCOUNTS_MAINNET.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ExecutionSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn confirm_poll(&self) -> Duration {
        Duration::from_millis(self.confirm_poll_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceSettings {
    /// Falls back to the in-memory store when unset
    pub redis_url: Option<String>,
    pub namespace: String,
    /// Load tracked markets at startup and save them at shutdown
    pub use_tracking_list: bool,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            namespace: "raysniper".to_string(),
            use_tracking_list: false,
        }
    }
}

impl BotConfig {
    /// Load from `path` (missing file is fine) and `RAYSNIPER__*` variables
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = config::Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("execution.relay_endpoints")
                    .with_list_parse_key("execution.tip_accounts"),
            );
        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if !self.rpc.endpoint.starts_with("http") {
            return invalid(format!("rpc.endpoint must be an http(s) url: {}", self.rpc.endpoint));
        }
        if !self.rpc.websocket_endpoint.starts_with("ws") {
            return invalid(format!(
                "rpc.websocket_endpoint must be a ws(s) url: {}",
                self.rpc.websocket_endpoint
            ));
        }
        if self.rpc.requests_per_second == 0 {
            return invalid("rpc.requests_per_second must be positive".to_string());
        }

        for (field, key) in [("wallet.owner", &self.wallet.owner), ("wallet.quote_mint", &self.wallet.quote_mint)] {
            if pubkey::decode(key).is_err() {
                return invalid(format!("{} is not a valid public key: {}", field, key));
            }
        }
        self.wallet.quote_token_account()?;
        if self.wallet.quote_decimals > MAX_QUOTE_DECIMALS {
            return invalid(format!(
                "wallet.quote_decimals must be at most {}, got {}",
                MAX_QUOTE_DECIMALS, self.wallet.quote_decimals
            ));
        }

        if self.buy.quote_amount <= Decimal::ZERO {
            return invalid("buy.quote_amount must be positive".to_string());
        }
        for amount in [
            self.buy.quote_amount,
            self.filters.min_pool_size,
            self.filters.max_pool_size,
        ] {
            to_raw(amount, self.wallet.quote_decimals)?;
        }
        if self.buy.max_retries == 0 || self.sell.max_retries == 0 {
            return invalid("max_retries must be at least 1".to_string());
        }
        for (field, value) in [
            ("buy.slippage_percent", self.buy.slippage_percent),
            ("sell.slippage_percent", self.sell.slippage_percent),
        ] {
            if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
                return invalid(format!("{} must be within 0..=100, got {}", field, value));
            }
        }

        if self.sell.take_profit_percent < Decimal::ZERO {
            return invalid("sell.take_profit_percent must not be negative".to_string());
        }
        if let Some(stop_loss) = self.sell.stop_loss_percent {
            if stop_loss <= Decimal::ZERO || stop_loss > Decimal::ONE_HUNDRED {
                return invalid(format!("sell.stop_loss_percent must be within (0, 100], got {}", stop_loss));
            }
        }

        let filters = &self.filters;
        if filters.min_pool_size < Decimal::ZERO || filters.max_pool_size < Decimal::ZERO {
            return invalid("pool size bounds must not be negative".to_string());
        }
        if filters.max_pool_size > Decimal::ZERO && filters.min_pool_size > filters.max_pool_size {
            return invalid(format!(
                "filters.min_pool_size {} exceeds max_pool_size {}",
                filters.min_pool_size, filters.max_pool_size
            ));
        }
        if filters.min_lp_burned_percent < Decimal::ZERO || filters.min_lp_burned_percent > Decimal::ONE_HUNDRED {
            return invalid("filters.min_lp_burned_percent must be within 0..=100".to_string());
        }

        if self.execution.strategy == StrategyKind::Bundle {
            if self.execution.relay_endpoints.is_empty() || self.execution.tip_accounts.is_empty() {
                return invalid("bundle strategy needs relay endpoints and tip accounts".to_string());
            }
            if self.execution.bundle_tip <= Decimal::ZERO {
                return invalid("execution.bundle_tip must be positive".to_string());
            }
        }

        Ok(())
    }
}
