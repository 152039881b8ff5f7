use anyhow::{Context, Result};
use clap::Parser;
use raysniper::config::{BotConfig, StrategyKind, DEFAULT_CONFIG_FILE};
use raysniper::controller::{Bot, BotDeps, BotSettings};
use raysniper::execution::{BundleStrategy, DirectStrategy, ExecutionStrategy, PaperStrategy};
use raysniper::listeners::Listener;
use raysniper::models::{to_raw, LedgerEvent};
use raysniper::persistence::{KeyValueStore, MemoryStore, RedisStore};
use raysniper::rpc::{JsonRpcClient, LedgerClient};
use raysniper::swap::{PaperSwapBuilder, SwapBuilder};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const LAMPORT_DECIMALS: u8 = 9;

/// Raydium new-pool sniper
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file; RAYSNIPER__* variables override it
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log filter, e.g. "raysniper=debug"; overrides RUST_LOG
    #[arg(long)]
    log_filter: Option<String>,

    /// Validate configuration and the quote token account, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    setup_logging(args.log_filter.as_deref());

    tracing::info!("🚀 raysniper starting");

    let config = BotConfig::load(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;
    let started_at = chrono::Utc::now().timestamp().max(0) as u64;
    let settings = BotSettings::from_config(&config, started_at)?;

    let client: Arc<dyn LedgerClient> = Arc::new(JsonRpcClient::new(
        &config.rpc.endpoint,
        &config.rpc.commitment,
        config.rpc.requests_per_second,
    )?);
    let builder: Arc<dyn SwapBuilder> = Arc::new(PaperSwapBuilder::new(client.clone()));
    let strategy = build_strategy(&config, client.clone(), builder.clone())?;
    let store = connect_store(&config).await;

    log_configuration(&config, &settings, strategy.name());

    let bot = Arc::new(Bot::new(
        settings,
        BotDeps {
            client,
            builder,
            strategy,
            store,
        },
    ));
    bot.validate().await.context("startup validation failed")?;

    if args.check {
        tracing::info!("✅ Configuration OK");
        return Ok(());
    }

    if config.persistence.use_tracking_list {
        if let Err(e) = bot.warm_start().await {
            tracing::warn!("Warm start failed, continuing with empty caches: {}", e);
        }
    }

    let (tx, mut rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let listener = Listener::new(
        &config.rpc.websocket_endpoint,
        &config.rpc.commitment,
        &config.wallet.quote_mint,
        &config.wallet.owner,
        config.sell.auto_sell,
    );
    let shutdown = bot.shutdown_token();
    let listener_task = tokio::spawn(async move { listener.run(tx, shutdown).await });

    let dispatch_task = {
        let bot = bot.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    LedgerEvent::PoolOpened(event) => {
                        bot.on_pool_opened(event);
                    }
                    LedgerEvent::BalanceChanged(event) => {
                        bot.on_balance_changed(event);
                    }
                }
            }
        })
    };

    tracing::info!("\nPress Ctrl+C to stop...\n");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("\n⚠️  Received Ctrl+C, shutting down...");
        }
        result = listener_task => {
            tracing::error!("Listener exited: {:?}", result);
        }
        result = dispatch_task => {
            tracing::error!("Event dispatch exited: {:?}", result);
        }
    }

    bot.shutdown().await;

    Ok(())
}

fn setup_logging(filter: Option<&str>) {
    let filter = match filter {
        Some(filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("raysniper=info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_strategy(
    config: &BotConfig,
    client: Arc<dyn LedgerClient>,
    builder: Arc<dyn SwapBuilder>,
) -> Result<Arc<dyn ExecutionStrategy>> {
    let execution = &config.execution;

    let strategy: Arc<dyn ExecutionStrategy> = match execution.strategy {
        StrategyKind::Paper => Arc::new(PaperStrategy),
        StrategyKind::Direct => Arc::new(DirectStrategy::new(client, execution.confirm_poll())),
        StrategyKind::Bundle => Arc::new(BundleStrategy::new(
            client,
            builder,
            execution.relay_endpoints.clone(),
            execution.tip_accounts.clone(),
            to_raw(execution.bundle_tip, LAMPORT_DECIMALS)?,
            execution.confirm_poll(),
        )?),
    };

    if execution.strategy != StrategyKind::Paper {
        tracing::warn!(
            "⚠️  The paper swap builder does not sign; {} submissions will be rejected by the node",
            strategy.name()
        );
    }

    Ok(strategy)
}

async fn connect_store(config: &BotConfig) -> Arc<dyn KeyValueStore> {
    let persistence = &config.persistence;

    match &persistence.redis_url {
        Some(url) => match RedisStore::new(url, &persistence.namespace).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::warn!("Redis unavailable ({}), falling back to in-memory store", e);
                Arc::new(MemoryStore::new())
            }
        },
        None => {
            tracing::info!("No redis_url configured, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    }
}

fn log_configuration(config: &BotConfig, settings: &BotSettings, strategy: &str) {
    tracing::info!("\n📊 Configuration:");
    tracing::info!("  Wallet: {}", config.wallet.owner);
    tracing::info!("  Quote: {} {}", config.buy.quote_amount, config.wallet.quote_mint);
    tracing::info!("  Strategy: {}", strategy);
    tracing::info!("  Single position: {}", settings.single_position);
    tracing::info!(
        "  Take profit: {}%  Stop loss: {}",
        settings.take_profit_percent,
        settings
            .stop_loss_percent
            .map(|sl| format!("{}%", sl))
            .unwrap_or_else(|| "off".to_string())
    );
    tracing::info!(
        "  Filters: {}",
        settings
            .filters
            .iter()
            .map(|f| f.name())
            .collect::<Vec<_>>()
            .join(", ")
    );
    tracing::info!("  Auto sell: {}", settings.auto_sell);
}
