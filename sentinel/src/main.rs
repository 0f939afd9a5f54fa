use std::sync::Arc;

use anyhow::Context;
use sentinel::{
    api::{self, ApiContext, ApiSettings},
    config::AppConfig,
    db::Db,
    market::{
        BinanceProvider, CoinGeckoProvider, FallbackProvider, KrakenProvider, SeriesProvider,
        Throttled, binance::BINANCE_API_BASE, coingecko::COINGECKO_API_BASE,
        kraken::KRAKEN_API_BASE,
    },
    metrics::counters::Counters,
    notify::{Dispatcher, LogDispatcher, TelegramDispatcher, telegram::TELEGRAM_API_BASE},
    scheduler::{CycleScheduler, SchedulerSettings},
    store::{SignalStore, SqlxSignalRepository},
};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Connects, migrates and seeds the watch config on first boot.
async fn init_store(cfg: &AppConfig) -> anyhow::Result<Arc<SignalStore>> {
    let db = Db::connect(&cfg.database_url)
        .await
        .with_context(|| format!("failed to connect to {}", cfg.database_url))?;
    db.migrate().await.context("schema migration failed")?;

    let repo = Arc::new(SqlxSignalRepository::new(db.pool.clone()));
    let store = Arc::new(SignalStore::new(repo, cfg.default_watch.clone()));

    let watch = store.watch_config().await?;
    info!(
        symbols = ?watch.symbols,
        timeframe = %watch.timeframe,
        oversold = watch.oversold_threshold,
        overbought = watch.overbought_threshold,
        notifications = watch.notifications_enabled,
        "watch config loaded"
    );

    Ok(store)
}

/// Throttled upstreams composed into one fallback chain, in configured order,
/// with per-symbol priorities applied on top.
fn build_provider(cfg: &AppConfig) -> anyhow::Result<Arc<dyn SeriesProvider>> {
    let mut chain: Vec<Arc<dyn SeriesProvider>> = Vec::new();

    for name in &cfg.provider_order {
        let provider: Arc<dyn SeriesProvider> = match name.as_str() {
            "binance" => Arc::new(Throttled::new(
                BinanceProvider::new(
                    BINANCE_API_BASE.to_string(),
                    cfg.fetch_timeout,
                    cfg.rsi_period,
                )?,
                cfg.binance_min_interval,
            )),
            "kraken" => Arc::new(Throttled::new(
                KrakenProvider::new(
                    KRAKEN_API_BASE.to_string(),
                    cfg.fetch_timeout,
                    cfg.rsi_period,
                )?,
                cfg.kraken_min_interval,
            )),
            "coingecko" => Arc::new(Throttled::new(
                CoinGeckoProvider::new(
                    COINGECKO_API_BASE.to_string(),
                    cfg.fetch_timeout,
                    cfg.rsi_period,
                )?,
                cfg.coingecko_min_interval,
            )),
            other => anyhow::bail!("unknown provider {other}"),
        };
        chain.push(provider);
    }

    let mut fallback = FallbackProvider::new(chain);
    for (symbol, order) in &cfg.provider_priority {
        debug!(symbol = %symbol, providers = ?order, "symbol provider priority");
        fallback = fallback.with_priority(symbol, order.as_slice());
    }
    info!(
        providers = ?fallback.providers().collect::<Vec<_>>(),
        overrides = cfg.provider_priority.len(),
        "series providers ready"
    );
    Ok(Arc::new(fallback))
}

fn build_dispatcher(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Dispatcher>> {
    match &cfg.telegram_bot_token {
        Some(token) => {
            if cfg.telegram_admin_chat_id.is_none() {
                warn!("TELEGRAM_ADMIN_CHAT_ID not set; alerts go to approved subscribers only");
            }
            Ok(Arc::new(TelegramDispatcher::new(
                TELEGRAM_API_BASE,
                token,
                cfg.fetch_timeout,
            )?))
        }
        None => {
            warn!("TELEGRAM_BOT_TOKEN not set; alerts will only be logged");
            Ok(Arc::new(LogDispatcher))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    common::init_logger("sentinel", is_production);

    info!("Starting RSI sentinel...");

    let cfg = AppConfig::from_env()?;
    let store = init_store(&cfg).await?;
    let provider = build_provider(&cfg)?;
    let dispatcher = build_dispatcher(&cfg)?;
    let counters = Counters::default();

    let (stop_tx, stop_rx) = watch::channel(false);

    let scheduler = CycleScheduler::new(
        store.clone(),
        provider.clone(),
        dispatcher,
        cfg.duplicate_window,
        SchedulerSettings::from_config(&cfg),
        counters.clone(),
    );
    let worker = tokio::spawn(scheduler.run(stop_rx.clone()));

    let ctx = ApiContext {
        store,
        provider,
        counters,
        settings: ApiSettings::from_config(&cfg),
    };

    let mut http_stop = stop_rx;
    let (addr, server) = warp::serve(api::routes(ctx))
        .try_bind_with_graceful_shutdown(cfg.http_bind, async move {
            // Resolves on stop or when the sender goes away.
            let _ = http_stop.wait_for(|stop| *stop).await;
        })
        .with_context(|| format!("failed to bind {}", cfg.http_bind))?;
    let http = tokio::spawn(server);
    info!(%addr, "http surface listening");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    let _ = stop_tx.send(true);

    if let Err(e) = worker.await {
        error!(error = %e, "worker task ended abnormally");
    }
    if let Err(e) = http.await {
        error!(error = %e, "http task ended abnormally");
    }

    info!("Shutdown complete");
    Ok(())
}
