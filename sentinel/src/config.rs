use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::signal::model::{Timeframe, WatchConfig, normalize_symbol, normalize_symbols};

const DEFAULT_SYMBOLS: &str =
    "BTCUSDT,ETHUSDT,DOGEUSDT,ADAUSDT,SOLUSDT,XRPUSDT,DOTUSDT,AVAXUSDT";

const KNOWN_PROVIDERS: [&str; 3] = ["binance", "kraken", "coingecko"];

/// Symbols Kraken does not list, or lists poorly, go to CoinGecko early.
const DEFAULT_PROVIDER_PRIORITY: &str = "PEPEUSDT=binance,kraken,coingecko;\
    SUIUSDT=binance,coingecko,kraken;\
    BIGTIMEUSDT=binance,coingecko;\
    ALTUSDT=binance,coingecko;\
    WLDUSDT=binance,coingecko";

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string.
    pub database_url: String,

    /// Listen address of the HTTP surface.
    pub http_bind: SocketAddr,

    // =========================
    // Worker loop
    // =========================
    /// Sleep between the end of one cycle and the start of the next.
    pub check_interval: Duration,

    /// Pause between consecutive symbols inside a cycle.
    ///
    /// Keeps the upstream request rate flat instead of bursting once per
    /// cycle.
    pub symbol_pacing: Duration,

    /// Sleep after a failed cycle before retrying.
    pub error_cooldown: Duration,

    /// Suppression window for same-kind crossings.
    pub duplicate_window: Duration,

    /// Upper bound on a single series fetch, fallback chain included.
    pub fetch_timeout: Duration,

    // =========================
    // Oscillator
    // =========================
    /// Usable points requested per fetch.
    pub series_min_points: usize,
    pub rsi_period: usize,

    /// Seed for the stored watch config. Used once, on first boot.
    pub default_watch: WatchConfig,

    /// Largest replay horizon accepted by the historical endpoint.
    pub backfill_max_days: u64,

    // =========================
    // Providers
    // =========================
    /// Fallback chain order, by provider name.
    pub provider_order: Vec<String>,

    /// Per-symbol chain overriding `provider_order` for that symbol.
    pub provider_priority: BTreeMap<String, Vec<String>>,

    pub binance_min_interval: Duration,
    pub kraken_min_interval: Duration,
    pub coingecko_min_interval: Duration,

    // =========================
    // Notifications
    // =========================
    /// Without a token alerts are only logged.
    pub telegram_bot_token: Option<String>,

    /// Always receives alerts, approved or not.
    pub telegram_admin_chat_id: Option<i64>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Blank values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let oversold: i64 = parse_or(&get, "RSI_OVERSOLD", 30)?;
        let overbought: i64 = parse_or(&get, "RSI_OVERBOUGHT", 70)?;
        if !(0..=100).contains(&oversold) || !(0..=100).contains(&overbought) {
            return Err(AppError::ConfigValidation(
                "rsi thresholds must be within 0..=100".to_string(),
            ));
        }
        if oversold >= overbought {
            return Err(AppError::ConfigValidation(format!(
                "RSI_OVERSOLD ({oversold}) must be below RSI_OVERBOUGHT ({overbought})"
            )));
        }

        let symbols: Vec<String> = get("DEFAULT_SYMBOLS")
            .unwrap_or_else(|| DEFAULT_SYMBOLS.to_string())
            .split(',')
            .map(str::to_string)
            .collect();

        let default_watch = WatchConfig {
            symbols: normalize_symbols(&symbols)?,
            timeframe: get("DEFAULT_TIMEFRAME")
                .as_deref()
                .unwrap_or("5m")
                .parse::<Timeframe>()?,
            oversold_threshold: oversold,
            overbought_threshold: overbought,
            notifications_enabled: true,
        };

        let rsi_period: usize = parse_or(&get, "RSI_PERIOD", 14)?;
        if rsi_period < 2 {
            return Err(AppError::ConfigValidation(
                "RSI_PERIOD must be at least 2".to_string(),
            ));
        }

        let series_min_points: usize = parse_or(&get, "SERIES_MIN_POINTS", 50)?;
        if series_min_points < 2 {
            return Err(AppError::ConfigValidation(
                "SERIES_MIN_POINTS must be at least 2".to_string(),
            ));
        }

        let provider_order = parse_provider_list(
            "PROVIDER_ORDER",
            &get("PROVIDER_ORDER").unwrap_or_else(|| KNOWN_PROVIDERS.join(",")),
        )?;
        let provider_priority = parse_provider_priority(
            &get("PROVIDER_PRIORITY").unwrap_or_else(|| DEFAULT_PROVIDER_PRIORITY.to_string()),
        )?;

        Ok(Self {
            database_url: get("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://rsi_signals.db?mode=rwc".to_string()),
            http_bind: parse_or(&get, "HTTP_BIND", SocketAddr::from(([127, 0, 0, 1], 8081)))?,

            check_interval: Duration::from_secs(parse_or(&get, "CHECK_INTERVAL_SECS", 180)?),
            symbol_pacing: Duration::from_millis(parse_or(&get, "SYMBOL_PACING_MS", 1_500)?),
            error_cooldown: Duration::from_secs(parse_or(&get, "ERROR_COOLDOWN_SECS", 60)?),
            duplicate_window: Duration::from_secs(parse_or(&get, "DUPLICATE_WINDOW_SECS", 180)?),
            fetch_timeout: Duration::from_secs(parse_or(&get, "FETCH_TIMEOUT_SECS", 20)?),

            series_min_points,
            rsi_period,
            default_watch,
            backfill_max_days: parse_or(&get, "BACKFILL_MAX_DAYS", 30u64)?.max(1),

            provider_order,
            provider_priority,
            binance_min_interval: Duration::from_millis(parse_or(
                &get,
                "BINANCE_MIN_INTERVAL_MS",
                100,
            )?),
            kraken_min_interval: Duration::from_millis(parse_or(
                &get,
                "KRAKEN_MIN_INTERVAL_MS",
                1_000,
            )?),
            coingecko_min_interval: Duration::from_millis(parse_or(
                &get,
                "COINGECKO_MIN_INTERVAL_MS",
                2_000,
            )?),

            telegram_bot_token: get("TELEGRAM_BOT_TOKEN").map(|t| t.trim().to_string()),
            telegram_admin_chat_id: get("TELEGRAM_ADMIN_CHAT_ID")
                .map(|v| parse_value("TELEGRAM_ADMIN_CHAT_ID", &v))
                .transpose()?,
        })
    }
}

/// Comma-separated provider names; blanks are skipped, unknown names rejected.
fn parse_provider_list(key: &str, raw: &str) -> Result<Vec<String>, AppError> {
    let names: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    if let Some(unknown) = names.iter().find(|p| !KNOWN_PROVIDERS.contains(&p.as_str())) {
        return Err(AppError::ConfigValidation(format!(
            "unknown provider in {key}: {unknown}"
        )));
    }
    if names.is_empty() {
        return Err(AppError::ConfigValidation(format!(
            "{key} names no provider"
        )));
    }

    Ok(names)
}

/// `SYMBOL=provider,provider;SYMBOL=provider`.
fn parse_provider_priority(raw: &str) -> Result<BTreeMap<String, Vec<String>>, AppError> {
    let mut out = BTreeMap::new();

    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (symbol, providers) = entry.split_once('=').ok_or_else(|| {
            AppError::ConfigValidation(format!(
                "PROVIDER_PRIORITY entry {entry:?} is not SYMBOL=providers"
            ))
        })?;
        out.insert(
            normalize_symbol(symbol)?,
            parse_provider_list("PROVIDER_PRIORITY", providers)?,
        );
    }

    Ok(out)
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| AppError::ConfigValidation(format!("{key}={raw:?}: {e}")))
}
