//! Kraken public OHLC adapter.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::market::errors::ProviderError;
use crate::market::indicator::build_window;
use crate::market::types::Candle;
use crate::market::SeriesProvider;
use crate::signal::model::{SeriesWindow, Timeframe};

pub const KRAKEN_API_BASE: &str = "https://api.kraken.com/0/public";

const PROVIDER: &str = "kraken";

#[derive(Debug, Deserialize)]
struct OhlcEnvelope {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: Option<serde_json::Map<String, Value>>,
}

#[derive(Clone)]
pub struct KrakenProvider {
    http: Client,
    base_url: String,
    rsi_period: usize,
}

impl KrakenProvider {
    pub fn new(base_url: String, timeout: Duration, rsi_period: usize) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url,
            rsi_period,
        })
    }

    #[instrument(skip(self), fields(provider = PROVIDER), level = "debug")]
    pub async fn fetch_ohlc(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<Candle>, ProviderError> {
        let pair = kraken_pair(symbol)?;
        let interval = kraken_interval(timeframe)?;
        let url = format!("{}/OHLC", self.base_url);

        let envelope: OhlcEnvelope = self
            .http
            .get(&url)
            .query(&[("pair", pair), ("interval", interval.to_string())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let candles = parse_ohlc(envelope)?;
        debug!(count = candles.len(), "kraken ohlc fetched");
        Ok(candles)
    }
}

#[async_trait]
impl SeriesProvider for KrakenProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn fetch_series(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        min_points: usize,
    ) -> Result<SeriesWindow, ProviderError> {
        let candles = self.fetch_ohlc(symbol, timeframe).await?;
        build_window(candles, self.rsi_period, min_points.max(2))
    }
}

/// `BTCUSDT` → `XXBTZUSD`; other `XXXUSDT` symbols map to `XXXUSD`.
pub(crate) fn kraken_pair(symbol: &str) -> Result<String, ProviderError> {
    let unsupported = || ProviderError::UnsupportedSymbol {
        provider: PROVIDER,
        symbol: symbol.to_string(),
    };

    let base = symbol.strip_suffix("USDT").ok_or_else(unsupported)?;
    if base.is_empty() {
        return Err(unsupported());
    }

    Ok(match base {
        "BTC" => "XXBTZUSD".to_string(),
        "ETH" => "XETHZUSD".to_string(),
        "XRP" => "XXRPZUSD".to_string(),
        "DOGE" => "XDGUSD".to_string(),
        other => format!("{other}USD"),
    })
}

pub(crate) fn kraken_interval(timeframe: Timeframe) -> Result<u64, ProviderError> {
    match timeframe {
        Timeframe::M1
        | Timeframe::M5
        | Timeframe::M15
        | Timeframe::M30
        | Timeframe::H1
        | Timeframe::H4
        | Timeframe::D1 => Ok(timeframe.minutes()),
        other => Err(ProviderError::UnsupportedTimeframe {
            provider: PROVIDER,
            timeframe: other.to_string(),
        }),
    }
}

/// Rows are `[time_s, open, high, low, close, vwap, volume, count]`.
fn parse_ohlc(envelope: OhlcEnvelope) -> Result<Vec<Candle>, ProviderError> {
    if !envelope.error.is_empty() {
        return Err(ProviderError::invalid(PROVIDER, envelope.error.join("; ")));
    }

    let result = envelope
        .result
        .ok_or_else(|| ProviderError::invalid(PROVIDER, "missing result"))?;

    let rows = result
        .iter()
        .find(|(k, v)| k.as_str() != "last" && v.is_array())
        .and_then(|(_, v)| v.as_array())
        .ok_or_else(|| ProviderError::invalid(PROVIDER, "no ohlc series in result"))?;

    rows.iter()
        .map(|row| {
            let row = row
                .as_array()
                .filter(|r| r.len() >= 7)
                .ok_or_else(|| ProviderError::invalid(PROVIDER, "malformed ohlc row"))?;

            let time_s = row[0]
                .as_u64()
                .ok_or_else(|| ProviderError::invalid(PROVIDER, "time is not an integer"))?;

            let open_time_ms = time_s
                .checked_mul(1_000)
                .ok_or_else(|| ProviderError::invalid(PROVIDER, "time out of range"))?;

            Ok(Candle {
                open_time_ms,
                open: decimal_field(&row[1])?,
                high: decimal_field(&row[2])?,
                low: decimal_field(&row[3])?,
                close: decimal_field(&row[4])?,
                volume: decimal_field(&row[6])?,
            })
        })
        .collect()
}

fn decimal_field(v: &Value) -> Result<Decimal, ProviderError> {
    let s = v
        .as_str()
        .ok_or_else(|| ProviderError::invalid(PROVIDER, "price is not a string"))?;
    Decimal::from_str(s).map_err(|e| ProviderError::invalid(PROVIDER, e.to_string()))
}
