//! Binance public kline adapter. No API key required.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::market::errors::ProviderError;
use crate::market::indicator::build_window;
use crate::market::types::Candle;
use crate::market::SeriesProvider;
use crate::signal::model::{SeriesWindow, Timeframe};

pub const BINANCE_API_BASE: &str = "https://api.binance.com/api/v3";

/// Maximum klines per request (Binance limit)
const MAX_KLINES_PER_REQUEST: usize = 1000;

/// Extra candles requested so the oscillator has settled inside the window.
const WARM_UP_EXTRA: usize = 50;

const PROVIDER: &str = "binance";

#[derive(Clone)]
pub struct BinanceProvider {
    http: Client,
    base_url: String,
    rsi_period: usize,
}

impl BinanceProvider {
    pub fn new(base_url: String, timeout: Duration, rsi_period: usize) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url,
            rsi_period,
        })
    }

    #[instrument(skip(self), fields(provider = PROVIDER), level = "debug")]
    pub async fn fetch_klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ProviderError> {
        let url = format!("{}/klines", self.base_url);
        let limit = limit.clamp(1, MAX_KLINES_PER_REQUEST);

        let rows: Vec<Vec<Value>> = self
            .http
            .get(&url)
            .query(&[
                ("symbol", symbol.to_string()),
                ("interval", timeframe.as_str().to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let candles = rows
            .iter()
            .map(|row| parse_kline_row(row))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count = candles.len(), "binance klines fetched");
        Ok(candles)
    }
}

#[async_trait]
impl SeriesProvider for BinanceProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn fetch_series(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        min_points: usize,
    ) -> Result<SeriesWindow, ProviderError> {
        let want = min_points + self.rsi_period + WARM_UP_EXTRA;
        let candles = self.fetch_klines(symbol, timeframe, want).await?;
        build_window(candles, self.rsi_period, min_points.max(2))
    }
}

/// `[open_time, open, high, low, close, volume, close_time, ...]`
/// with prices as decimal strings.
pub(crate) fn parse_kline_row(row: &[Value]) -> Result<Candle, ProviderError> {
    if row.len() < 6 {
        return Err(ProviderError::invalid(
            PROVIDER,
            format!("kline row has {} fields", row.len()),
        ));
    }

    let open_time_ms = row[0]
        .as_u64()
        .ok_or_else(|| ProviderError::invalid(PROVIDER, "open time is not an integer"))?;

    Ok(Candle {
        open_time_ms,
        open: decimal_field(&row[1], "open")?,
        high: decimal_field(&row[2], "high")?,
        low: decimal_field(&row[3], "low")?,
        close: decimal_field(&row[4], "close")?,
        volume: decimal_field(&row[5], "volume")?,
    })
}

fn decimal_field(v: &Value, name: &str) -> Result<Decimal, ProviderError> {
    let s = v
        .as_str()
        .ok_or_else(|| ProviderError::invalid(PROVIDER, format!("{name} is not a string")))?;
    Decimal::from_str(s).map_err(|e| ProviderError::invalid(PROVIDER, format!("{name}: {e}")))
}
