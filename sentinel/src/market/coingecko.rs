//! CoinGecko `market_chart` adapter.
//!
//! CoinGecko only publishes a close-price series whose granularity follows
//! the requested horizon (1 day: 5 minutes, up to 90 days: hourly, beyond:
//! daily). Only timeframes matching one of those granularities are served.
//! Candles are flat (open = high = low = close) with zero volume.

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

pub const COINGECKO_API_BASE: &str = "https://api.coingecko.com/api/v3";

/// Longest horizon still served at hourly granularity.
const MAX_HOURLY_DAYS: usize = 90;

const WARM_UP_EXTRA: usize = 50;

const PROVIDER: &str = "coingecko";

#[derive(Debug, Deserialize)]
struct MarketChart {
    #[serde(default)]
    prices: Vec<Vec<Value>>,
}

#[derive(Clone)]
pub struct CoinGeckoProvider {
    http: Client,
    base_url: String,
    rsi_period: usize,
}

impl CoinGeckoProvider {
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
    pub async fn fetch_market_chart(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        points: usize,
    ) -> Result<Vec<Candle>, ProviderError> {
        let id = coingecko_id(symbol)?;
        let days = chart_days(timeframe, points)?;
        let url = format!("{}/coins/{id}/market_chart", self.base_url);

        let chart: MarketChart = self
            .http
            .get(&url)
            .query(&[("vs_currency", "usd".to_string()), ("days", days.to_string())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let candles = parse_prices(&chart.prices, timeframe)?;
        debug!(count = candles.len(), days, "coingecko prices fetched");
        Ok(candles)
    }
}

#[async_trait]
impl SeriesProvider for CoinGeckoProvider {
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
        let candles = self.fetch_market_chart(symbol, timeframe, want).await?;
        build_window(candles, self.rsi_period, min_points.max(2))
    }
}

pub(crate) fn coingecko_id(symbol: &str) -> Result<&'static str, ProviderError> {
    Ok(match symbol {
        "BTCUSDT" => "bitcoin",
        "ETHUSDT" => "ethereum",
        "DOGEUSDT" => "dogecoin",
        "ADAUSDT" => "cardano",
        "SOLUSDT" => "solana",
        "XRPUSDT" => "ripple",
        "DOTUSDT" => "polkadot",
        "AVAXUSDT" => "avalanche-2",
        "MATICUSDT" => "matic-network",
        "PEPEUSDT" => "pepe",
        "SUIUSDT" => "sui",
        "BIGTIMEUSDT" => "big-time",
        "ALTUSDT" => "altlayer",
        "WLDUSDT" => "worldcoin-wld",
        _ => {
            return Err(ProviderError::UnsupportedSymbol {
                provider: PROVIDER,
                symbol: symbol.to_string(),
            });
        }
    })
}

/// Horizon whose automatic granularity equals `timeframe` and covers
/// `points` samples where the API allows it.
pub(crate) fn chart_days(timeframe: Timeframe, points: usize) -> Result<usize, ProviderError> {
    match timeframe {
        Timeframe::M5 => Ok(1),
        Timeframe::H1 => Ok((points.div_ceil(24) + 1).clamp(2, MAX_HOURLY_DAYS)),
        Timeframe::D1 => Ok((points + 1).max(MAX_HOURLY_DAYS + 1)),
        other => Err(ProviderError::UnsupportedTimeframe {
            provider: PROVIDER,
            timeframe: other.to_string(),
        }),
    }
}

/// Rows are `[time_ms, price]`. Timestamps are floored to the start of
/// their timeframe bucket; the trailing live sample lands in the open bucket.
fn parse_prices(rows: &[Vec<Value>], timeframe: Timeframe) -> Result<Vec<Candle>, ProviderError> {
    let bucket_ms = timeframe.minutes() * 60_000;

    rows.iter()
        .map(|row| {
            let [time, price, ..] = row.as_slice() else {
                return Err(ProviderError::invalid(PROVIDER, "malformed price row"));
            };

            let time_ms = time
                .as_u64()
                .or_else(|| {
                    time.as_f64()
                        .filter(|t| t.is_finite() && *t >= 0.0 && *t < u64::MAX as f64)
                        .map(|t| t as u64)
                })
                .ok_or_else(|| ProviderError::invalid(PROVIDER, "time is not a timestamp"))?;

            let close = price
                .as_f64()
                .and_then(|p| Decimal::try_from(p).ok())
                .ok_or_else(|| ProviderError::invalid(PROVIDER, "price is not a number"))?;

            Ok(Candle {
                open_time_ms: time_ms - time_ms % bucket_ms,
                open: close,
                high: close,
                low: close,
                close,
                volume: Decimal::ZERO,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn maps_symbols_to_coin_ids() {
        assert_eq!(coingecko_id("BTCUSDT").unwrap(), "bitcoin");
        assert_eq!(coingecko_id("WLDUSDT").unwrap(), "worldcoin-wld");
        assert!(matches!(
            coingecko_id("FOOUSDT"),
            Err(ProviderError::UnsupportedSymbol { .. })
        ));
    }

    #[test]
    fn horizon_follows_granularity() {
        assert_eq!(chart_days(Timeframe::M5, 500).unwrap(), 1);
        assert_eq!(chart_days(Timeframe::H1, 10).unwrap(), 2);
        assert_eq!(chart_days(Timeframe::H1, 114).unwrap(), 6);
        assert_eq!(chart_days(Timeframe::H1, 10_000).unwrap(), MAX_HOURLY_DAYS);
        assert_eq!(chart_days(Timeframe::D1, 114).unwrap(), 115);
        assert!(chart_days(Timeframe::M15, 50).is_err());
        assert!(chart_days(Timeframe::H4, 50).is_err());
    }

    #[test]
    fn prices_are_bucketed_into_flat_candles() {
        let chart: MarketChart = serde_json::from_value(json!({
            "prices": [
                [1_700_000_000_000u64, 37010.5],
                [1_700_000_300_000u64, 37020.25],
                [1_700_000_412_345.0, 37030.0]
            ]
        }))
        .unwrap();

        let candles = parse_prices(&chart.prices, Timeframe::M5).unwrap();
        assert_eq!(candles.len(), 3);
        assert_eq!(candles[0].open_time_ms, 1_699_999_800_000);
        assert_eq!(candles[1].open_time_ms, 1_700_000_100_000);
        assert_eq!(candles[2].open_time_ms, 1_700_000_400_000);
        assert_eq!(candles[1].close, Decimal::from_str("37020.25").unwrap());
        assert_eq!(candles[1].open, candles[1].close);
        assert_eq!(candles[1].volume, Decimal::ZERO);
    }

    #[test]
    fn malformed_rows_are_rejected() {
        let rows = vec![vec![json!(1_700_000_000_000u64)]];
        assert!(parse_prices(&rows, Timeframe::M5).is_err());

        let rows = vec![vec![json!(1_700_000_000_000u64), json!("37010.5")]];
        assert!(parse_prices(&rows, Timeframe::M5).is_err());
    }
}
