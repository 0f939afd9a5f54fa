//! Market-data providers.
//!
//! Each upstream sits behind [`SeriesProvider`]; composition (fallback
//! ordering, throttling) is done with wrappers so the analysis core never
//! sees HTTP, rate limits or source selection.

pub mod binance;
pub mod coingecko;
pub mod errors;
pub mod fallback;
pub mod indicator;
pub mod kraken;
pub mod throttle;
pub mod types;

use async_trait::async_trait;

use crate::signal::model::{SeriesWindow, Timeframe};

pub use binance::BinanceProvider;
pub use coingecko::CoinGeckoProvider;
pub use errors::ProviderError;
pub use fallback::FallbackProvider;
pub use kraken::KrakenProvider;
pub use throttle::Throttled;
pub use types::Candle;

#[async_trait]
pub trait SeriesProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Chronological window with at least two usable oscillator points.
    async fn fetch_series(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        min_points: usize,
    ) -> Result<SeriesWindow, ProviderError>;
}
