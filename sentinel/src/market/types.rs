use rust_decimal::Decimal;

/// One OHLCV candle as returned by an exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    /// Candle open time (ms since epoch)
    pub open_time_ms: u64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}
