use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AppError;

/// Candle interval. The enumerated set is fixed; anything else is rejected
/// at the configuration boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "3m")]
    M3,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "2h")]
    H2,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "6h")]
    H6,
    #[serde(rename = "8h")]
    H8,
    #[serde(rename = "12h")]
    H12,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 12] = [
        Timeframe::M1,
        Timeframe::M3,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H2,
        Timeframe::H4,
        Timeframe::H6,
        Timeframe::H8,
        Timeframe::H12,
        Timeframe::D1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H2 => "2h",
            Timeframe::H4 => "4h",
            Timeframe::H6 => "6h",
            Timeframe::H8 => "8h",
            Timeframe::H12 => "12h",
            Timeframe::D1 => "1d",
        }
    }

    pub fn minutes(&self) -> u64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M3 => 3,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H2 => 120,
            Timeframe::H4 => 240,
            Timeframe::H6 => 360,
            Timeframe::H8 => 480,
            Timeframe::H12 => 720,
            Timeframe::D1 => 1440,
        }
    }

    /// Number of candles of this interval in one day.
    pub fn candles_per_day(&self) -> u64 {
        1440 / self.minutes()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Timeframe::ALL
            .into_iter()
            .find(|tf| tf.as_str() == s)
            .ok_or_else(|| AppError::ConfigValidation(format!("unsupported timeframe: {s:?}")))
    }
}

/// Direction of a threshold crossing relative to its zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossingKind {
    OversoldEnter,
    OversoldExit,
    OverboughtEnter,
    OverboughtExit,
}

impl CrossingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrossingKind::OversoldEnter => "oversold_enter",
            CrossingKind::OversoldExit => "oversold_exit",
            CrossingKind::OverboughtEnter => "overbought_enter",
            CrossingKind::OverboughtExit => "overbought_exit",
        }
    }

    /// Moves into the oversold/overbought zone (as opposed to leaving it).
    pub fn is_entry(&self) -> bool {
        matches!(
            self,
            CrossingKind::OversoldEnter | CrossingKind::OverboughtEnter
        )
    }

    pub fn is_oversold(&self) -> bool {
        matches!(
            self,
            CrossingKind::OversoldEnter | CrossingKind::OversoldExit
        )
    }
}

impl fmt::Display for CrossingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CrossingKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "oversold_enter" => Ok(CrossingKind::OversoldEnter),
            "oversold_exit" => Ok(CrossingKind::OversoldExit),
            "overbought_enter" => Ok(CrossingKind::OverboughtEnter),
            "overbought_exit" => Ok(CrossingKind::OverboughtExit),
            other => Err(anyhow::anyhow!("unknown crossing kind: {other}")),
        }
    }
}

/// One closed (or in-progress) candle with its oscillator value.
#[derive(Clone, Debug, PartialEq)]
pub struct OscillatorPoint {
    /// Candle open time (ms since epoch)
    pub ts_ms: u64,
    pub close: Decimal,
    /// Expected in [0, 100]; NaN and out-of-range values are tolerated.
    pub oscillator: f64,
}

#[derive(Error, Debug, PartialEq)]
pub enum WindowError {
    #[error("timestamps not strictly increasing at index {index}")]
    NotIncreasing { index: usize },
}

/// Ordered series of points with strictly increasing timestamps.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SeriesWindow {
    points: Vec<OscillatorPoint>,
}

impl SeriesWindow {
    pub fn new(points: Vec<OscillatorPoint>) -> Result<Self, WindowError> {
        if let Some(index) = points
            .windows(2)
            .position(|w| w[1].ts_ms <= w[0].ts_ms)
        {
            return Err(WindowError::NotIncreasing { index: index + 1 });
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[OscillatorPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Predecessor and most recent point, if the window has at least two.
    pub fn last_pair(&self) -> Option<(&OscillatorPoint, &OscillatorPoint)> {
        match self.points.as_slice() {
            [.., prev, curr] => Some((prev, curr)),
            _ => None,
        }
    }

    /// Every adjacent `(previous, current)` pair in chronological order.
    pub fn pairs(&self) -> impl Iterator<Item = (&OscillatorPoint, &OscillatorPoint)> {
        self.points.windows(2).map(|w| (&w[0], &w[1]))
    }

    /// Sub-window of points at or after `ts_ms`.
    pub fn since(&self, ts_ms: u64) -> SeriesWindow {
        let start = self.points.partition_point(|p| p.ts_ms < ts_ms);
        SeriesWindow {
            points: self.points[start..].to_vec(),
        }
    }
}

/// A detected threshold crossing. Append-only once created.
#[derive(Clone, Debug, PartialEq)]
pub struct CrossingEvent {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub kind: CrossingKind,
    /// Oscillator at the current point
    pub oscillator_value: f64,
    pub previous_oscillator_value: f64,
    pub price: Decimal,
    /// Timestamp of the current point (ms since epoch)
    pub occurred_ms: u64,
    /// Produced by historical replay rather than live detection
    pub is_backfilled: bool,
}

/// Boundary pair used by the detector. Valid only when `low < high`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thresholds {
    pub low: f64,
    pub high: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            low: 30.0,
            high: 70.0,
        }
    }
}

/// Operator-controlled watch set. Singleton, owned by the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Insertion order is the processing order.
    pub symbols: Vec<String>,
    pub timeframe: Timeframe,
    #[serde(rename = "rsi_oversold")]
    pub oversold_threshold: i64,
    #[serde(rename = "rsi_overbought")]
    pub overbought_threshold: i64,
    pub notifications_enabled: bool,
}

impl WatchConfig {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            low: self.oversold_threshold as f64,
            high: self.overbought_threshold as f64,
        }
    }

    /// Returns a copy with the watch set replaced.
    ///
    /// Thresholds and the notification flag are operator-fixed and carried
    /// over untouched. On error `self` is not modified.
    pub fn with_watch_set(&self, symbols: &[String], timeframe: &str) -> Result<Self, AppError> {
        let symbols = normalize_symbols(symbols)?;
        let timeframe = timeframe.parse::<Timeframe>()?;

        Ok(Self {
            symbols,
            timeframe,
            ..self.clone()
        })
    }
}

/// Normalizes one symbol into exchange-pair form (`BTC` → `BTCUSDT`).
pub fn normalize_symbol(raw: &str) -> Result<String, AppError> {
    let mut symbol = raw.trim().to_ascii_uppercase();

    if !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::ConfigValidation(format!(
            "invalid symbol format: {raw:?}; use the BTCUSDT format"
        )));
    }

    if !symbol.ends_with("USDT") {
        symbol.push_str("USDT");
    }

    if symbol.len() < 5 {
        return Err(AppError::ConfigValidation(format!(
            "invalid symbol format: {raw:?}; use the BTCUSDT format"
        )));
    }

    Ok(symbol)
}

/// Normalizes a list, skipping blanks and later duplicates.
pub fn normalize_symbols(raw: &[String]) -> Result<Vec<String>, AppError> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());

    for s in raw.iter().filter(|s| !s.trim().is_empty()) {
        let symbol = normalize_symbol(s)?;
        if !out.contains(&symbol) {
            out.push(symbol);
        }
    }

    if out.is_empty() {
        return Err(AppError::ConfigValidation(
            "at least one symbol is required".to_string(),
        ));
    }

    Ok(out)
}
