use rust_decimal::prelude::ToPrimitive;
use ta::Next;
use ta::indicators::RelativeStrengthIndex;

use crate::market::errors::ProviderError;
use crate::market::types::Candle;
use crate::signal::model::{OscillatorPoint, SeriesWindow};

/// Builds an oscillator window from raw candles.
///
/// Candles are ordered by open time with later duplicates winning. The first
/// `period` points are warm-up and dropped, as are points whose close or
/// oscillator is not finite. The most recent `max_points` survive.
pub fn build_window(
    mut candles: Vec<Candle>,
    period: usize,
    max_points: usize,
) -> Result<SeriesWindow, ProviderError> {
    candles.sort_by_key(|c| c.open_time_ms);
    candles.dedup_by(|later, earlier| {
        if later.open_time_ms == earlier.open_time_ms {
            std::mem::swap(later, earlier);
            true
        } else {
            false
        }
    });

    let mut rsi = RelativeStrengthIndex::new(period)
        .map_err(|e| ProviderError::Indicator(format!("{e:?}")))?;

    let mut points = Vec::with_capacity(candles.len());
    for (i, c) in candles.iter().enumerate() {
        let Some(close) = c.close.to_f64().filter(|v| v.is_finite()) else {
            continue;
        };
        let value = rsi.next(close);

        if i < period || !value.is_finite() {
            continue;
        }

        points.push(OscillatorPoint {
            ts_ms: c.open_time_ms,
            close: c.close,
            oscillator: value,
        });
    }

    if points.len() > max_points {
        points.drain(..points.len() - max_points);
    }

    if points.len() < 2 {
        return Err(ProviderError::InsufficientData { got: points.len() });
    }

    SeriesWindow::new(points).map_err(|e| ProviderError::Indicator(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn candle(i: u64, close: i64) -> Candle {
        let c = Decimal::new(close, 0);
        Candle {
            open_time_ms: i * 60_000,
            open: c,
            high: c,
            low: c,
            close: c,
            volume: Decimal::ONE,
        }
    }

    #[test]
    fn drops_warm_up_and_keeps_order() {
        let candles: Vec<_> = (0..30).map(|i| candle(i, 100 + (i as i64 % 5))).collect();
        let w = build_window(candles, 14, 100).unwrap();

        assert_eq!(w.len(), 16);
        assert_eq!(w.points()[0].ts_ms, 14 * 60_000);
        assert!(w.points().iter().all(|p| (0.0..=100.0).contains(&p.oscillator)));
    }

    #[test]
    fn rising_closes_push_rsi_high() {
        let candles: Vec<_> = (0..40).map(|i| candle(i, 100 + i as i64)).collect();
        let w = build_window(candles, 14, 100).unwrap();
        let (_, last) = w.last_pair().unwrap();
        assert!(last.oscillator > 70.0, "rsi was {}", last.oscillator);
    }

    #[test]
    fn unsorted_and_duplicated_candles_are_normalized() {
        let mut candles: Vec<_> = (0..20).map(|i| candle(i, 100 + i as i64)).collect();
        candles.reverse();
        candles.push(candle(19, 500));

        let w = build_window(candles, 14, 100).unwrap();
        let (_, last) = w.last_pair().unwrap();
        assert_eq!(last.ts_ms, 19 * 60_000);
        assert_eq!(last.close, Decimal::new(500, 0));
    }

    #[test]
    fn keeps_only_the_most_recent_points() {
        let candles: Vec<_> = (0..60).map(|i| candle(i, 100 + (i as i64 % 7))).collect();
        let w = build_window(candles, 14, 10).unwrap();
        assert_eq!(w.len(), 10);
        assert_eq!(w.points()[9].ts_ms, 59 * 60_000);
    }

    #[test]
    fn too_few_candles_is_insufficient() {
        let candles: Vec<_> = (0..15).map(|i| candle(i, 100)).collect();
        let err = build_window(candles, 14, 100).unwrap_err();
        assert!(matches!(err, ProviderError::InsufficientData { got: 1 }));
    }
}
