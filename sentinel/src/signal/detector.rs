//! Threshold-crossing detection.
//!
//! Decision list, first match wins:
//!
//! | kind               | previous → current          |
//! |--------------------|-----------------------------|
//! | `oversold_enter`   | prev > low  and curr <= low |
//! | `oversold_exit`    | prev <= low and curr > low  |
//! | `overbought_enter` | prev < high and curr >= high|
//! | `overbought_exit`  | prev >= high and curr < high|
//!
//! `<= low` is inside the oversold zone and `>= high` inside the overbought
//! zone. A pair where either value is missing (NaN or infinite) yields nothing.

use tracing::debug;

use super::model::{CrossingEvent, CrossingKind, OscillatorPoint, SeriesWindow, Thresholds, Timeframe};

/// Classifies the transition `prev → curr` against `t`.
pub fn classify(prev: f64, curr: f64, t: &Thresholds) -> Option<CrossingKind> {
    if !prev.is_finite() || !curr.is_finite() {
        return None;
    }

    if prev > t.low && curr <= t.low {
        Some(CrossingKind::OversoldEnter)
    } else if prev <= t.low && curr > t.low {
        Some(CrossingKind::OversoldExit)
    } else if prev < t.high && curr >= t.high {
        Some(CrossingKind::OverboughtEnter)
    } else if prev >= t.high && curr < t.high {
        Some(CrossingKind::OverboughtExit)
    } else {
        None
    }
}

fn crossing(
    symbol: &str,
    timeframe: Timeframe,
    prev: &OscillatorPoint,
    curr: &OscillatorPoint,
    t: &Thresholds,
    is_backfilled: bool,
) -> Option<CrossingEvent> {
    let kind = classify(prev.oscillator, curr.oscillator, t)?;

    Some(CrossingEvent {
        symbol: symbol.to_string(),
        timeframe,
        kind,
        oscillator_value: curr.oscillator,
        previous_oscillator_value: prev.oscillator,
        price: curr.close,
        occurred_ms: curr.ts_ms,
        is_backfilled,
    })
}

/// Live mode: looks only at the last two points of `window`.
///
/// Pure; the same window always yields the same candidate.
pub fn detect_live(
    symbol: &str,
    timeframe: Timeframe,
    window: &SeriesWindow,
    t: &Thresholds,
) -> Option<CrossingEvent> {
    let (prev, curr) = window.last_pair()?;
    crossing(symbol, timeframe, prev, curr, t, false)
}

/// Backfill mode: every adjacent pair of the sub-window starting at
/// `since_ms`, oldest first. Results are tagged `is_backfilled` and never persisted.
pub fn detect_backfill(
    symbol: &str,
    timeframe: Timeframe,
    window: &SeriesWindow,
    t: &Thresholds,
    since_ms: u64,
) -> Vec<CrossingEvent> {
    let horizon = window.since(since_ms);

    let out: Vec<CrossingEvent> = horizon
        .pairs()
        .filter_map(|(prev, curr)| crossing(symbol, timeframe, prev, curr, t, true))
        .collect();

    debug!(
        symbol,
        timeframe = %timeframe,
        candles = horizon.len(),
        found = out.len(),
        "historical crossings replayed"
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    const T: Thresholds = Thresholds {
        low: 30.0,
        high: 70.0,
    };

    fn window(values: &[f64]) -> SeriesWindow {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, v)| OscillatorPoint {
                ts_ms: 1_000 * (i as u64 + 1),
                close: Decimal::new(100 + i as i64, 0),
                oscillator: *v,
            })
            .collect();
        SeriesWindow::new(points).unwrap()
    }

    #[test]
    fn four_boundary_directions() {
        assert_eq!(classify(31.0, 29.0, &T), Some(CrossingKind::OversoldEnter));
        assert_eq!(classify(29.0, 31.0, &T), Some(CrossingKind::OversoldExit));
        assert_eq!(classify(69.0, 71.0, &T), Some(CrossingKind::OverboughtEnter));
        assert_eq!(classify(71.0, 69.0, &T), Some(CrossingKind::OverboughtExit));
    }

    #[test]
    fn equality_belongs_to_the_zone() {
        assert_eq!(classify(30.1, 30.0, &T), Some(CrossingKind::OversoldEnter));
        assert_eq!(classify(30.0, 30.1, &T), Some(CrossingKind::OversoldExit));
        assert_eq!(classify(30.0, 30.0, &T), None);
        assert_eq!(classify(69.9, 70.0, &T), Some(CrossingKind::OverboughtEnter));
        assert_eq!(classify(70.0, 69.9, &T), Some(CrossingKind::OverboughtExit));
        assert_eq!(classify(70.0, 70.0, &T), None);
    }

    #[test]
    fn no_crossing_inside_a_zone() {
        assert_eq!(classify(45.0, 55.0, &T), None);
        assert_eq!(classify(20.0, 10.0, &T), None);
        assert_eq!(classify(80.0, 90.0, &T), None);
    }

    #[test]
    fn missing_values_are_skipped() {
        assert_eq!(classify(f64::NAN, 20.0, &T), None);
        assert_eq!(classify(40.0, f64::NAN, &T), None);
        assert_eq!(classify(f64::NAN, f64::NAN, &T), None);
        assert_eq!(classify(f64::INFINITY, 20.0, &T), None);
    }

    #[test]
    fn jump_across_both_boundaries_takes_first_match() {
        assert_eq!(classify(80.0, 20.0, &T), Some(CrossingKind::OversoldEnter));
        assert_eq!(classify(20.0, 80.0, &T), Some(CrossingKind::OversoldExit));
    }

    #[test]
    fn out_of_range_values_still_classify() {
        assert_eq!(classify(40.0, -5.0, &T), Some(CrossingKind::OversoldEnter));
        assert_eq!(classify(60.0, 140.0, &T), Some(CrossingKind::OverboughtEnter));
    }

    #[test]
    fn live_scenarios() {
        let e = detect_live("BTCUSDT", Timeframe::M5, &window(&[45.0, 32.0, 28.0]), &T).unwrap();
        assert_eq!(e.kind, CrossingKind::OversoldEnter);
        assert_eq!(e.oscillator_value, 28.0);
        assert_eq!(e.previous_oscillator_value, 32.0);
        assert_eq!(e.occurred_ms, 3_000);
        assert_eq!(e.price, Decimal::new(102, 0));
        assert!(!e.is_backfilled);

        let e = detect_live("BTCUSDT", Timeframe::M5, &window(&[68.0, 71.0]), &T).unwrap();
        assert_eq!(e.kind, CrossingKind::OverboughtEnter);

        let e = detect_live("BTCUSDT", Timeframe::M5, &window(&[29.0, 31.0]), &T).unwrap();
        assert_eq!(e.kind, CrossingKind::OversoldExit);

        assert!(detect_live("BTCUSDT", Timeframe::M5, &window(&[45.0, 32.0]), &T).is_none());
        assert!(detect_live("BTCUSDT", Timeframe::M5, &window(&[28.0]), &T).is_none());
    }

    #[test]
    fn live_detection_is_idempotent() {
        let w = window(&[50.0, 75.0]);
        let a = detect_live("ETHUSDT", Timeframe::H1, &w, &T);
        let b = detect_live("ETHUSDT", Timeframe::H1, &w, &T);
        assert_eq!(a, b);
        assert!(a.is_some());
    }

    #[test]
    fn backfill_yields_every_crossing_in_horizon() {
        let w = window(&[45.0, 32.0, 28.0, 31.0, 69.0, 72.0, 65.0]);
        let all = detect_backfill("BTCUSDT", Timeframe::M5, &w, &T, 0);
        let kinds: Vec<_> = all.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                CrossingKind::OversoldEnter,
                CrossingKind::OversoldExit,
                CrossingKind::OverboughtEnter,
                CrossingKind::OverboughtExit,
            ]
        );
        assert!(all.iter().all(|e| e.is_backfilled));

        // Horizon starting at the 5th point only keeps pairs within it.
        let recent = detect_backfill("BTCUSDT", Timeframe::M5, &w, &T, 5_000);
        let kinds: Vec<_> = recent.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![CrossingKind::OverboughtEnter, CrossingKind::OverboughtExit]
        );
    }

    proptest! {
        #[test]
        fn decision_table_holds(prev in 0.0f64..100.0, curr in 0.0f64..100.0) {
            let got = classify(prev, curr, &T);

            let oe = prev > T.low && curr <= T.low;
            let ox = prev <= T.low && curr > T.low;
            let be = prev < T.high && curr >= T.high;
            let bx = prev >= T.high && curr < T.high;

            prop_assert_eq!(got == Some(CrossingKind::OversoldEnter), oe);
            prop_assert_eq!(got == Some(CrossingKind::OversoldExit), ox);
            prop_assert_eq!(got == Some(CrossingKind::OverboughtEnter), be && !oe && !ox);
            prop_assert_eq!(got == Some(CrossingKind::OverboughtExit), bx && !oe && !ox);
            prop_assert_eq!(got.is_none(), !(oe || ox || be || bx));
        }
    }
}
