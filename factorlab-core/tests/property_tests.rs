//! Property tests for engine invariants.
//!
//! 1. Short signals always produce the exact all-zero sentinel
//! 2. Metrics stay inside their natural ranges for arbitrary inputs
//! 3. Diagnostics never alter the measurement (evaluate == backtest metrics)
//! 4. Strategy records pair factors with timeframes

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use factorlab_core::costs::FixedBpsCost;
use factorlab_core::domain::{Bar, FactorLeg, FactorMetrics, PriceSeries, SignalSeries, StrategyResult};
use factorlab_core::engine::{BacktestEngine, EngineConfig};
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_closes(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.03..0.03_f64, len).prop_map(|moves| {
        let mut price = 100.0;
        moves
            .into_iter()
            .map(|m| {
                price *= 1.0 + m;
                price
            })
            .collect()
    })
}

fn arb_signal_value() -> impl Strategy<Value = f64> {
    prop_oneof![
        1 => Just(f64::NAN),
        4 => -2.0..2.0_f64,
    ]
}

fn arb_timeframe() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["1m", "5m", "15m", "1h", "4h", "1d"])
}

fn series(closes: &[f64]) -> PriceSeries {
    let start = Utc.with_ymd_and_hms(2024, 1, 2, 1, 30, 0).unwrap();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar {
            timestamp: start + Duration::minutes(i as i64),
            open: c,
            high: c,
            low: c,
            close: c,
            volume: 1.0,
        })
        .collect();
    PriceSeries::new("PROP", "1m".parse().unwrap(), bars).unwrap()
}

fn engine() -> BacktestEngine {
    BacktestEngine::new(EngineConfig::default(), Arc::new(FixedBpsCost::new(3.0)))
}

// ── 1. Sentinel ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn short_signal_is_zero_sentinel(
        closes in arb_closes(25..60),
        usable in 0usize..20,
    ) {
        let n = closes.len();
        let mut values = vec![f64::NAN; n];
        for v in values.iter_mut().take(usable) {
            *v = 1.0;
        }
        let result = engine().evaluate(&series(&closes), &SignalSeries::new("s", values)).unwrap();
        prop_assert_eq!(result.metrics(), FactorMetrics::zero());
        prop_assert_eq!(result.diagnostics, vec!["insufficient_data".to_string()]);
    }
}

// ── 2. Ranges ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn metrics_stay_in_range(
        (closes, values) in (30usize..120).prop_flat_map(|n| {
            (arb_closes(n..n + 1), prop::collection::vec(arb_signal_value(), n))
        })
    ) {
        let signal = SignalSeries::new("s", values);
        let run = engine().backtest(&series(&closes), &signal, 100_000.0, 0.1).unwrap();
        let m = run.metrics;
        prop_assert!(m.sharpe_ratio.is_finite());
        prop_assert!((-1.0..=1.0).contains(&m.stability));
        prop_assert!((0.0..=1.0).contains(&m.win_rate));
        prop_assert!(m.profit_factor.is_finite() && m.profit_factor >= 0.0);
        prop_assert!((0.0..=1.0).contains(&m.max_drawdown));
        prop_assert!((-1.0..=1.0).contains(&m.information_coefficient));
        prop_assert_eq!(m.trades_count, run.trades.len());
        if !run.is_insufficient() {
            prop_assert_eq!(run.returns.len(), run.equity.len());
        }
    }
}

// ── 3. Diagnostics never rewrite metrics ─────────────────────────────

proptest! {
    #[test]
    fn evaluate_reports_backtest_metrics(
        (closes, values) in (30usize..80).prop_flat_map(|n| {
            (arb_closes(n..n + 1), prop::collection::vec(arb_signal_value(), n))
        })
    ) {
        let prices = series(&closes);
        let signal = SignalSeries::new("s", values);
        let e = engine();
        let run = e.backtest(&prices, &signal, 100_000.0, 0.1).unwrap();
        let result = e.evaluate(&prices, &signal).unwrap();
        prop_assert_eq!(result.metrics(), run.metrics);
        prop_assert_eq!(result.diagnostics, run.diagnostic_strings());
    }
}

// ── 4. Pairing ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn strategy_factors_pair_with_timeframes(
        legs in prop::collection::vec(("[a-z]{1,6}", arb_timeframe()), 1..5)
    ) {
        let legs: Vec<FactorLeg> = legs
            .iter()
            .map(|(f, tf)| FactorLeg::new(f.clone(), tf.parse().unwrap()))
            .collect();
        match StrategyResult::new("X", &legs, &FactorMetrics::zero(), 0.0, vec![]) {
            Ok(s) => {
                prop_assert!((2..=3).contains(&legs.len()));
                prop_assert_eq!(s.factors().len(), s.timeframes().len());
                prop_assert_eq!(s.legs().unwrap(), legs);
            }
            Err(_) => prop_assert!(!(2..=3).contains(&legs.len())),
        }
    }
}
