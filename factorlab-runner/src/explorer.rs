//! Single-factor exploration across timeframes.
//!
//! Each timeframe is loaded once. Every (timeframe, factor) unit is then
//! computed, backtested and validated independently on the rayon pool. A unit
//! that fails is reported and the rest of the batch carries on.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use factorlab_core::domain::{FactorResult, PriceSeries, Timeframe};
use factorlab_core::engine::BacktestEngine;
use factorlab_core::factors::FactorRegistry;

use crate::data_loader::PriceProvider;
use crate::validator::MetricsValidator;

/// One unit (or a whole timeframe) that produced no result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitFailure {
    pub timeframe: Timeframe,
    /// `None` when the timeframe's prices could not be loaded.
    pub factor: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExplorationReport {
    /// Validated results sorted by (timeframe, factor_name).
    pub results: Vec<FactorResult>,
    pub failures: Vec<UnitFailure>,
    /// Prices that loaded, for reuse by the combination search.
    pub prices: BTreeMap<Timeframe, PriceSeries>,
}

impl ExplorationReport {
    pub fn units_attempted(&self) -> usize {
        self.results.len() + self.failures.iter().filter(|f| f.factor.is_some()).count()
    }
}

/// Evaluate every factor on every timeframe for `symbol`.
pub fn explore_factors(
    symbol: &str,
    timeframes: &[Timeframe],
    factors: &[String],
    provider: &dyn PriceProvider,
    registry: &dyn FactorRegistry,
    engine: &BacktestEngine,
    validator: &MetricsValidator,
) -> ExplorationReport {
    let mut report = ExplorationReport::default();

    for &timeframe in timeframes {
        match provider.load(symbol, timeframe) {
            Ok(series) => {
                report.prices.insert(timeframe, series);
            }
            Err(e) => {
                warn!(symbol, timeframe = %timeframe, error = %e, "price load failed");
                report.failures.push(UnitFailure {
                    timeframe,
                    factor: None,
                    error: e.to_string(),
                });
            }
        }
    }

    let units: Vec<(&PriceSeries, &str)> = report
        .prices
        .values()
        .flat_map(|series| factors.iter().map(move |f| (series, f.as_str())))
        .collect();
    let total = units.len();
    info!(
        symbol,
        provider = provider.name(),
        timeframes = report.prices.len(),
        factors = factors.len(),
        units = total,
        "exploring factors"
    );

    let done = AtomicUsize::new(0);
    let outcomes: Vec<Result<FactorResult, UnitFailure>> = units
        .par_iter()
        .map(|&(series, factor)| {
            let outcome = registry
                .compute(factor, series)
                .and_then(|signal| engine.evaluate(series, &signal))
                .map(|result| validator.validate(result))
                .map_err(|e| UnitFailure {
                    timeframe: series.timeframe(),
                    factor: Some(factor.to_string()),
                    error: e.to_string(),
                });
            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            if finished % 50 == 0 || finished == total {
                info!(finished, total, "exploration progress");
            }
            outcome
        })
        .collect();

    for outcome in outcomes {
        match outcome {
            Ok(result) => report.results.push(result),
            Err(failure) => {
                warn!(
                    timeframe = %failure.timeframe,
                    factor = failure.factor.as_deref().unwrap_or(""),
                    error = %failure.error,
                    "factor unit failed"
                );
                report.failures.push(failure);
            }
        }
    }

    report
        .results
        .sort_by(|a, b| (a.timeframe, &a.factor_name).cmp(&(b.timeframe, &b.factor_name)));
    report
        .failures
        .sort_by(|a, b| (a.timeframe, &a.factor).cmp(&(b.timeframe, &b.factor)));
    info!(
        results = report.results.len(),
        failures = report.failures.len(),
        "exploration finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::{LoadError, SyntheticPriceProvider};
    use factorlab_core::factors::BuiltinFactors;

    struct MissingHourly(SyntheticPriceProvider);

    impl PriceProvider for MissingHourly {
        fn load(&self, symbol: &str, timeframe: Timeframe) -> Result<PriceSeries, LoadError> {
            if timeframe.to_string() == "1h" {
                return Err(LoadError::Empty {
                    symbol: symbol.to_string(),
                    timeframe,
                });
            }
            self.0.load(symbol, timeframe)
        }

        fn name(&self) -> &str {
            "missing-hourly"
        }
    }

    fn tfs(list: &[&str]) -> Vec<Timeframe> {
        list.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn results_are_sorted_and_complete() {
        let registry = BuiltinFactors::new();
        let factors = registry.names();
        let report = explore_factors(
            "0700.HK",
            &tfs(&["15m", "5m"]),
            &factors,
            &SyntheticPriceProvider::new(20),
            &registry,
            &BacktestEngine::default(),
            &MetricsValidator::default(),
        );
        assert!(report.failures.is_empty());
        assert_eq!(report.results.len(), 2 * factors.len());
        assert_eq!(report.results[0].timeframe.to_string(), "5m");
        let keys: Vec<_> = report
            .results
            .iter()
            .map(|r| (r.timeframe, r.factor_name.clone()))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert!(report
            .results
            .iter()
            .all(|r| r.validation_status != factorlab_core::ValidationStatus::Unchecked));
    }

    #[test]
    fn unknown_factor_fails_only_its_units() {
        let registry = BuiltinFactors::new();
        let factors = vec!["roc_10".to_string(), "no_such_factor".to_string()];
        let report = explore_factors(
            "X",
            &tfs(&["5m", "15m"]),
            &factors,
            &SyntheticPriceProvider::new(10),
            &registry,
            &BacktestEngine::default(),
            &MetricsValidator::default(),
        );
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.failures.len(), 2);
        assert!(report
            .failures
            .iter()
            .all(|f| f.factor.as_deref() == Some("no_such_factor")));
        assert_eq!(report.units_attempted(), 4);
    }

    #[test]
    fn failed_load_skips_that_timeframe() {
        let registry = BuiltinFactors::new();
        let factors = vec!["roc_10".to_string()];
        let report = explore_factors(
            "X",
            &tfs(&["5m", "1h"]),
            &factors,
            &MissingHourly(SyntheticPriceProvider::new(10)),
            &registry,
            &BacktestEngine::default(),
            &MetricsValidator::default(),
        );
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].factor.is_none());
        assert!(!report.prices.contains_key(&"1h".parse().unwrap()));
    }
}
