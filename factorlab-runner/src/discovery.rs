//! Discovery pipeline: explore single factors, select the best, backtest their
//! combinations and rank the resulting strategies.
//!
//! Only a malformed configuration aborts a run. Units and combinations that
//! fail are collected next to the results.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use factorlab_core::domain::{FactorResult, PriceSeries, StrategyResult, Timeframe};
use factorlab_core::engine::BacktestEngine;
use factorlab_core::factors::FactorRegistry;
use factorlab_core::fingerprint::RunId;

use crate::combinations::{combination_count, generate_combinations};
use crate::combiner::{rank_strategies, CombinationBacktester};
use crate::config::{CombinerConfig, ConfigError, DataSourceConfig, DiscoveryConfig};
use crate::data_loader::{CsvPriceProvider, PriceProvider, SyntheticPriceProvider};
use crate::explorer::{explore_factors, ExplorationReport, UnitFailure};
use crate::ranker::FactorRanker;
use crate::store::{ResultRepository, StoreError};
use crate::validator::MetricsValidator;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A combination that could not be backtested.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinationFailure {
    pub strategy_name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    /// Factors carried into the combination search, best first.
    pub selected: Vec<FactorResult>,
    pub combinations_tested: usize,
    /// Validated strategies that cleared `min_sharpe`, best first.
    pub strategies: Vec<StrategyResult>,
    pub failures: Vec<CombinationFailure>,
}

/// Select → generate → backtest (parallel) → validate → filter → rank.
pub fn discover_strategies(
    results: &[FactorResult],
    prices_by_timeframe: &BTreeMap<Timeframe, PriceSeries>,
    config: &CombinerConfig,
    backtester: &CombinationBacktester,
    validator: &MetricsValidator,
) -> Result<DiscoveryReport, ConfigError> {
    let ranker = FactorRanker::new(config.min_sharpe, config.min_information_coefficient);
    let selected = ranker.select_top_factors(results, config.top_n)?;
    let combos = generate_combinations(
        &selected,
        config.min_combination_size,
        config.max_combination_size,
        config.max_combinations,
    )?;
    let possible = combination_count(
        selected.len(),
        config.min_combination_size,
        config.max_combination_size,
    );
    info!(
        selected = selected.len(),
        possible = %possible,
        testing = combos.len(),
        composer = backtester.composer_name(),
        "searching combinations"
    );

    let total = combos.len();
    let done = AtomicUsize::new(0);
    let outcomes: Vec<Result<StrategyResult, CombinationFailure>> = combos
        .par_iter()
        .map(|combo| {
            let outcome = backtester
                .backtest_combination(combo, prices_by_timeframe)
                .map(|s| validator.validate_strategy(s))
                .map_err(|e| CombinationFailure {
                    strategy_name: factorlab_core::domain::strategy_name(&combo.legs()),
                    error: e.to_string(),
                });
            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            if finished % 100 == 0 || finished == total {
                info!(finished, total, "combination progress");
            }
            outcome
        })
        .collect();

    let mut strategies = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(s) if s.sharpe_ratio >= config.min_sharpe => strategies.push(s),
            Ok(_) => {}
            Err(failure) => {
                warn!(strategy = %failure.strategy_name, error = %failure.error, "combination failed");
                failures.push(failure);
            }
        }
    }
    failures.sort_by(|a, b| a.strategy_name.cmp(&b.strategy_name));

    let strategies = rank_strategies(strategies);
    info!(
        kept = strategies.len(),
        failed = failures.len(),
        "combination search finished"
    );
    Ok(DiscoveryReport {
        selected,
        combinations_tested: total,
        strategies,
        failures,
    })
}

/// The provider a configuration asks for.
pub fn provider_for(data: &DataSourceConfig) -> Box<dyn PriceProvider> {
    match data {
        DataSourceConfig::Csv { dir } => Box::new(CsvPriceProvider::new(dir.clone())),
        DataSourceConfig::Synthetic { days } => Box::new(SyntheticPriceProvider::new(*days)),
    }
}

/// Everything one end-to-end run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub exploration: ExplorationReport,
    pub discovery: DiscoveryReport,
}

impl RunOutcome {
    pub fn unit_failures(&self) -> &[UnitFailure] {
        &self.exploration.failures
    }
}

/// Factor names to explore: the configured list, or every registered factor.
pub fn resolve_factors(
    config: &DiscoveryConfig,
    registry: &dyn FactorRegistry,
) -> Result<Vec<String>, ConfigError> {
    if config.factors.is_empty() {
        return Ok(registry.names());
    }
    let unknown: Vec<&str> = config
        .factors
        .iter()
        .filter(|f| !registry.contains(f))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(ConfigError::Invalid {
            field: "factors",
            reason: format!("not registered: {}", unknown.join(", ")),
        });
    }
    Ok(config.factors.clone())
}

/// Engine with the configured thresholds and cost model.
pub fn build_engine(config: &DiscoveryConfig) -> BacktestEngine {
    BacktestEngine::new(config.engine.clone(), Arc::from(config.costs.build()))
}

/// Validate, explore, search combinations and persist both result sets.
pub fn run_discovery(
    config: &DiscoveryConfig,
    provider: &dyn PriceProvider,
    registry: Arc<dyn FactorRegistry>,
    repository: Option<&dyn ResultRepository>,
) -> Result<RunOutcome, DiscoveryError> {
    config.validate()?;
    let run_id = config.run_id()?;
    let factors = resolve_factors(config, registry.as_ref())?;
    info!(run_id = run_id.short(), symbol = %config.symbol, "starting discovery run");

    let engine = build_engine(config);
    let validator = MetricsValidator::new(config.validator.clone());
    let exploration = explore_factors(
        &config.symbol,
        &config.timeframes,
        &factors,
        provider,
        registry.as_ref(),
        &engine,
        &validator,
    );

    let backtester = CombinationBacktester::new(
        engine,
        Arc::clone(&registry),
        config.combiner.composite_rule.build(),
    );
    let discovery = discover_strategies(
        &exploration.results,
        &exploration.prices,
        &config.combiner,
        &backtester,
        &validator,
    )?;

    if let Some(repo) = repository {
        let factors_saved = repo.save_factor_results(&exploration.results)?;
        let strategies_saved = repo.save_strategy_results(&discovery.strategies)?;
        info!(factors_saved, strategies_saved, "results persisted");
    }

    Ok(RunOutcome {
        run_id,
        exploration,
        discovery,
    })
}
