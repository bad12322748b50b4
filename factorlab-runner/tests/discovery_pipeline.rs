//! End-to-end discovery: synthetic prices → exploration → combination search
//! → JSONL store.

use std::sync::Arc;

use factorlab_core::factors::BuiltinFactors;
use factorlab_core::ValidationStatus;
use factorlab_runner::{
    run_discovery, ConfigError, DataSourceConfig, DiscoveryConfig, DiscoveryError, JsonlStore,
    ResultRepository, SyntheticPriceProvider,
};

fn config() -> DiscoveryConfig {
    let mut config = DiscoveryConfig::default();
    config.timeframes = ["5m", "15m", "1h"].iter().map(|s| s.parse().unwrap()).collect();
    config.combiner.top_n = 4;
    config.combiner.min_sharpe = -1000.0;
    config.combiner.max_combinations = Some(10);
    config.data = DataSourceConfig::Synthetic { days: 15 };
    config
}

#[test]
fn full_run_persists_paired_ranked_strategies() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config();
    let store = JsonlStore::new(tmp.path(), config.run_id().unwrap());

    let outcome = run_discovery(
        &config,
        &SyntheticPriceProvider::new(15),
        Arc::new(BuiltinFactors::new()),
        Some(&store as &dyn ResultRepository),
    )
    .unwrap();

    // Exploration covers every (timeframe, factor) unit
    assert!(outcome.unit_failures().is_empty());
    assert_eq!(outcome.exploration.results.len(), 3 * 5);
    assert!(outcome
        .exploration
        .results
        .iter()
        .all(|r| r.validation_status != ValidationStatus::Unchecked));

    // C(4,2) + C(4,3) combinations, all kept at this threshold
    let discovery = &outcome.discovery;
    assert_eq!(discovery.selected.len(), 4);
    assert_eq!(discovery.combinations_tested, 10);
    assert!(discovery.failures.is_empty());
    assert_eq!(discovery.strategies.len(), 10);
    for s in &discovery.strategies {
        assert!((2..=3).contains(&s.factors().len()));
        assert_eq!(s.factors().len(), s.timeframes().len());
        assert_ne!(s.validation_status, ValidationStatus::Unchecked);
    }
    for pair in discovery.strategies.windows(2) {
        assert!(pair[0].sharpe_ratio >= pair[1].sharpe_ratio);
    }

    // Both result sets are on disk under this run's id
    let factors = store.load_factor_results().unwrap();
    assert_eq!(factors.len(), 15);
    assert!(factors.iter().all(|r| r.run_id == outcome.run_id.0));
    let strategies = store.load_strategy_results().unwrap();
    assert_eq!(strategies.len(), discovery.strategies.len());
    for (stored, kept) in strategies.iter().zip(&discovery.strategies) {
        assert_eq!(stored.result.strategy_name, kept.strategy_name);
        assert_eq!(stored.result.timeframes(), kept.timeframes());
        assert!((stored.result.sharpe_ratio - kept.sharpe_ratio).abs() < 1e-9);
    }
}

#[test]
fn repeated_runs_are_identical() {
    let config = config();
    let run = || {
        run_discovery(
            &config,
            &SyntheticPriceProvider::new(15),
            Arc::new(BuiltinFactors::new()),
            None,
        )
        .unwrap()
    };
    let first = run();
    let second = run();
    assert_eq!(first.run_id, second.run_id);
    assert_eq!(first.exploration.results, second.exploration.results);
    assert_eq!(first.discovery.strategies, second.discovery.strategies);
}

#[test]
fn malformed_config_aborts_before_any_work() {
    let mut config = config();
    config.combiner.top_n = 0;
    let err = run_discovery(
        &config,
        &SyntheticPriceProvider::new(15),
        Arc::new(BuiltinFactors::new()),
        None,
    )
    .unwrap_err();
    assert!(matches!(err, DiscoveryError::Config(ConfigError::InvalidTopN(0))));
}

#[test]
fn unregistered_factor_is_a_config_error() {
    let mut config = config();
    config.factors = vec!["roc_10".to_string(), "moon_phase".to_string()];
    let err = run_discovery(
        &config,
        &SyntheticPriceProvider::new(15),
        Arc::new(BuiltinFactors::new()),
        None,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        DiscoveryError::Config(ConfigError::Invalid { field: "factors", .. })
    ));
}
