//! FactorLab Runner — judgement and orchestration on top of `factorlab-core`.
//!
//! This crate provides:
//! - Metrics validation (hard bounds, advisory limits, cross-metric checks)
//! - Factor ranking and bounded combination generation
//! - Multi-factor, multi-timeframe combination backtests
//! - Parallel single-factor exploration and the end-to-end discovery run
//! - Price providers (CSV files, seeded synthetic walk)
//! - TOML configuration and JSONL/CSV result storage

pub mod combinations;
pub mod combiner;
pub mod config;
pub mod data_loader;
pub mod discovery;
pub mod explorer;
pub mod ranker;
pub mod store;
pub mod validator;

pub use combinations::{combination_count, generate_combinations, Combination};
pub use combiner::{
    rank_strategies, CombinationBacktester, CombinationError, CompositeRule, MajorityVote,
    SignalComposer, ZScoreAverage,
};
pub use config::{CombinerConfig, ConfigError, DataSourceConfig, DiscoveryConfig, OutputConfig};
pub use data_loader::{CsvPriceProvider, LoadError, PriceProvider, SyntheticPriceProvider};
pub use discovery::{
    build_engine, discover_strategies, provider_for, resolve_factors, run_discovery,
    CombinationFailure, DiscoveryError, DiscoveryReport, RunOutcome,
};
pub use explorer::{explore_factors, ExplorationReport, UnitFailure};
pub use ranker::FactorRanker;
pub use store::{export_strategies_csv, JsonlStore, ResultRepository, StoreError, StoredRecord};
pub use validator::{MetricRule, MetricsValidator, ValidatorConfig};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn shared_pipeline_state_is_send_sync() {
        assert_send::<CombinationBacktester>();
        assert_sync::<CombinationBacktester>();
        assert_send::<MetricsValidator>();
        assert_sync::<MetricsValidator>();
        assert_send::<Combination>();
        assert_sync::<Combination>();
        assert_sync::<Box<dyn PriceProvider>>();
        assert_sync::<Box<dyn SignalComposer>>();
    }

    #[test]
    fn results_are_send() {
        assert_send::<DiscoveryReport>();
        assert_send::<ExplorationReport>();
        assert_send::<UnitFailure>();
    }
}
