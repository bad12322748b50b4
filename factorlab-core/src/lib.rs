//! FactorLab Core — domain types, cost models, the vectorised backtest engine
//! and metrics.
//!
//! This crate is pure computation:
//! - Domain types (bars, price/signal series, timeframes, trades, results)
//! - Trading cost models behind one trait
//! - Single-factor backtest: signal → position → returns → metrics
//! - Low-confidence diagnostics that never overwrite a measurement
//! - The factor registry boundary plus a small reference factor set
//! - BLAKE3 fingerprints for run and dataset identity

pub mod costs;
pub mod domain;
pub mod engine;
pub mod error;
pub mod factors;
pub mod fingerprint;
pub mod metrics;
pub mod stats;

pub use costs::{CostModelConfig, TradingCostModel};
pub use domain::{
    Bar, FactorLeg, FactorMetrics, FactorResult, PriceSeries, SignalSeries, StrategyResult,
    Timeframe, Trade, ValidationStatus,
};
pub use engine::{BacktestEngine, BacktestRun, Diagnostic, EngineConfig};
pub use error::StructuralError;
pub use factors::{BuiltinFactors, FactorRegistry};
