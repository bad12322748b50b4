//! Result records handed across the persistence boundary.
//!
//! `FactorResult` and `StrategyResult` are produced once and superseded, never
//! patched: the engine fills the metrics and diagnostics, the validator appends
//! violations, and nothing else touches them. Every list field serializes as an
//! ordered JSON array.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::timeframe::Timeframe;
use crate::error::StructuralError;

/// Metric bundle computed by the backtest engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorMetrics {
    pub sharpe_ratio: f64,
    pub stability: f64,
    pub trades_count: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub max_drawdown: f64,
    pub information_coefficient: f64,
}

impl FactorMetrics {
    /// The "could not evaluate" sentinel.
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Outcome of post-hoc validation, ordered by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    #[default]
    Unchecked,
    Valid,
    /// Advisory, cross-metric or structural notes were recorded.
    Warning,
    /// At least one hard bound was breached: the computation itself is suspect.
    Corrupt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorResult {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub factor_name: String,
    pub sharpe_ratio: f64,
    pub stability: f64,
    pub trades_count: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub max_drawdown: f64,
    pub information_coefficient: f64,
    #[serde(default)]
    pub diagnostics: Vec<String>,
    #[serde(default)]
    pub validation_violations: Vec<String>,
    #[serde(default)]
    pub validation_status: ValidationStatus,
}

impl FactorResult {
    pub fn new(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        factor_name: impl Into<String>,
        metrics: &FactorMetrics,
        diagnostics: Vec<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            factor_name: factor_name.into(),
            sharpe_ratio: metrics.sharpe_ratio,
            stability: metrics.stability,
            trades_count: metrics.trades_count,
            win_rate: metrics.win_rate,
            profit_factor: metrics.profit_factor,
            max_drawdown: metrics.max_drawdown,
            information_coefficient: metrics.information_coefficient,
            diagnostics,
            validation_violations: Vec::new(),
            validation_status: ValidationStatus::Unchecked,
        }
    }

    pub fn metrics(&self) -> FactorMetrics {
        FactorMetrics {
            sharpe_ratio: self.sharpe_ratio,
            stability: self.stability,
            trades_count: self.trades_count,
            win_rate: self.win_rate,
            profit_factor: self.profit_factor,
            max_drawdown: self.max_drawdown,
            information_coefficient: self.information_coefficient,
        }
    }

    pub fn leg(&self) -> FactorLeg {
        FactorLeg::new(self.factor_name.clone(), self.timeframe)
    }

    pub fn has_diagnostic(&self, diagnostic: &str) -> bool {
        self.diagnostics.iter().any(|d| d == diagnostic)
    }
}

/// One member of a combination: a factor evaluated on a specific timeframe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FactorLeg {
    pub factor_name: String,
    pub timeframe: Timeframe,
}

impl FactorLeg {
    pub fn new(factor_name: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            factor_name: factor_name.into(),
            timeframe,
        }
    }
}

impl fmt::Display for FactorLeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.factor_name, self.timeframe)
    }
}

/// Canonical strategy name for a list of legs: `rsi@1m+roc@1h`.
pub fn strategy_name(legs: &[FactorLeg]) -> String {
    legs.iter()
        .map(|leg| leg.to_string())
        .collect::<Vec<_>>()
        .join("+")
}

/// Multi-factor strategy metrics with per-factor timeframe provenance.
///
/// `factors` and `timeframes` are positionally paired. They are private so the
/// only way to build one is from a list of `FactorLeg`s; records read back from
/// storage are re-checked by the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyResult {
    pub symbol: String,
    pub strategy_name: String,
    factors: Vec<String>,
    timeframes: Vec<Timeframe>,
    pub sharpe_ratio: f64,
    pub stability: f64,
    pub trades_count: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub max_drawdown: f64,
    pub average_information_coefficient: f64,
    #[serde(default)]
    pub diagnostics: Vec<String>,
    #[serde(default)]
    pub validation_violations: Vec<String>,
    #[serde(default)]
    pub validation_status: ValidationStatus,
}

impl StrategyResult {
    /// Build a strategy record. `metrics.information_coefficient` is ignored in
    /// favour of `average_information_coefficient`.
    pub fn new(
        symbol: impl Into<String>,
        legs: &[FactorLeg],
        metrics: &FactorMetrics,
        average_information_coefficient: f64,
        diagnostics: Vec<String>,
    ) -> Result<Self, StructuralError> {
        if !(2..=3).contains(&legs.len()) {
            return Err(StructuralError::InvalidCombinationSize(legs.len()));
        }
        Ok(Self {
            symbol: symbol.into(),
            strategy_name: strategy_name(legs),
            factors: legs.iter().map(|l| l.factor_name.clone()).collect(),
            timeframes: legs.iter().map(|l| l.timeframe).collect(),
            sharpe_ratio: metrics.sharpe_ratio,
            stability: metrics.stability,
            trades_count: metrics.trades_count,
            win_rate: metrics.win_rate,
            profit_factor: metrics.profit_factor,
            max_drawdown: metrics.max_drawdown,
            average_information_coefficient,
            diagnostics,
            validation_violations: Vec::new(),
            validation_status: ValidationStatus::Unchecked,
        })
    }

    pub fn factors(&self) -> &[String] {
        &self.factors
    }

    pub fn timeframes(&self) -> &[Timeframe] {
        &self.timeframes
    }

    /// The paired legs, or `None` if a deserialized record has mismatched lists.
    pub fn legs(&self) -> Option<Vec<FactorLeg>> {
        if self.factors.len() != self.timeframes.len() {
            return None;
        }
        Some(
            self.factors
                .iter()
                .zip(&self.timeframes)
                .map(|(f, tf)| FactorLeg::new(f.clone(), *tf))
                .collect(),
        )
    }

    pub fn metrics(&self) -> FactorMetrics {
        FactorMetrics {
            sharpe_ratio: self.sharpe_ratio,
            stability: self.stability,
            trades_count: self.trades_count,
            win_rate: self.win_rate,
            profit_factor: self.profit_factor,
            max_drawdown: self.max_drawdown,
            information_coefficient: self.average_information_coefficient,
        }
    }

    pub fn has_diagnostic(&self, diagnostic: &str) -> bool {
        self.diagnostics.iter().any(|d| d == diagnostic)
    }
}
