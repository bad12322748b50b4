//! Metrics validator — judges results the engine produced.
//!
//! The engine computes, this module judges. One generic routine walks a typed
//! table of per-metric rules:
//!
//! - **hard** bounds: a value outside them means the computation is suspect.
//!   Non-finite values are reset to 0, out-of-range values are clamped, and the
//!   result is marked `corrupt`.
//! - **advisory** thresholds: plausible but unusual values. Recorded only.
//! - **cross-metric** checks: combinations that cannot both be true. Recorded only.
//! - **structure** checks (strategies): leg count and factor/timeframe pairing.
//!
//! Violations are prefixed with their severity, appended without duplicates,
//! and never removed, so validating a result twice changes nothing.

use serde::{Deserialize, Serialize};
use tracing::warn;

use factorlab_core::domain::{strategy_name, FactorResult, StrategyResult, ValidationStatus};

pub const HARD: &str = "hard:";
pub const ADVISORY: &str = "advisory:";
pub const CROSS_METRIC: &str = "cross_metric:";
pub const STRUCTURE: &str = "structure:";

/// Metrics the validator knows rules for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    SharpeRatio,
    Stability,
    WinRate,
    ProfitFactor,
    MaxDrawdown,
    InformationCoefficient,
    AverageInformationCoefficient,
}

impl MetricKind {
    /// Field name as it appears on the result record.
    pub fn field(self) -> &'static str {
        match self {
            Self::SharpeRatio => "sharpe_ratio",
            Self::Stability => "stability",
            Self::WinRate => "win_rate",
            Self::ProfitFactor => "profit_factor",
            Self::MaxDrawdown => "max_drawdown",
            Self::InformationCoefficient => "information_coefficient",
            Self::AverageInformationCoefficient => "average_information_coefficient",
        }
    }
}

/// Bounds for one metric. `advisory` is compared against the absolute value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricRule {
    pub hard_min: f64,
    pub hard_max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advisory: Option<f64>,
}

impl MetricRule {
    pub const fn new(hard_min: f64, hard_max: f64, advisory: Option<f64>) -> Self {
        Self {
            hard_min,
            hard_max,
            advisory,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub sharpe_ratio: MetricRule,
    pub stability: MetricRule,
    pub win_rate: MetricRule,
    pub profit_factor: MetricRule,
    pub max_drawdown: MetricRule,
    /// Applies to both the single-factor IC and the strategy average IC.
    pub information_coefficient: MetricRule,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            sharpe_ratio: MetricRule::new(-100.0, 100.0, Some(15.0)),
            stability: MetricRule::new(-1.0, 1.0, None),
            win_rate: MetricRule::new(0.0, 1.0, Some(0.9)),
            profit_factor: MetricRule::new(0.0, 500.0, Some(20.0)),
            max_drawdown: MetricRule::new(0.0, 1.0, None),
            information_coefficient: MetricRule::new(-1.0, 1.0, None),
        }
    }
}

impl ValidatorConfig {
    pub fn rule(&self, kind: MetricKind) -> &MetricRule {
        match kind {
            MetricKind::SharpeRatio => &self.sharpe_ratio,
            MetricKind::Stability => &self.stability,
            MetricKind::WinRate => &self.win_rate,
            MetricKind::ProfitFactor => &self.profit_factor,
            MetricKind::MaxDrawdown => &self.max_drawdown,
            MetricKind::InformationCoefficient | MetricKind::AverageInformationCoefficient => {
                &self.information_coefficient
            }
        }
    }

    /// Names of rules whose bounds are unusable.
    pub fn invalid_rules(&self) -> Vec<&'static str> {
        [
            MetricKind::SharpeRatio,
            MetricKind::Stability,
            MetricKind::WinRate,
            MetricKind::ProfitFactor,
            MetricKind::MaxDrawdown,
            MetricKind::InformationCoefficient,
        ]
        .into_iter()
        .filter(|&k| {
            let r = self.rule(k);
            !(r.hard_min.is_finite() && r.hard_max.is_finite() && r.hard_min <= r.hard_max)
        })
        .map(MetricKind::field)
        .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetricsValidator {
    config: ValidatorConfig,
}

impl MetricsValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn validate(&self, mut result: FactorResult) -> FactorResult {
        let mut found = Vec::new();
        for (kind, value) in [
            (MetricKind::SharpeRatio, &mut result.sharpe_ratio),
            (MetricKind::Stability, &mut result.stability),
            (MetricKind::WinRate, &mut result.win_rate),
            (MetricKind::ProfitFactor, &mut result.profit_factor),
            (MetricKind::MaxDrawdown, &mut result.max_drawdown),
            (MetricKind::InformationCoefficient, &mut result.information_coefficient),
        ] {
            self.check_metric(kind, value, &mut found);
        }
        cross_metric_checks(result.trades_count, result.win_rate, result.profit_factor, &mut found);

        log_hard(&found, &result.factor_name, &result.timeframe.to_string());
        merge(&mut result.validation_violations, found);
        result.validation_status = status_of(&result.validation_violations);
        result
    }

    pub fn validate_strategy(&self, mut result: StrategyResult) -> StrategyResult {
        let mut found = Vec::new();
        for (kind, value) in [
            (MetricKind::SharpeRatio, &mut result.sharpe_ratio),
            (MetricKind::Stability, &mut result.stability),
            (MetricKind::WinRate, &mut result.win_rate),
            (MetricKind::ProfitFactor, &mut result.profit_factor),
            (MetricKind::MaxDrawdown, &mut result.max_drawdown),
            (
                MetricKind::AverageInformationCoefficient,
                &mut result.average_information_coefficient,
            ),
        ] {
            self.check_metric(kind, value, &mut found);
        }
        cross_metric_checks(result.trades_count, result.win_rate, result.profit_factor, &mut found);
        structure_checks(&result, &mut found);

        log_hard(&found, &result.strategy_name, "strategy");
        merge(&mut result.validation_violations, found);
        result.validation_status = status_of(&result.validation_violations);
        result
    }

    /// The one routine every metric goes through.
    fn check_metric(&self, kind: MetricKind, value: &mut f64, found: &mut Vec<String>) {
        let rule = self.config.rule(kind);
        let field = kind.field();
        if !value.is_finite() {
            found.push(format!("{HARD}{field}={value} non-finite, reset to 0"));
            *value = 0.0;
            return;
        }
        if *value < rule.hard_min || *value > rule.hard_max {
            let clamped = value.clamp(rule.hard_min, rule.hard_max);
            found.push(format!(
                "{HARD}{field}={value} outside [{}, {}], clamped to {clamped}",
                rule.hard_min, rule.hard_max
            ));
            *value = clamped;
        }
        if let Some(limit) = rule.advisory {
            if value.abs() > limit {
                found.push(format!("{ADVISORY}{field}={value} exceeds {limit}"));
            }
        }
    }
}

fn cross_metric_checks(trades_count: usize, win_rate: f64, profit_factor: f64, found: &mut Vec<String>) {
    if profit_factor > 1.0 && win_rate == 0.0 {
        found.push(format!("{CROSS_METRIC}profit_factor > 1 with win_rate = 0"));
    }
    if win_rate > 0.0 && trades_count == 0 {
        found.push(format!("{CROSS_METRIC}win_rate > 0 with trades_count = 0"));
    }
    if profit_factor > 0.0 && trades_count == 0 {
        found.push(format!("{CROSS_METRIC}profit_factor > 0 with trades_count = 0"));
    }
}

fn structure_checks(result: &StrategyResult, found: &mut Vec<String>) {
    let factors = result.factors().len();
    let timeframes = result.timeframes().len();
    if !(2..=3).contains(&factors) {
        found.push(format!("{STRUCTURE}leg_count={factors} not in [2, 3]"));
    }
    if factors != timeframes {
        found.push(format!(
            "{STRUCTURE}factor_timeframe_count_mismatch({factors} vs {timeframes})"
        ));
    }
    if let Some(legs) = result.legs() {
        let expected = strategy_name(&legs);
        if expected != result.strategy_name {
            found.push(format!(
                "{STRUCTURE}strategy_name_mismatch(expected {expected}, got {})",
                result.strategy_name
            ));
        }
    }
}

fn merge(existing: &mut Vec<String>, found: Vec<String>) {
    for v in found {
        if !existing.contains(&v) {
            existing.push(v);
        }
    }
}

fn status_of(violations: &[String]) -> ValidationStatus {
    if violations.iter().any(|v| v.starts_with(HARD)) {
        ValidationStatus::Corrupt
    } else if violations.is_empty() {
        ValidationStatus::Valid
    } else {
        ValidationStatus::Warning
    }
}

fn log_hard(found: &[String], subject: &str, scope: &str) {
    for v in found.iter().filter(|v| v.starts_with(HARD)) {
        warn!(subject, scope, violation = %v, "hard metric bound violated");
    }
}
