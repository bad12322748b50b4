//! Factor ranker — picks the candidates worth combining.
//!
//! Score = average rank of Sharpe (descending) + average rank of |IC|
//! (descending); lower is better. Ties fall through a fixed chain of keys so
//! the output never depends on input order.

use std::cmp::Ordering;
use std::collections::HashSet;

use factorlab_core::domain::FactorResult;
use factorlab_core::engine::Diagnostic;
use factorlab_core::stats::average_ranks;

use crate::config::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorRanker {
    pub min_sharpe: f64,
    pub min_information_coefficient: f64,
}

impl Default for FactorRanker {
    fn default() -> Self {
        Self {
            min_sharpe: 0.0,
            min_information_coefficient: 0.0,
        }
    }
}

impl FactorRanker {
    pub fn new(min_sharpe: f64, min_information_coefficient: f64) -> Self {
        Self {
            min_sharpe,
            min_information_coefficient,
        }
    }

    /// Best `top_n` results, at most one per `(factor_name, timeframe)`.
    pub fn select_top_factors(
        &self,
        results: &[FactorResult],
        top_n: usize,
    ) -> Result<Vec<FactorResult>, ConfigError> {
        if top_n == 0 {
            return Err(ConfigError::InvalidTopN(top_n));
        }
        let insufficient = Diagnostic::InsufficientData.to_string();
        let eligible: Vec<&FactorResult> = results
            .iter()
            .filter(|r| !r.has_diagnostic(&insufficient))
            .filter(|r| r.sharpe_ratio >= self.min_sharpe)
            .filter(|r| r.information_coefficient.abs() >= self.min_information_coefficient)
            .collect();

        let sharpe_ranks = descending_ranks(eligible.iter().map(|r| r.sharpe_ratio));
        let ic_ranks = descending_ranks(eligible.iter().map(|r| r.information_coefficient.abs()));

        let mut scored: Vec<(f64, &FactorResult)> = eligible
            .iter()
            .enumerate()
            .map(|(i, r)| (sharpe_ranks[i] + ic_ranks[i], *r))
            .collect();
        scored.sort_by(|(sa, a), (sb, b)| sa.total_cmp(sb).then_with(|| tie_break(a, b)));

        let mut seen = HashSet::new();
        Ok(scored
            .into_iter()
            .filter(|(_, r)| seen.insert((r.factor_name.clone(), r.timeframe)))
            .take(top_n)
            .map(|(_, r)| r.clone())
            .collect())
    }
}

/// Rank 1 = largest. Non-finite values rank last.
fn descending_ranks(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let keys: Vec<f64> = values
        .map(|v| if v.is_finite() { -v } else { f64::INFINITY })
        .collect();
    average_ranks(&keys)
}

/// Compares every field, so only identical records tie.
fn tie_break(a: &FactorResult, b: &FactorResult) -> Ordering {
    b.stability
        .total_cmp(&a.stability)
        .then_with(|| a.factor_name.cmp(&b.factor_name))
        .then_with(|| a.timeframe.cmp(&b.timeframe))
        .then_with(|| a.symbol.cmp(&b.symbol))
        .then_with(|| b.sharpe_ratio.total_cmp(&a.sharpe_ratio))
        .then_with(|| b.information_coefficient.total_cmp(&a.information_coefficient))
        .then_with(|| a.max_drawdown.total_cmp(&b.max_drawdown))
        .then_with(|| b.win_rate.total_cmp(&a.win_rate))
        .then_with(|| b.profit_factor.total_cmp(&a.profit_factor))
        .then_with(|| b.trades_count.cmp(&a.trades_count))
        .then_with(|| a.validation_status.cmp(&b.validation_status))
        .then_with(|| a.validation_violations.cmp(&b.validation_violations))
        .then_with(|| a.diagnostics.cmp(&b.diagnostics))
}
