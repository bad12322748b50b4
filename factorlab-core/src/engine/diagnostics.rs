//! Low-confidence diagnostics attached to results.
//!
//! Diagnostics describe *how much to trust* a measurement. They never change
//! the measurement itself.

use std::fmt;

use crate::domain::{FactorMetrics, Trade};
use crate::metrics;

use super::EngineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic {
    /// Too few usable signal bars; metrics are the all-zero sentinel.
    InsufficientData,
    /// Fewer round trips than `min_trades`; metrics are real but noisy.
    InsufficientTrades { min_trades: usize },
    SharpeExceedsAlertThreshold,
    /// `profit_factor` holds the no-loss sentinel rather than a ratio.
    ProfitFactorNoLosingTrades,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientData => f.write_str("insufficient_data"),
            Self::InsufficientTrades { min_trades } => write!(f, "insufficient_trades(<{min_trades})"),
            Self::SharpeExceedsAlertThreshold => f.write_str("sharpe_exceeds_alert_threshold"),
            Self::ProfitFactorNoLosingTrades => f.write_str("profit_factor_no_losing_trades"),
        }
    }
}

impl From<Diagnostic> for String {
    fn from(d: Diagnostic) -> Self {
        d.to_string()
    }
}

/// Tag a computed metric bundle without touching it.
pub fn assess(config: &EngineConfig, metrics: &FactorMetrics, trades: &[Trade]) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    if metrics.trades_count < config.min_trades {
        out.push(Diagnostic::InsufficientTrades {
            min_trades: config.min_trades,
        });
    }
    if metrics.sharpe_ratio.abs() > config.sharpe_alert_threshold {
        out.push(Diagnostic::SharpeExceedsAlertThreshold);
    }
    if metrics::has_winners_without_losers(trades) {
        out.push(Diagnostic::ProfitFactorNoLosingTrades);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_strings_are_stable() {
        assert_eq!(Diagnostic::InsufficientData.to_string(), "insufficient_data");
        assert_eq!(
            Diagnostic::InsufficientTrades { min_trades: 5 }.to_string(),
            "insufficient_trades(<5)"
        );
        assert_eq!(
            Diagnostic::SharpeExceedsAlertThreshold.to_string(),
            "sharpe_exceeds_alert_threshold"
        );
    }

    #[test]
    fn assess_leaves_metrics_alone() {
        let config = EngineConfig::default();
        let m = FactorMetrics {
            sharpe_ratio: -12.0,
            trades_count: 3,
            ..FactorMetrics::zero()
        };
        let d = assess(&config, &m, &[]);
        assert_eq!(
            d,
            vec![
                Diagnostic::InsufficientTrades { min_trades: 5 },
                Diagnostic::SharpeExceedsAlertThreshold
            ]
        );
        assert_eq!(m.sharpe_ratio, -12.0);
    }
}
