//! Backtest engine — vectorised single-factor evaluation.
//!
//! One pass over a price series and its aligned signal:
//!
//! 1. Signal → exposure (`positions`), decided at the close of bar t.
//! 2. Per-bar returns with a mandatory one-bar lag, net of leg costs.
//! 3. Equity curve and round-trip trades (`trade_extraction`).
//! 4. Metrics (`crate::metrics`) and low-confidence tags (`diagnostics`).
//!
//! The engine computes; it never judges. Metric bounds are the validator's job.

pub mod diagnostics;
pub mod positions;
pub mod trade_extraction;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use diagnostics::{assess, Diagnostic};
pub use positions::{direction, exposures};
pub use trade_extraction::{extract_trades, LegCosts};

use crate::costs::{TradingCostModel, ZeroCost};
use crate::domain::{FactorMetrics, FactorResult, PriceSeries, SignalSeries, Timeframe, Trade, TradeSide};
use crate::error::StructuralError;
use crate::metrics;

/// Thresholds and conventions for a backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Usable (non-NaN) signal bars required before anything is measured.
    pub min_data_points: usize,
    /// Fewer trades than this tags the result `insufficient_trades(<N)`.
    pub min_trades: usize,
    pub sharpe_alert_threshold: f64,
    /// Signal magnitude that must be exceeded to take a position.
    pub signal_threshold: f64,
    /// Forward-return horizon in bars for the information coefficient.
    pub ic_horizon: usize,
    /// Annual risk-free rate subtracted from per-bar returns.
    pub risk_free_rate: f64,
    pub trading_days_per_year: f64,
    /// Length of one trading session, used to annualize intraday bars.
    pub session_minutes: u32,
    pub initial_capital: f64,
    /// Fraction of capital committed while a position is open.
    pub allocation_fraction: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_data_points: 20,
            min_trades: 5,
            sharpe_alert_threshold: 10.0,
            signal_threshold: 0.0,
            ic_horizon: 1,
            risk_free_rate: 0.0,
            trading_days_per_year: 252.0,
            session_minutes: 330,
            initial_capital: 100_000.0,
            allocation_fraction: 0.1,
        }
    }
}

impl EngineConfig {
    pub fn bars_per_year(&self, timeframe: Timeframe) -> f64 {
        timeframe.bars_per_year(self.trading_days_per_year, self.session_minutes)
    }
}

/// Everything one backtest produced. Series cover the evaluation window only,
/// which starts at the first usable signal bar.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestRun {
    pub metrics: FactorMetrics,
    pub diagnostics: Vec<Diagnostic>,
    pub returns: Vec<f64>,
    pub equity: Vec<f64>,
    pub timestamps: Vec<DateTime<Utc>>,
    pub trades: Vec<Trade>,
    pub initial_capital: f64,
    pub bars_per_year: f64,
}

impl BacktestRun {
    /// The "could not evaluate" outcome: zero metrics, empty series.
    pub fn insufficient(initial_capital: f64, bars_per_year: f64) -> Self {
        Self {
            metrics: FactorMetrics::zero(),
            diagnostics: vec![Diagnostic::InsufficientData],
            returns: Vec::new(),
            equity: Vec::new(),
            timestamps: Vec::new(),
            trades: Vec::new(),
            initial_capital,
            bars_per_year,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        self.diagnostics.contains(&Diagnostic::InsufficientData)
    }

    pub fn diagnostic_strings(&self) -> Vec<String> {
        self.diagnostics.iter().map(|d| d.to_string()).collect()
    }

    pub fn into_factor_result(
        self,
        symbol: impl Into<String>,
        timeframe: Timeframe,
        factor_name: impl Into<String>,
    ) -> FactorResult {
        let diagnostics = self.diagnostic_strings();
        FactorResult::new(symbol, timeframe, factor_name, &self.metrics, diagnostics)
    }
}

/// Stateless engine; cheap to clone and safe to share across threads.
#[derive(Clone)]
pub struct BacktestEngine {
    config: EngineConfig,
    cost_model: Arc<dyn TradingCostModel>,
}

impl std::fmt::Debug for BacktestEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BacktestEngine")
            .field("config", &self.config)
            .field("cost_model", &self.cost_model.name())
            .finish()
    }
}

impl Default for BacktestEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default(), Arc::new(ZeroCost))
    }
}

impl BacktestEngine {
    pub fn new(config: EngineConfig, cost_model: Arc<dyn TradingCostModel>) -> Self {
        Self { config, cost_model }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cost_model(&self) -> &dyn TradingCostModel {
        self.cost_model.as_ref()
    }

    /// Backtest with the configured capital and allocation and package the
    /// outcome as a `FactorResult`.
    pub fn evaluate(
        &self,
        prices: &PriceSeries,
        signal: &SignalSeries,
    ) -> Result<FactorResult, StructuralError> {
        let run = self.backtest(
            prices,
            signal,
            self.config.initial_capital,
            self.config.allocation_fraction,
        )?;
        Ok(run.into_factor_result(prices.symbol(), prices.timeframe(), signal.name.clone()))
    }

    pub fn backtest(
        &self,
        prices: &PriceSeries,
        signal: &SignalSeries,
        initial_capital: f64,
        allocation_fraction: f64,
    ) -> Result<BacktestRun, StructuralError> {
        if prices.len() != signal.len() {
            return Err(StructuralError::LengthMismatch {
                prices: prices.len(),
                signal: signal.len(),
            });
        }
        if !initial_capital.is_finite() || initial_capital <= 0.0 {
            return Err(StructuralError::InvalidCapital(initial_capital));
        }
        if !(allocation_fraction > 0.0 && allocation_fraction <= 1.0) {
            return Err(StructuralError::InvalidAllocation(allocation_fraction));
        }

        let bars_per_year = self.config.bars_per_year(prices.timeframe());
        let start = match signal.first_usable() {
            Some(start) if signal.usable_len() >= self.config.min_data_points => start,
            _ => return Ok(BacktestRun::insufficient(initial_capital, bars_per_year)),
        };

        let closes = prices.closes();
        let n = closes.len();
        let exposure = exposures(&signal.values, self.config.signal_threshold, allocation_fraction);

        // ── Returns and equity over the evaluation window ──
        let mut costs = vec![LegCosts::default(); n];
        let mut returns = Vec::with_capacity(n - start);
        let mut equity = Vec::with_capacity(n - start);
        let mut eq = initial_capital;
        for t in start..n {
            let prev = if t == start { 0.0 } else { exposure[t - 1] };
            costs[t] = self.leg_costs(prev, exposure[t], closes[t], initial_capital);
            let price_return = if t == start { 0.0 } else { closes[t] / closes[t - 1] - 1.0 };
            let r = prev * price_return - costs[t].total() / initial_capital;
            eq *= 1.0 + r;
            returns.push(r);
            equity.push(eq);
        }

        let trades = extract_trades(&exposure, &closes, &costs, start, initial_capital);

        let mut m = metrics::summarize(
            &returns,
            &equity,
            &trades,
            initial_capital,
            bars_per_year,
            self.config.risk_free_rate,
        );
        m.information_coefficient =
            metrics::information_coefficient(&signal.values, &closes, self.config.ic_horizon);
        let diagnostics = assess(&self.config, &m, &trades);

        Ok(BacktestRun {
            metrics: m,
            diagnostics,
            returns,
            equity,
            timestamps: prices.timestamps()[start..].to_vec(),
            trades,
            initial_capital,
            bars_per_year,
        })
    }

    /// Cost of moving from exposure `prev` to `cur` at `price`.
    fn leg_costs(&self, prev: f64, cur: f64, price: f64, initial_capital: f64) -> LegCosts {
        if prev == cur {
            return LegCosts::default();
        }
        let mut legs = LegCosts::default();
        if prev != 0.0 {
            let side = if prev > 0.0 { TradeSide::Long } else { TradeSide::Short };
            legs.close = self
                .cost_model
                .cost(side.exit_order(), price, prev.abs() * initial_capital);
        }
        if cur != 0.0 {
            let side = if cur > 0.0 { TradeSide::Long } else { TradeSide::Short };
            legs.open = self
                .cost_model
                .cost(side.entry_order(), price, cur.abs() * initial_capital);
        }
        legs
    }
}
