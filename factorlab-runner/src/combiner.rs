//! Combination backtester — turns a 2- or 3-factor combination into a
//! `StrategyResult`.
//!
//! Members are recomputed through the factor registry on their own
//! timeframe's prices. Members that share a timeframe are merged at the signal
//! level by a `SignalComposer` and backtested once; a member alone on its
//! timeframe keeps its raw signal. When members span several
//! timeframes each timeframe becomes an equal-capital sleeve; sleeve equity
//! curves are sampled on the coarsest sleeve's bar times over the window all
//! sleeves cover, rebased and averaged.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use factorlab_core::domain::{FactorLeg, FactorMetrics, PriceSeries, SignalSeries, StrategyResult, Timeframe, Trade};
use factorlab_core::engine::{assess, BacktestEngine, BacktestRun, Diagnostic};
use factorlab_core::factors::FactorRegistry;
use factorlab_core::metrics;
use factorlab_core::stats::mean;
use factorlab_core::StructuralError;

use crate::combinations::Combination;

#[derive(Debug, Error)]
pub enum CombinationError {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error("no price series loaded for timeframe {0}")]
    MissingPrices(Timeframe),
}

// ─── Signal composition ─────────────────────────────────────────────

/// Merges aligned member signals into one composite signal.
pub trait SignalComposer: Send + Sync {
    /// All inputs have the same length; NaN means "no opinion".
    fn compose(&self, signals: &[&[f64]]) -> Vec<f64>;

    fn name(&self) -> &str;
}

/// Each member z-scored against its own history up to and including the
/// current bar, then averaged over the members available on each bar.
///
/// The value at bar t never depends on anything after t.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZScoreAverage;

impl SignalComposer for ZScoreAverage {
    fn compose(&self, signals: &[&[f64]]) -> Vec<f64> {
        let n = signals.first().map_or(0, |s| s.len());
        let standardized: Vec<Vec<f64>> = signals.iter().map(|s| expanding_zscore(s)).collect();
        (0..n)
            .map(|t| {
                let available: Vec<f64> = standardized
                    .iter()
                    .map(|s| s[t])
                    .filter(|v| !v.is_nan())
                    .collect();
                if available.is_empty() {
                    f64::NAN
                } else {
                    mean(&available)
                }
            })
            .collect()
    }

    fn name(&self) -> &str {
        "z_score_average"
    }
}

/// Non-NaN observations a member needs before it is standardized.
pub const ZSCORE_MIN_HISTORY: usize = 2;

/// Expanding z-score (Welford running mean and sample variance) over the
/// non-NaN values seen so far. NaN until `ZSCORE_MIN_HISTORY` observations
/// exist; a member with no variance yet is neutral.
fn expanding_zscore(values: &[f64]) -> Vec<f64> {
    let mut count = 0usize;
    let mut running_mean = 0.0;
    let mut m2 = 0.0;
    values
        .iter()
        .map(|&v| {
            if v.is_nan() {
                return f64::NAN;
            }
            count += 1;
            let delta = v - running_mean;
            running_mean += delta / count as f64;
            m2 += delta * (v - running_mean);
            if count < ZSCORE_MIN_HISTORY {
                return f64::NAN;
            }
            let sd = (m2 / (count - 1) as f64).sqrt();
            if sd < 1e-15 {
                0.0
            } else {
                (v - running_mean) / sd
            }
        })
        .collect()
}

/// Sum of member signs; +1/-1 by majority, 0 on a tie.
#[derive(Debug, Clone, Copy, Default)]
pub struct MajorityVote;

impl SignalComposer for MajorityVote {
    fn compose(&self, signals: &[&[f64]]) -> Vec<f64> {
        let n = signals.first().map_or(0, |s| s.len());
        (0..n)
            .map(|t| {
                let mut votes = 0.0;
                let mut any = false;
                for s in signals {
                    let v = s[t];
                    if v.is_nan() {
                        continue;
                    }
                    any = true;
                    if v > 0.0 {
                        votes += 1.0;
                    } else if v < 0.0 {
                        votes -= 1.0;
                    }
                }
                if !any {
                    f64::NAN
                } else if votes > 0.0 {
                    1.0
                } else if votes < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            })
            .collect()
    }

    fn name(&self) -> &str {
        "majority_vote"
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeRule {
    #[default]
    ZScoreAverage,
    MajorityVote,
}

impl CompositeRule {
    pub fn build(self) -> Arc<dyn SignalComposer> {
        match self {
            Self::ZScoreAverage => Arc::new(ZScoreAverage),
            Self::MajorityVote => Arc::new(MajorityVote),
        }
    }
}

// ─── Backtester ─────────────────────────────────────────────────────

struct Sleeve {
    timeframe: Timeframe,
    prices: PriceSeries,
    run: BacktestRun,
}

#[derive(Clone)]
pub struct CombinationBacktester {
    engine: BacktestEngine,
    registry: Arc<dyn FactorRegistry>,
    composer: Arc<dyn SignalComposer>,
}

impl CombinationBacktester {
    pub fn new(
        engine: BacktestEngine,
        registry: Arc<dyn FactorRegistry>,
        composer: Arc<dyn SignalComposer>,
    ) -> Self {
        Self {
            engine,
            registry,
            composer,
        }
    }

    pub fn engine(&self) -> &BacktestEngine {
        &self.engine
    }

    pub fn composer_name(&self) -> &str {
        self.composer.name()
    }

    pub fn backtest_combination(
        &self,
        combo: &Combination,
        prices_by_timeframe: &BTreeMap<Timeframe, PriceSeries>,
    ) -> Result<StrategyResult, CombinationError> {
        let legs = combo.legs();
        if !(2..=3).contains(&legs.len()) {
            return Err(StructuralError::InvalidCombinationSize(legs.len()).into());
        }
        let symbol = combo.members[0].symbol.clone();
        let average_ic = combo.average_information_coefficient();

        // Group legs by timeframe; BTreeMap orders sleeves finest first.
        let mut by_timeframe: BTreeMap<Timeframe, Vec<&FactorLeg>> = BTreeMap::new();
        for leg in &legs {
            by_timeframe.entry(leg.timeframe).or_default().push(leg);
        }

        let config = self.engine.config();
        let sleeve_capital = config.initial_capital / by_timeframe.len() as f64;
        let mut sleeves = Vec::with_capacity(by_timeframe.len());
        for (timeframe, members) in &by_timeframe {
            let prices = prices_by_timeframe
                .get(timeframe)
                .ok_or(CombinationError::MissingPrices(*timeframe))?;
            let signals = members
                .iter()
                .map(|leg| self.registry.compute(&leg.factor_name, prices))
                .collect::<Result<Vec<SignalSeries>, _>>()?;
            let inputs: Vec<&[f64]> = signals.iter().map(|s| s.values.as_slice()).collect();
            // A lone member trades on its own signal, exactly as it was evaluated.
            let values = match inputs.as_slice() {
                [only] => only.to_vec(),
                _ => self.composer.compose(&inputs),
            };
            let composite = SignalSeries::new(
                members.iter().map(|l| l.factor_name.as_str()).collect::<Vec<_>>().join("+"),
                values,
            );
            let run = self
                .engine
                .backtest(prices, &composite, sleeve_capital, config.allocation_fraction)?;
            sleeves.push(Sleeve {
                timeframe: *timeframe,
                prices: prices.clone(),
                run,
            });
        }

        let insufficient = || {
            StrategyResult::new(
                symbol.clone(),
                &legs,
                &FactorMetrics::zero(),
                average_ic,
                vec![Diagnostic::InsufficientData.to_string()],
            )
        };
        if sleeves.iter().any(|s| s.run.is_insufficient()) {
            return Ok(insufficient()?);
        }

        if let [sleeve] = sleeves.as_slice() {
            let run = &sleeve.run;
            return Ok(StrategyResult::new(
                symbol,
                &legs,
                &run.metrics,
                average_ic,
                run.diagnostic_strings(),
            )?);
        }

        let Some(merged) = merge_sleeves(&sleeves, config.min_data_points) else {
            return Ok(insufficient()?);
        };
        let coarsest = sleeves[sleeves.len() - 1].timeframe;
        let capital = config.initial_capital;
        let equity: Vec<f64> = merged.curve.iter().map(|v| v * capital).collect();
        let returns = metrics::returns_from_equity(&equity, capital);
        let m = metrics::summarize(
            &returns,
            &equity,
            &merged.trades,
            capital,
            config.bars_per_year(coarsest),
            config.risk_free_rate,
        );
        let diagnostics = assess(config, &m, &merged.trades)
            .into_iter()
            .map(String::from)
            .collect();
        Ok(StrategyResult::new(symbol, &legs, &m, average_ic, diagnostics)?)
    }
}

struct MergedSleeves {
    /// Average of the rebased sleeve curves; starts at 1.0.
    curve: Vec<f64>,
    /// Trades that opened and closed inside the common window.
    trades: Vec<Trade>,
}

/// Equal-weight merge on the coarsest sleeve's timestamps. `None` when the
/// common window has fewer than `min_points` grid bars.
fn merge_sleeves(sleeves: &[Sleeve], min_points: usize) -> Option<MergedSleeves> {
    let start = sleeves.iter().filter_map(|s| s.run.timestamps.first()).max()?;
    let end = sleeves.iter().filter_map(|s| s.run.timestamps.last()).min()?;
    if start > end {
        return None;
    }
    let coarsest = sleeves.last()?;
    let grid: Vec<DateTime<Utc>> = coarsest
        .run
        .timestamps
        .iter()
        .filter(|t| *t >= start && *t <= end)
        .copied()
        .collect();
    if grid.len() < min_points {
        return None;
    }

    let mut curve = vec![0.0; grid.len()];
    for sleeve in sleeves {
        let sampled: Vec<f64> = grid
            .iter()
            .map(|g| sample_at_or_before(&sleeve.run.timestamps, &sleeve.run.equity, *g))
            .collect::<Option<_>>()?;
        let base = sampled[0];
        if base <= 0.0 {
            return None;
        }
        for (acc, v) in curve.iter_mut().zip(&sampled) {
            *acc += v / base / sleeves.len() as f64;
        }
    }

    // Sleeves already run on 1/k of the capital, so their P&L carries the weight.
    let trades = sleeves
        .iter()
        .flat_map(|s| {
            let bars = s.prices.bars();
            s.run.trades.iter().filter(move |t| {
                bars[t.entry_index].timestamp >= *start && bars[t.exit_index].timestamp <= *end
            })
        })
        .cloned()
        .collect();

    Some(MergedSleeves { curve, trades })
}

/// Last value whose timestamp is at or before `at`.
fn sample_at_or_before(times: &[DateTime<Utc>], values: &[f64], at: DateTime<Utc>) -> Option<f64> {
    let idx = times.partition_point(|t| *t <= at);
    if idx == 0 {
        None
    } else {
        values.get(idx - 1).copied()
    }
}

/// Strategies best first: Sharpe desc, then average IC desc, then name.
pub fn rank_strategies(mut strategies: Vec<StrategyResult>) -> Vec<StrategyResult> {
    strategies.sort_by(|a, b| {
        b.sharpe_ratio
            .total_cmp(&a.sharpe_ratio)
            .then_with(|| {
                b.average_information_coefficient
                    .total_cmp(&a.average_information_coefficient)
            })
            .then_with(|| a.strategy_name.cmp(&b.strategy_name))
    });
    strategies
}
