//! Performance metrics — pure functions that compute factor statistics.
//!
//! Every metric is a pure function: per-bar returns, equity curve and/or trade
//! list in, scalar out. Degenerate inputs (too few points, no variance) yield
//! 0.0 rather than NaN so results stay comparable and serializable.

use crate::domain::{FactorMetrics, Trade};
use crate::stats::{mean, pearson, spearman, std_dev};

/// Reported when there are winning trades and no losing ones. Equal to the
/// validator's hard maximum so it survives clamping untouched.
pub const PROFIT_FACTOR_NO_LOSS: f64 = 500.0;

/// Compute the metric bundle. `information_coefficient` is left at 0.0; it
/// needs the signal, which only the engine has.
pub fn summarize(
    returns: &[f64],
    equity: &[f64],
    trades: &[Trade],
    initial_capital: f64,
    bars_per_year: f64,
    risk_free_rate: f64,
) -> FactorMetrics {
    FactorMetrics {
        sharpe_ratio: sharpe_ratio(returns, bars_per_year, risk_free_rate),
        stability: stability(equity),
        trades_count: trades.len(),
        win_rate: win_rate(trades),
        profit_factor: profit_factor(trades),
        max_drawdown: max_drawdown(equity, initial_capital),
        information_coefficient: 0.0,
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Annualized Sharpe ratio of per-bar returns.
///
/// Sharpe = mean(r - rf/bars_per_year) / std(r) * sqrt(bars_per_year), with the
/// sample standard deviation. Returns 0.0 if std < 1e-15 or fewer than 2 bars.
pub fn sharpe_ratio(returns: &[f64], bars_per_year: f64, risk_free_rate: f64) -> f64 {
    if returns.len() < 2 || bars_per_year <= 0.0 {
        return 0.0;
    }
    let per_bar_rf = risk_free_rate / bars_per_year;
    let excess: Vec<f64> = returns.iter().map(|r| r - per_bar_rf).collect();
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    mean(&excess) / std * bars_per_year.sqrt()
}

/// Signed R² of the equity curve regressed on bar index.
///
/// +1 is a perfectly straight rising line, -1 a perfectly straight falling one.
pub fn stability(equity: &[f64]) -> f64 {
    let index: Vec<f64> = (0..equity.len()).map(|i| i as f64).collect();
    match pearson(&index, equity) {
        Some(r) => r.signum() * r * r,
        None => 0.0,
    }
}

/// Maximum peak-to-trough decline as a positive fraction (0.15 = 15%).
///
/// The running peak starts at `initial_capital`, so an immediate loss counts.
pub fn max_drawdown(equity: &[f64], initial_capital: f64) -> f64 {
    let mut peak = initial_capital;
    let mut max_dd = 0.0_f64;
    for &eq in equity {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - eq) / peak);
        }
    }
    max_dd.clamp(0.0, 1.0)
}

/// Fraction of trades with positive net P&L.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// Gross profit and gross loss (as a positive number) over net P&L.
pub fn gross_profit_and_loss(trades: &[Trade]) -> (f64, f64) {
    trades.iter().fold((0.0, 0.0), |(profit, loss), t| {
        let pnl = t.net_pnl();
        if pnl > 0.0 {
            (profit + pnl, loss)
        } else if pnl < 0.0 {
            (profit, loss - pnl)
        } else {
            (profit, loss)
        }
    })
}

/// Gross profit / gross loss.
///
/// 0.0 with no winners; `PROFIT_FACTOR_NO_LOSS` with winners and no losers.
/// A real ratio is returned as is, even above the sentinel; bounding it is
/// the validator's job.
pub fn profit_factor(trades: &[Trade]) -> f64 {
    let (profit, loss) = gross_profit_and_loss(trades);
    if profit <= 0.0 {
        return 0.0;
    }
    if loss <= 0.0 {
        return PROFIT_FACTOR_NO_LOSS;
    }
    profit / loss
}

/// True when `profit_factor` reports the no-loss sentinel.
pub fn has_winners_without_losers(trades: &[Trade]) -> bool {
    let (profit, loss) = gross_profit_and_loss(trades);
    profit > 0.0 && loss <= 0.0
}

/// Spearman correlation between `signal[t]` and the forward return
/// `close[t + horizon] / close[t] - 1`, over rows where both exist.
///
/// Returns 0.0 for fewer than 3 pairs or when either side is constant.
pub fn information_coefficient(signal: &[f64], closes: &[f64], horizon: usize) -> f64 {
    let horizon = horizon.max(1);
    let n = signal.len().min(closes.len());
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for t in 0..n.saturating_sub(horizon) {
        let s = signal[t];
        if !s.is_finite() {
            continue;
        }
        xs.push(s);
        ys.push(closes[t + horizon] / closes[t] - 1.0);
    }
    if xs.len() < 3 {
        return 0.0;
    }
    spearman(&xs, &ys).unwrap_or(0.0)
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Per-bar returns of an equity curve, the first measured against `base`.
pub fn returns_from_equity(equity: &[f64], base: f64) -> Vec<f64> {
    let mut prev = base;
    equity
        .iter()
        .map(|&eq| {
            let r = if prev > 0.0 { eq / prev - 1.0 } else { 0.0 };
            prev = eq;
            r
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TradeSide;

    fn make_trade(net_pnl: f64) -> Trade {
        // notional 10_000 at entry 100: exit price sets gross P&L exactly
        Trade {
            entry_index: 0,
            exit_index: 5,
            side: TradeSide::Long,
            entry_price: 100.0,
            exit_price: 100.0 * (1.0 + net_pnl / 10_000.0),
            notional: 10_000.0,
            cost: 0.0,
        }
    }

    // ── Sharpe ──

    #[test]
    fn sharpe_constant_returns_is_zero() {
        assert_eq!(sharpe_ratio(&[0.001; 50], 252.0, 0.0), 0.0);
    }

    #[test]
    fn sharpe_matches_hand_computation() {
        let r = [0.01, -0.005, 0.002, 0.004];
        let m = (0.01 - 0.005 + 0.002 + 0.004) / 4.0;
        let var = r.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / 3.0;
        let expected = m / var.sqrt() * 252.0_f64.sqrt();
        assert!((sharpe_ratio(&r, 252.0, 0.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn sharpe_single_bar() {
        assert_eq!(sharpe_ratio(&[0.01], 252.0, 0.0), 0.0);
    }

    #[test]
    fn risk_free_rate_lowers_sharpe() {
        let r = [0.01, -0.005, 0.002, 0.004];
        assert!(sharpe_ratio(&r, 252.0, 0.05) < sharpe_ratio(&r, 252.0, 0.0));
    }

    // ── Stability ──

    #[test]
    fn stability_signs_follow_slope() {
        let up: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let down: Vec<f64> = up.iter().rev().copied().collect();
        assert!((stability(&up) - 1.0).abs() < 1e-12);
        assert!((stability(&down) + 1.0).abs() < 1e-12);
        assert_eq!(stability(&[5.0; 10]), 0.0);
    }

    // ── Max drawdown ──

    #[test]
    fn max_drawdown_known() {
        let eq = [100_000.0, 110_000.0, 90_000.0, 95_000.0];
        let expected = (110_000.0 - 90_000.0) / 110_000.0;
        assert!((max_drawdown(&eq, 100_000.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn max_drawdown_counts_loss_from_initial_capital() {
        let eq = [99_000.0, 98_000.0, 99_500.0];
        assert!((max_drawdown(&eq, 100_000.0) - 0.02).abs() < 1e-12);
    }

    #[test]
    fn max_drawdown_monotonic_increase() {
        let eq: Vec<f64> = (0..100).map(|i| 100_000.0 + i as f64 * 100.0).collect();
        assert_eq!(max_drawdown(&eq, 100_000.0), 0.0);
    }

    // ── Trades ──

    #[test]
    fn win_rate_mixed() {
        let trades = [make_trade(500.0), make_trade(-200.0), make_trade(300.0), make_trade(-100.0)];
        assert!((win_rate(&trades) - 0.5).abs() < 1e-10);
        assert_eq!(win_rate(&[]), 0.0);
    }

    #[test]
    fn profit_factor_mixed() {
        let trades = [make_trade(500.0), make_trade(-200.0), make_trade(300.0)];
        assert!((profit_factor(&trades) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn profit_factor_all_winners_is_sentinel() {
        let trades = [make_trade(500.0), make_trade(300.0)];
        assert_eq!(profit_factor(&trades), PROFIT_FACTOR_NO_LOSS);
        assert!(has_winners_without_losers(&trades));
    }

    #[test]
    fn profit_factor_above_sentinel_is_not_capped() {
        let trades = [make_trade(1000.0), make_trade(-1.0)];
        assert!((profit_factor(&trades) - 1000.0).abs() < 1e-9);
        assert!(!has_winners_without_losers(&trades));
    }

    #[test]
    fn profit_factor_no_winners_is_zero() {
        assert_eq!(profit_factor(&[make_trade(-500.0), make_trade(-300.0)]), 0.0);
        assert_eq!(profit_factor(&[]), 0.0);
        assert!(!has_winners_without_losers(&[]));
    }

    // ── IC ──

    #[test]
    fn ic_perfect_foresight_is_one() {
        let closes = [100.0, 101.0, 100.5, 103.0, 102.0, 104.0];
        let signal: Vec<f64> = closes.windows(2).map(|w| w[1] / w[0] - 1.0).chain([f64::NAN]).collect();
        assert!((information_coefficient(&signal, &closes, 1) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn ic_needs_three_pairs() {
        let closes = [100.0, 101.0, 102.0, 103.0];
        let signal = [f64::NAN, 1.0, 2.0, 3.0];
        assert_eq!(information_coefficient(&signal, &closes, 1), 0.0);
    }

    #[test]
    fn returns_from_equity_uses_base_for_first_bar() {
        let r = returns_from_equity(&[101.0, 99.99], 100.0);
        assert!((r[0] - 0.01).abs() < 1e-12);
        assert!((r[1] + 0.01).abs() < 1e-12);
    }
}
