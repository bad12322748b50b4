//! Trade extraction — converts the exposure path into round-trip trades.
//!
//! Pure function: exposures + closes + per-bar leg costs → trades. A trade
//! opens on a non-zero exposure and closes on the bar the exposure changes.

use crate::domain::{Trade, TradeSide};

/// Currency cost of the closing and opening legs executed at one bar close.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LegCosts {
    pub close: f64,
    pub open: f64,
}

impl LegCosts {
    pub fn total(&self) -> f64 {
        self.close + self.open
    }
}

struct OpenTrade {
    entry_index: usize,
    side: TradeSide,
    entry_price: f64,
    notional: f64,
    entry_cost: f64,
}

/// Extract trades over the window `start..closes.len()`.
///
/// `exposures`, `closes` and `costs` are indexed by bar. The exposure before
/// `start` is treated as flat. A position still open on the last bar is marked
/// to market at the last close if it was held for at least one bar; it pays no
/// exit cost because no exit order was sent.
pub fn extract_trades(
    exposures: &[f64],
    closes: &[f64],
    costs: &[LegCosts],
    start: usize,
    initial_capital: f64,
) -> Vec<Trade> {
    let n = closes.len();
    let mut trades = Vec::new();
    let mut open: Option<OpenTrade> = None;

    for t in start..n {
        let prev = if t == start { 0.0 } else { exposures[t - 1] };
        let cur = exposures[t];
        if cur == prev {
            continue;
        }
        if let Some(o) = open.take() {
            trades.push(close_trade(o, t, closes[t], costs[t].close));
        }
        if cur != 0.0 {
            open = Some(OpenTrade {
                entry_index: t,
                side: if cur > 0.0 { TradeSide::Long } else { TradeSide::Short },
                entry_price: closes[t],
                notional: cur.abs() * initial_capital,
                entry_cost: costs[t].open,
            });
        }
    }

    if let Some(o) = open {
        let last = n - 1;
        if o.entry_index < last {
            trades.push(close_trade(o, last, closes[last], 0.0));
        }
    }
    trades
}

fn close_trade(open: OpenTrade, exit_index: usize, exit_price: f64, exit_cost: f64) -> Trade {
    Trade {
        entry_index: open.entry_index,
        exit_index,
        side: open.side,
        entry_price: open.entry_price,
        exit_price,
        notional: open.notional,
        cost: open.entry_cost + exit_cost,
    }
}
