//! Trade — one round trip derived from position changes in a backtest.

use serde::{Deserialize, Serialize};

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Long,
    Short,
}

impl TradeSide {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }

    /// Order side that opens a position in this direction.
    pub fn entry_order(self) -> OrderSide {
        match self {
            Self::Long => OrderSide::Buy,
            Self::Short => OrderSide::Sell,
        }
    }

    /// Order side that closes a position in this direction.
    pub fn exit_order(self) -> OrderSide {
        match self {
            Self::Long => OrderSide::Sell,
            Self::Short => OrderSide::Buy,
        }
    }
}

/// Side of a single order leg, as seen by the cost model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// A completed (or marked-to-market) round trip.
///
/// Prices are bar closes. `cost` is the sum of the entry and exit leg costs in
/// currency; `notional` is the capital committed to the position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_index: usize,
    pub exit_index: usize,
    pub side: TradeSide,
    pub entry_price: f64,
    pub exit_price: f64,
    pub notional: f64,
    pub cost: f64,
}

impl Trade {
    pub fn gross_pnl(&self) -> f64 {
        if self.entry_price <= 0.0 {
            return 0.0;
        }
        self.side.sign() * (self.exit_price / self.entry_price - 1.0) * self.notional
    }

    pub fn net_pnl(&self) -> f64 {
        self.gross_pnl() - self.cost
    }

    pub fn is_winner(&self) -> bool {
        self.net_pnl() > 0.0
    }
}
