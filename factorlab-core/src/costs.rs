//! Trading cost models: currency cost of a single order leg.
//!
//! The engine splits every exposure change into a closing leg and/or an
//! opening leg and asks the model for each one separately, so a flip from long
//! to short pays two legs.

use serde::{Deserialize, Serialize};

use crate::domain::OrderSide;

/// Cost of executing one order leg, in currency (non-negative).
pub trait TradingCostModel: Send + Sync {
    /// `price` is the bar close the leg fills at; `notional` is the traded value.
    fn cost(&self, side: OrderSide, price: f64, notional: f64) -> f64;

    fn name(&self) -> &str;
}

/// Frictionless execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroCost;

impl TradingCostModel for ZeroCost {
    fn cost(&self, _side: OrderSide, _price: f64, _notional: f64) -> f64 {
        0.0
    }

    fn name(&self) -> &str {
        "ZeroCost"
    }
}

/// Proportional cost in basis points of notional (e.g. 5 = 0.05%).
#[derive(Debug, Clone, Copy)]
pub struct FixedBpsCost {
    pub bps: f64,
}

impl FixedBpsCost {
    pub fn new(bps: f64) -> Self {
        Self { bps }
    }
}

impl TradingCostModel for FixedBpsCost {
    fn cost(&self, _side: OrderSide, _price: f64, notional: f64) -> f64 {
        notional.abs() * self.bps / 10_000.0
    }

    fn name(&self) -> &str {
        "FixedBpsCost"
    }
}

/// Broker-style per-share commission with a ticket minimum.
#[derive(Debug, Clone, Copy)]
pub struct PerShareCost {
    pub per_share: f64,
    pub minimum: f64,
}

impl TradingCostModel for PerShareCost {
    fn cost(&self, _side: OrderSide, price: f64, notional: f64) -> f64 {
        if notional == 0.0 || price <= 0.0 {
            return 0.0;
        }
        let shares = notional.abs() / price;
        (shares * self.per_share).max(self.minimum)
    }

    fn name(&self) -> &str {
        "PerShareCost"
    }
}

/// Hong Kong cash equities: stamp duty, commission with a floor, slippage.
/// Stamp duty is charged on both buys and sells.
#[derive(Debug, Clone, Copy)]
pub struct HongKongEquityCost {
    pub stamp_duty: f64,
    pub commission: f64,
    pub min_commission: f64,
    pub slippage: f64,
}

impl Default for HongKongEquityCost {
    fn default() -> Self {
        Self {
            stamp_duty: 0.0013,
            commission: 0.001,
            min_commission: 50.0,
            slippage: 0.0008,
        }
    }
}

impl TradingCostModel for HongKongEquityCost {
    fn cost(&self, _side: OrderSide, _price: f64, notional: f64) -> f64 {
        let value = notional.abs();
        if value == 0.0 {
            return 0.0;
        }
        value * self.stamp_duty + (value * self.commission).max(self.min_commission) + value * self.slippage
    }

    fn name(&self) -> &str {
        "HongKongEquityCost"
    }
}

// ─── Config ─────────────────────────────────────────────────────────

/// Serializable selector for a cost model.
///
/// ```toml
/// [costs]
/// type = "FIXED_BPS"
/// bps = 5.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CostModelConfig {
    Zero,
    FixedBps {
        bps: f64,
    },
    PerShare {
        per_share: f64,
        #[serde(default)]
        minimum: f64,
    },
    HongKong {
        #[serde(default = "default_stamp_duty")]
        stamp_duty: f64,
        #[serde(default = "default_commission")]
        commission: f64,
        #[serde(default = "default_min_commission")]
        min_commission: f64,
        #[serde(default = "default_slippage")]
        slippage: f64,
    },
}

fn default_stamp_duty() -> f64 {
    HongKongEquityCost::default().stamp_duty
}

fn default_commission() -> f64 {
    HongKongEquityCost::default().commission
}

fn default_min_commission() -> f64 {
    HongKongEquityCost::default().min_commission
}

fn default_slippage() -> f64 {
    HongKongEquityCost::default().slippage
}

impl Default for CostModelConfig {
    fn default() -> Self {
        let hk = HongKongEquityCost::default();
        Self::HongKong {
            stamp_duty: hk.stamp_duty,
            commission: hk.commission,
            min_commission: hk.min_commission,
            slippage: hk.slippage,
        }
    }
}

impl CostModelConfig {
    pub fn build(&self) -> Box<dyn TradingCostModel> {
        match *self {
            Self::Zero => Box::new(ZeroCost),
            Self::FixedBps { bps } => Box::new(FixedBpsCost::new(bps)),
            Self::PerShare { per_share, minimum } => Box::new(PerShareCost { per_share, minimum }),
            Self::HongKong {
                stamp_duty,
                commission,
                min_commission,
                slippage,
            } => Box::new(HongKongEquityCost {
                stamp_duty,
                commission,
                min_commission,
                slippage,
            }),
        }
    }

    /// Every rate must be finite and non-negative.
    pub fn is_valid(&self) -> bool {
        let ok = |v: f64| v.is_finite() && v >= 0.0;
        match *self {
            Self::Zero => true,
            Self::FixedBps { bps } => ok(bps),
            Self::PerShare { per_share, minimum } => ok(per_share) && ok(minimum),
            Self::HongKong {
                stamp_duty,
                commission,
                min_commission,
                slippage,
            } => ok(stamp_duty) && ok(commission) && ok(min_commission) && ok(slippage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hong_kong_applies_commission_floor() {
        let model = HongKongEquityCost::default();
        // 10k notional: commission 10 < floor 50
        let c = model.cost(OrderSide::Buy, 300.0, 10_000.0);
        assert!((c - (13.0 + 50.0 + 8.0)).abs() < 1e-9);
        // 1M notional: commission above the floor
        let c = model.cost(OrderSide::Sell, 300.0, 1_000_000.0);
        assert!((c - (1_300.0 + 1_000.0 + 800.0)).abs() < 1e-9);
    }

    #[test]
    fn zero_notional_is_free() {
        assert_eq!(HongKongEquityCost::default().cost(OrderSide::Buy, 10.0, 0.0), 0.0);
        assert_eq!(PerShareCost { per_share: 0.01, minimum: 1.0 }.cost(OrderSide::Buy, 10.0, 0.0), 0.0);
    }

    #[test]
    fn per_share_derives_share_count_from_price() {
        let model = PerShareCost {
            per_share: 0.005,
            minimum: 1.0,
        };
        // 10_000 / 50 = 200 shares → 1.0, at the minimum
        assert!((model.cost(OrderSide::Buy, 50.0, 10_000.0) - 1.0).abs() < 1e-12);
        // 100_000 / 10 = 10_000 shares → 50.0
        assert!((model.cost(OrderSide::Sell, 10.0, 100_000.0) - 50.0).abs() < 1e-12);
    }

    #[test]
    fn fixed_bps_scales_with_notional() {
        let model = FixedBpsCost::new(5.0);
        assert!((model.cost(OrderSide::Buy, 1.0, 10_000.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn config_roundtrips_through_toml_shape() {
        let json = r#"{"type":"FIXED_BPS","bps":2.5}"#;
        let cfg: CostModelConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg, CostModelConfig::FixedBps { bps: 2.5 });
        assert_eq!(cfg.build().name(), "FixedBpsCost");

        let hk: CostModelConfig = serde_json::from_str(r#"{"type":"HONG_KONG"}"#).unwrap();
        assert_eq!(hk, CostModelConfig::default());
    }

    #[test]
    fn negative_rates_are_invalid() {
        assert!(!CostModelConfig::FixedBps { bps: -1.0 }.is_valid());
        assert!(CostModelConfig::Zero.is_valid());
    }
}
