//! Domain types for FactorLab.

pub mod bar;
pub mod result;
pub mod series;
pub mod timeframe;
pub mod trade;

pub use bar::Bar;
pub use result::{
    strategy_name, FactorLeg, FactorMetrics, FactorResult, StrategyResult, ValidationStatus,
};
pub use series::{PriceSeries, SignalSeries};
pub use timeframe::{Timeframe, TimeUnit, DEFAULT_TIMEFRAMES};
pub use trade::{OrderSide, Trade, TradeSide};
