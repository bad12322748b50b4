//! Factor registry boundary.
//!
//! The engine never knows how a signal was produced. Anything that can turn a
//! named factor and a `PriceSeries` into an aligned `SignalSeries` can feed it.

pub mod builtin;
pub mod indicators;

pub use builtin::BuiltinFactors;

use crate::domain::{PriceSeries, SignalSeries};
use crate::error::StructuralError;

pub trait FactorRegistry: Send + Sync {
    /// Compute factor `name` on `prices`. The result is aligned 1:1 with the
    /// bars; unknown names are `StructuralError::UnknownFactor`.
    fn compute(&self, name: &str, prices: &PriceSeries) -> Result<SignalSeries, StructuralError>;

    /// Registered factor names in a stable order.
    fn names(&self) -> Vec<String>;

    fn contains(&self, name: &str) -> bool {
        self.names().iter().any(|n| n == name)
    }
}
