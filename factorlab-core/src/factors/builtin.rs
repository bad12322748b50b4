//! Reference factor set.
//!
//! A handful of classic price factors so the pipeline runs end to end, plus a
//! `register` hook for caller-supplied closures. Every factor is oriented so
//! that a positive value means "expect the price to rise".

use std::collections::BTreeMap;
use std::sync::Arc;

use super::indicators::{ema, roc, rsi, sma, zscore};
use super::FactorRegistry;
use crate::domain::{PriceSeries, SignalSeries};
use crate::error::StructuralError;

type FactorFn = Arc<dyn Fn(&PriceSeries) -> Vec<f64> + Send + Sync>;

#[derive(Clone)]
pub struct BuiltinFactors {
    factors: BTreeMap<String, FactorFn>,
}

impl std::fmt::Debug for BuiltinFactors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinFactors")
            .field("factors", &self.factors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for BuiltinFactors {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinFactors {
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("roc_10", |p| roc(&p.closes(), 10));
        registry.register("rsi_14_reversion", |p| {
            rsi(&p.closes(), 14).into_iter().map(|v| (50.0 - v) / 50.0).collect()
        });
        registry.register("sma_cross_5_20", |p| {
            let closes = p.closes();
            sma(&closes, 5)
                .into_iter()
                .zip(sma(&closes, 20))
                .map(|(fast, slow)| fast / slow - 1.0)
                .collect()
        });
        registry.register("ema_trend_20", |p| {
            let closes = p.closes();
            closes
                .iter()
                .zip(ema(&closes, 20))
                .map(|(c, e)| c / e - 1.0)
                .collect()
        });
        registry.register("zscore_20_reversion", |p| {
            zscore(&p.closes(), 20).into_iter().map(|z| -z).collect()
        });
        registry
    }

    pub fn empty() -> Self {
        Self {
            factors: BTreeMap::new(),
        }
    }

    /// Add or replace a factor. The closure must return one value per bar.
    pub fn register<F>(&mut self, name: impl Into<String>, factor: F)
    where
        F: Fn(&PriceSeries) -> Vec<f64> + Send + Sync + 'static,
    {
        self.factors.insert(name.into(), Arc::new(factor));
    }
}

impl FactorRegistry for BuiltinFactors {
    fn compute(&self, name: &str, prices: &PriceSeries) -> Result<SignalSeries, StructuralError> {
        let factor = self
            .factors
            .get(name)
            .ok_or_else(|| StructuralError::UnknownFactor(name.to_string()))?;
        let values = factor(prices);
        if values.len() != prices.len() {
            return Err(StructuralError::LengthMismatch {
                prices: prices.len(),
                signal: values.len(),
            });
        }
        Ok(SignalSeries::new(name, values))
    }

    fn names(&self) -> Vec<String> {
        self.factors.keys().cloned().collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.factors.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;
    use chrono::{Duration, TimeZone, Utc};

    fn prices(n: usize) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 1, 30, 0).unwrap();
        let bars = (0..n)
            .map(|i| {
                let c = 100.0 + (i as f64 * 0.7).sin() * 5.0 + i as f64 * 0.1;
                Bar {
                    timestamp: start + Duration::minutes(5 * i as i64),
                    open: c,
                    high: c,
                    low: c,
                    close: c,
                    volume: 1.0,
                }
            })
            .collect();
        PriceSeries::new("TEST", "5m".parse().unwrap(), bars).unwrap()
    }

    #[test]
    fn every_builtin_is_aligned() {
        let registry = BuiltinFactors::new();
        let p = prices(80);
        for name in registry.names() {
            let s = registry.compute(&name, &p).unwrap();
            assert_eq!(s.len(), p.len(), "{name}");
            assert!(s.usable_len() >= 55, "{name} has {} usable values", s.usable_len());
        }
    }

    #[test]
    fn names_are_sorted() {
        let names = BuiltinFactors::new().names();
        assert_eq!(
            names,
            vec!["ema_trend_20", "roc_10", "rsi_14_reversion", "sma_cross_5_20", "zscore_20_reversion"]
        );
    }

    #[test]
    fn unknown_factor_is_structural() {
        let err = BuiltinFactors::new().compute("nope", &prices(10)).unwrap_err();
        assert_eq!(err, StructuralError::UnknownFactor("nope".into()));
    }

    #[test]
    fn misaligned_custom_factor_is_rejected() {
        let mut registry = BuiltinFactors::empty();
        registry.register("short", |_| vec![1.0]);
        let err = registry.compute("short", &prices(10)).unwrap_err();
        assert_eq!(err, StructuralError::LengthMismatch { prices: 10, signal: 1 });
    }
}
