//! Price and signal series.
//!
//! A `PriceSeries` is validated once at construction (strictly increasing
//! timestamps, finite positive closes, consistent OHLC ranges) and is
//! immutable afterwards, so every downstream consumer can index it without
//! re-checking.

use chrono::{DateTime, Utc};

use super::bar::Bar;
use super::timeframe::Timeframe;
use crate::error::StructuralError;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    symbol: String,
    timeframe: Timeframe,
    bars: Vec<Bar>,
}

impl PriceSeries {
    pub fn new(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        bars: Vec<Bar>,
    ) -> Result<Self, StructuralError> {
        for (index, bar) in bars.iter().enumerate() {
            if !bar.close.is_finite() || bar.close <= 0.0 {
                return Err(StructuralError::InvalidBar {
                    index,
                    reason: format!("close must be finite and positive, got {}", bar.close),
                });
            }
            if !bar.is_sane() {
                return Err(StructuralError::InvalidBar {
                    index,
                    reason: format!(
                        "inconsistent OHLC (open {}, high {}, low {}, close {})",
                        bar.open, bar.high, bar.low, bar.close
                    ),
                });
            }
            if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
                return Err(StructuralError::NonMonotonicTimestamps { index });
            }
        }
        Ok(Self {
            symbol: symbol.into(),
            timeframe,
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.bars.iter().map(|b| b.timestamp).collect()
    }
}

/// Numeric factor output aligned 1:1 by index with the `PriceSeries` it was
/// computed from. `NaN` marks warm-up bars with no opinion.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSeries {
    pub name: String,
    pub values: Vec<f64>,
}

impl SignalSeries {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Count of non-NaN values.
    pub fn usable_len(&self) -> usize {
        self.values.iter().filter(|v| !v.is_nan()).count()
    }

    /// Index of the first non-NaN value.
    pub fn first_usable(&self) -> Option<usize> {
        self.values.iter().position(|v| !v.is_nan())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn bars(closes: &[f64]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                timestamp: start + Duration::minutes(i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 1_000.0,
            })
            .collect()
    }

    #[test]
    fn accepts_increasing_timestamps() {
        let series = PriceSeries::new("0700.HK", "1m".parse().unwrap(), bars(&[1.0, 2.0, 3.0])).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn rejects_repeated_timestamp() {
        let mut b = bars(&[1.0, 2.0, 3.0]);
        b[2].timestamp = b[1].timestamp;
        let err = PriceSeries::new("X", "1m".parse().unwrap(), b).unwrap_err();
        assert_eq!(err, StructuralError::NonMonotonicTimestamps { index: 2 });
    }

    #[test]
    fn rejects_non_positive_close() {
        let err = PriceSeries::new("X", "1m".parse().unwrap(), bars(&[1.0, 0.0])).unwrap_err();
        assert!(matches!(err, StructuralError::InvalidBar { index: 1, .. }));
    }

    #[test]
    fn rejects_inconsistent_ohlc() {
        let mut b = bars(&[10.0, 11.0, 12.0]);
        b[1].high = 10.5;
        let err = PriceSeries::new("X", "1m".parse().unwrap(), b).unwrap_err();
        assert!(matches!(err, StructuralError::InvalidBar { index: 1, .. }));

        let mut b = bars(&[10.0, 11.0]);
        b[0].low = f64::NAN;
        assert!(PriceSeries::new("X", "1m".parse().unwrap(), b).is_err());
    }

    #[test]
    fn signal_usable_counts_skip_nan() {
        let s = SignalSeries::new("f", vec![f64::NAN, f64::NAN, 1.0, -1.0, f64::NAN]);
        assert_eq!(s.usable_len(), 2);
        assert_eq!(s.first_usable(), Some(2));
    }
}
