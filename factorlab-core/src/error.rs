//! Structural errors — malformed input that makes a backtest meaningless.
//!
//! These are fatal for the unit of work that hit them. Conditions that merely
//! reduce confidence (too little data, too few trades) are reported as
//! diagnostics on the result instead.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StructuralError {
    #[error("length mismatch: {prices} price bars vs {signal} signal values")]
    LengthMismatch { prices: usize, signal: usize },

    #[error("timestamps not strictly increasing at bar {index}")]
    NonMonotonicTimestamps { index: usize },

    #[error("invalid bar at index {index}: {reason}")]
    InvalidBar { index: usize, reason: String },

    #[error("unknown factor '{0}'")]
    UnknownFactor(String),

    #[error("invalid timeframe '{0}' (expected <n>m, <n>h or <n>d)")]
    InvalidTimeframe(String),

    #[error("initial capital must be positive, got {0}")]
    InvalidCapital(f64),

    #[error("allocation fraction must be in (0, 1], got {0}")]
    InvalidAllocation(f64),

    #[error("a combination needs 2 or 3 factors, got {0}")]
    InvalidCombinationSize(usize),
}
