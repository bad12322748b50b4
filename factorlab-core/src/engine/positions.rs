//! Signal → position mapping.
//!
//! Exposure at bar t is decided from the signal at the close of bar t and is
//! held over bar t+1. The one-bar lag is applied by the engine, not here.

/// +1, -1 or 0 for a signal value. NaN (warm-up) is flat.
pub fn direction(value: f64, threshold: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else if value > threshold {
        1.0
    } else if value < -threshold {
        -1.0
    } else {
        0.0
    }
}

/// Signed exposure per bar as a fraction of capital.
pub fn exposures(signal: &[f64], threshold: f64, allocation: f64) -> Vec<f64> {
    signal
        .iter()
        .map(|&s| direction(s, threshold) * allocation)
        .collect()
}
