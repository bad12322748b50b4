//! Rolling indicators over close prices. Warm-up bars are NaN.

/// Simple moving average.
pub fn sma(closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n < period {
        return out;
    }
    let mut sum: f64 = closes[..period].iter().sum();
    out[period - 1] = sum / period as f64;
    for i in period..n {
        sum += closes[i] - closes[i - period];
        out[i] = sum / period as f64;
    }
    out
}

/// Exponential moving average seeded with the SMA of the first `period` bars.
pub fn ema(closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n < period {
        return out;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev = closes[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = prev;
    for i in period..n {
        prev = alpha * closes[i] + (1.0 - alpha) * prev;
        out[i] = prev;
    }
    out
}

/// Rate of change: `close[t] / close[t - period] - 1`.
pub fn roc(closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len();
    let mut out = vec![f64::NAN; n];
    for i in period..n {
        let base = closes[i - period];
        if base > 0.0 {
            out[i] = closes[i] / base - 1.0;
        }
    }
    out
}

/// Wilder RSI in [0, 100]. No losses → 100; no gains → 0.
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n < period + 1 {
        return out;
    }
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let ch = closes[i] - closes[i - 1];
        if ch > 0.0 {
            avg_gain += ch;
        } else {
            avg_loss -= ch;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = rsi_value(avg_gain, avg_loss);

    let alpha = 1.0 / period as f64;
    for i in (period + 1)..n {
        let ch = closes[i] - closes[i - 1];
        avg_gain = (1.0 - alpha) * avg_gain + alpha * ch.max(0.0);
        avg_loss = (1.0 - alpha) * avg_loss + alpha * (-ch).max(0.0);
        out[i] = rsi_value(avg_gain, avg_loss);
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// Rolling z-score of the close against its own window (population std).
/// A flat window has no z-score and stays NaN.
pub fn zscore(closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len();
    let mut out = vec![f64::NAN; n];
    if period < 2 || n < period {
        return out;
    }
    for i in (period - 1)..n {
        let window = &closes[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let var = window.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / period as f64;
        let std = var.sqrt();
        if std > 1e-12 {
            out[i] = (closes[i] - mean) / std;
        }
    }
    out
}
