//! Price providers — where `PriceSeries` come from.
//!
//! - `CsvPriceProvider`: one file per symbol and timeframe.
//! - `SyntheticPriceProvider`: a seeded random walk for development. These
//!   series are clearly fake and every load is logged as synthetic.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use factorlab_core::domain::{Bar, PriceSeries, Timeframe};
use factorlab_core::fingerprint::derive_seed;
use factorlab_core::StructuralError;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no price file for '{symbol}' {timeframe} at {}", path.display())]
    NotFound {
        symbol: String,
        timeframe: Timeframe,
        path: PathBuf,
    },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: unparseable timestamp '{value}'")]
    Timestamp { row: usize, value: String },

    #[error("'{symbol}' {timeframe} has no bars")]
    Empty { symbol: String, timeframe: Timeframe },

    #[error(transparent)]
    Structural(#[from] StructuralError),
}

/// Source of bar data for one symbol at one timeframe.
pub trait PriceProvider: Send + Sync {
    fn load(&self, symbol: &str, timeframe: Timeframe) -> Result<PriceSeries, LoadError>;

    fn name(&self) -> &str;
}

// ─── CSV ────────────────────────────────────────────────────────────

/// Reads `<dir>/<symbol>_<timeframe>.csv` with columns
/// `timestamp,open,high,low,close,volume`. Timestamps are RFC 3339 or
/// `%Y-%m-%d %H:%M:%S` (taken as UTC).
#[derive(Debug, Clone)]
pub struct CsvPriceProvider {
    dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl CsvPriceProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.dir.join(format!("{symbol}_{timeframe}.csv"))
    }
}

impl PriceProvider for CsvPriceProvider {
    fn load(&self, symbol: &str, timeframe: Timeframe) -> Result<PriceSeries, LoadError> {
        let path = self.path_for(symbol, timeframe);
        if !path.exists() {
            return Err(LoadError::NotFound {
                symbol: symbol.to_string(),
                timeframe,
                path,
            });
        }
        let bars = read_bars(&path)?;
        if bars.is_empty() {
            return Err(LoadError::Empty {
                symbol: symbol.to_string(),
                timeframe,
            });
        }
        debug!(symbol, timeframe = %timeframe, bars = bars.len(), "loaded csv prices");
        Ok(PriceSeries::new(symbol, timeframe, bars)?)
    }

    fn name(&self) -> &str {
        "csv"
    }
}

fn read_bars(path: &Path) -> Result<Vec<Bar>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);
    let mut bars = Vec::new();
    for (row, record) in reader.deserialize::<CsvRow>().enumerate() {
        let record = record?;
        let timestamp = parse_timestamp(&record.timestamp).ok_or_else(|| LoadError::Timestamp {
            row: row + 1,
            value: record.timestamp.clone(),
        })?;
        bars.push(Bar {
            timestamp,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
        });
    }
    Ok(bars)
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

// ─── Synthetic ──────────────────────────────────────────────────────

/// Seeded geometric random walk over `days` sessions.
///
/// Intraday bars fill a session of `session_minutes` starting 01:30 UTC;
/// daily bars close once per day. The seed is derived from the symbol and
/// timeframe, so every load of the same pair returns the same series.
#[derive(Debug, Clone)]
pub struct SyntheticPriceProvider {
    days: u32,
    session_minutes: u32,
    start: NaiveDate,
}

impl SyntheticPriceProvider {
    pub fn new(days: u32) -> Self {
        Self {
            days,
            session_minutes: 330,
            start: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap_or_default(),
        }
    }

    pub fn with_session_minutes(mut self, session_minutes: u32) -> Self {
        self.session_minutes = session_minutes.max(1);
        self
    }

    fn bar_times(&self, timeframe: Timeframe) -> Vec<DateTime<Utc>> {
        let mut times = Vec::new();
        for day in 0..self.days {
            let date = self.start + Duration::days(i64::from(day));
            let Some(open) = date.and_hms_opt(1, 30, 0) else {
                continue;
            };
            let open = Utc.from_utc_datetime(&open);
            if timeframe.is_intraday() {
                let step = timeframe.minutes() as i64;
                let per_session = (i64::from(self.session_minutes) + step - 1) / step;
                times.extend((1..=per_session).map(|k| open + Duration::minutes(step * k)));
            } else if day % timeframe.count() == 0 {
                times.push(open + Duration::minutes(i64::from(self.session_minutes)));
            }
        }
        times
    }
}

impl PriceProvider for SyntheticPriceProvider {
    fn load(&self, symbol: &str, timeframe: Timeframe) -> Result<PriceSeries, LoadError> {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let tf_label = timeframe.to_string();
        let mut rng = StdRng::seed_from_u64(derive_seed(&[symbol, &tf_label]));
        let times = self.bar_times(timeframe);
        if times.is_empty() {
            return Err(LoadError::Empty {
                symbol: symbol.to_string(),
                timeframe,
            });
        }
        // per-bar volatility grows with bar length
        let vol = 0.0008 * (timeframe.minutes() as f64).sqrt();
        let mut price = 100.0_f64;
        let bars: Vec<Bar> = times
            .into_iter()
            .map(|timestamp| {
                let ret: f64 = rng.gen_range(-vol..vol);
                let open = price;
                let close = (price * (1.0 + ret)).max(0.01);
                let high = open.max(close) * (1.0 + rng.gen_range(0.0..vol / 2.0));
                let low = open.min(close) * (1.0 - rng.gen_range(0.0..vol / 2.0));
                price = close;
                Bar {
                    timestamp,
                    open,
                    high,
                    low,
                    close,
                    volume: rng.gen_range(1_000.0..100_000.0),
                }
            })
            .collect();
        warn!(symbol, timeframe = %timeframe, bars = bars.len(), "using SYNTHETIC prices");
        Ok(PriceSeries::new(symbol, timeframe, bars)?)
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CsvPriceProvider::new(dir.path());
        let tf: Timeframe = "5m".parse().unwrap();
        let mut file = std::fs::File::create(provider.path_for("0700.HK", tf)).unwrap();
        writeln!(file, "timestamp,open,high,low,close,volume").unwrap();
        writeln!(file, "2024-03-01 01:30:00,300,301,299,300.5,1000").unwrap();
        writeln!(file, "2024-03-01T01:35:00Z,300.5,302,300,301.5,1200").unwrap();
        drop(file);

        let series = provider.load("0700.HK", tf).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.closes(), vec![300.5, 301.5]);
        assert_eq!(series.timeframe(), tf);
    }

    #[test]
    fn missing_csv_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = CsvPriceProvider::new(dir.path())
            .load("X", "1m".parse().unwrap())
            .unwrap_err();
        assert!(matches!(err, LoadError::NotFound { .. }));
    }

    #[test]
    fn unsorted_csv_is_structural() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CsvPriceProvider::new(dir.path());
        let tf: Timeframe = "1m".parse().unwrap();
        std::fs::write(
            provider.path_for("X", tf),
            "timestamp,open,high,low,close,volume\n\
             2024-03-01 01:31:00,1,1,1,1,1\n\
             2024-03-01 01:30:00,1,1,1,1,1\n",
        )
        .unwrap();
        let err = provider.load("X", tf).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Structural(StructuralError::NonMonotonicTimestamps { index: 1 })
        ));
    }

    #[test]
    fn csv_with_high_below_close_is_structural() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CsvPriceProvider::new(dir.path());
        let tf: Timeframe = "1m".parse().unwrap();
        std::fs::write(
            provider.path_for("X", tf),
            "timestamp,open,high,low,close,volume\n\
             2024-03-01 01:30:00,10,10.5,9.5,10,1\n\
             2024-03-01 01:31:00,10,10.2,9.8,10.4,1\n",
        )
        .unwrap();
        let err = provider.load("X", tf).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Structural(StructuralError::InvalidBar { index: 1, .. })
        ));
    }

    #[test]
    fn bad_timestamp_reports_row() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CsvPriceProvider::new(dir.path());
        let tf: Timeframe = "1m".parse().unwrap();
        std::fs::write(
            provider.path_for("X", tf),
            "timestamp,open,high,low,close,volume\nyesterday,1,1,1,1,1\n",
        )
        .unwrap();
        assert!(matches!(provider.load("X", tf), Err(LoadError::Timestamp { row: 1, .. })));
    }

    #[test]
    fn synthetic_is_deterministic_per_pair() {
        let provider = SyntheticPriceProvider::new(5);
        let tf: Timeframe = "5m".parse().unwrap();
        let a = provider.load("0700.HK", tf).unwrap();
        let b = provider.load("0700.HK", tf).unwrap();
        let c = provider.load("0005.HK", tf).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.closes(), c.closes());
        // 330-minute session / 5m = 66 bars per day
        assert_eq!(a.len(), 5 * 66);
    }

    #[test]
    fn synthetic_timeframes_cover_the_same_days() {
        let provider = SyntheticPriceProvider::new(30);
        let fine = provider.load("X", "1m".parse().unwrap()).unwrap();
        let coarse = provider.load("X", "1h".parse().unwrap()).unwrap();
        let daily = provider.load("X", "1d".parse().unwrap()).unwrap();
        assert_eq!(coarse.len(), 30 * 6);
        assert_eq!(daily.len(), 30);
        assert_eq!(fine.bars().last().unwrap().timestamp, daily.bars().last().unwrap().timestamp);
    }
}
