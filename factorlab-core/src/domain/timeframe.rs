//! Timeframe — the bar aggregation interval a price series is expressed in.
//!
//! Parsed from the compact form used throughout configuration and storage
//! (`1m`, `5m`, `1h`, `1d`). Ordering is by bar duration, so sorting a list
//! of timeframes yields finest-first.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StructuralError;

/// The timeframes explored when configuration does not name any.
pub const DEFAULT_TIMEFRAMES: [&str; 11] = [
    "1m", "2m", "3m", "5m", "10m", "15m", "30m", "1h", "2h", "4h", "1d",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    fn suffix(self) -> char {
        match self {
            Self::Minute => 'm',
            Self::Hour => 'h',
            Self::Day => 'd',
        }
    }

    fn minutes(self) -> u64 {
        match self {
            Self::Minute => 1,
            Self::Hour => 60,
            Self::Day => 1440,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timeframe {
    count: u32,
    unit: TimeUnit,
}

impl Timeframe {
    pub fn new(count: u32, unit: TimeUnit) -> Result<Self, StructuralError> {
        if count == 0 {
            return Err(StructuralError::InvalidTimeframe(format!("0{}", unit.suffix())));
        }
        Ok(Self { count, unit })
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Bar duration in minutes.
    pub fn minutes(&self) -> u64 {
        u64::from(self.count) * self.unit.minutes()
    }

    pub fn is_intraday(&self) -> bool {
        !matches!(self.unit, TimeUnit::Day)
    }

    /// Number of bars of this timeframe in one trading year.
    ///
    /// Intraday bars: `trading_days × ceil(session_minutes / bar_minutes)`
    /// (a partial trailing bar still closes once per session).
    /// Daily and multi-day bars: `trading_days / days_per_bar`.
    pub fn bars_per_year(&self, trading_days_per_year: f64, session_minutes: u32) -> f64 {
        if self.is_intraday() {
            let per_session = (u64::from(session_minutes).max(1) as f64 / self.minutes() as f64)
                .ceil()
                .max(1.0);
            trading_days_per_year * per_session
        } else {
            trading_days_per_year / f64::from(self.count)
        }
    }
}

impl Ord for Timeframe {
    fn cmp(&self, other: &Self) -> Ordering {
        self.minutes()
            .cmp(&other.minutes())
            .then_with(|| self.unit.minutes().cmp(&other.unit.minutes()))
    }
}

impl PartialOrd for Timeframe {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.count, self.unit.suffix())
    }
}

impl FromStr for Timeframe {
    type Err = StructuralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || StructuralError::InvalidTimeframe(s.to_string());
        let unit = match trimmed.chars().last() {
            Some('m') => TimeUnit::Minute,
            Some('h') => TimeUnit::Hour,
            Some('d') => TimeUnit::Day,
            _ => return Err(invalid()),
        };
        let digits = &trimmed[..trimmed.len() - 1];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let count: u32 = digits.parse().map_err(|_| invalid())?;
        Self::new(count, unit).map_err(|_| invalid())
    }
}

impl TryFrom<String> for Timeframe {
    type Error = StructuralError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.to_string()
    }
}
