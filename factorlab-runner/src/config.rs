//! Serializable discovery configuration.
//!
//! Every threshold the pipeline uses lives here and is passed down by value.
//! All fields have defaults, so an empty TOML file is a valid configuration;
//! `validate()` runs before any work starts.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use factorlab_core::costs::CostModelConfig;
use factorlab_core::domain::{Timeframe, DEFAULT_TIMEFRAMES};
use factorlab_core::engine::EngineConfig;
use factorlab_core::fingerprint::RunId;

use crate::combinations::{MAX_COMBINATION_SIZE, MIN_COMBINATION_SIZE};
use crate::combiner::CompositeRule;
use crate::validator::ValidatorConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("top_n must be at least 1, got {0}")]
    InvalidTopN(usize),

    #[error("combination sizes must satisfy 2 <= min <= max <= 3, got min={min} max={max}")]
    InvalidCombinationSize { min: usize, max: usize },

    #[error("max_combinations must be positive when set")]
    ZeroMaxCombinations,

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Multi-factor search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombinerConfig {
    /// Number of single factors carried into the combination search.
    pub top_n: usize,
    pub min_combination_size: usize,
    pub max_combination_size: usize,
    /// Combinations beyond this many (in generation order) are not tested.
    pub max_combinations: Option<usize>,
    /// Applied to single factors before ranking and to strategies after.
    pub min_sharpe: f64,
    pub min_information_coefficient: f64,
    pub composite_rule: CompositeRule,
}

impl Default for CombinerConfig {
    fn default() -> Self {
        Self {
            top_n: 20,
            min_combination_size: MIN_COMBINATION_SIZE,
            max_combination_size: MAX_COMBINATION_SIZE,
            max_combinations: Some(1000),
            min_sharpe: 0.0,
            min_information_coefficient: 0.0,
            composite_rule: CompositeRule::default(),
        }
    }
}

/// Where price series come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSourceConfig {
    /// `<dir>/<symbol>_<timeframe>.csv`
    Csv { dir: PathBuf },
    /// Seeded random walk. Developer use only; results are meaningless.
    Synthetic { days: u32 },
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self::Synthetic { days: 60 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Also write the strategy ranking as CSV.
    pub export_csv: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("results"),
            export_csv: true,
        }
    }
}

/// Complete configuration for one discovery run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub symbol: String,
    pub timeframes: Vec<Timeframe>,
    /// Factor names to explore; empty means every registered factor.
    pub factors: Vec<String>,
    pub engine: EngineConfig,
    pub costs: CostModelConfig,
    pub validator: ValidatorConfig,
    pub combiner: CombinerConfig,
    pub data: DataSourceConfig,
    pub output: OutputConfig,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            symbol: "0700.HK".to_string(),
            timeframes: DEFAULT_TIMEFRAMES
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect(),
            factors: Vec::new(),
            engine: EngineConfig::default(),
            costs: CostModelConfig::default(),
            validator: ValidatorConfig::default(),
            combiner: CombinerConfig::default(),
            data: DataSourceConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl DiscoveryConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Content hash of the configuration.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        RunId::of(self).map_err(|e| invalid("config", e.to_string()))
    }

    /// Reject configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(invalid("symbol", "must not be empty"));
        }
        if self.timeframes.is_empty() {
            return Err(invalid("timeframes", "at least one timeframe is required"));
        }
        let mut seen = HashSet::new();
        for tf in &self.timeframes {
            if !seen.insert(*tf) {
                return Err(invalid("timeframes", format!("duplicate timeframe {tf}")));
            }
        }
        self.validate_engine()?;
        if !self.costs.is_valid() {
            return Err(invalid("costs", "rates must be finite and non-negative"));
        }
        let bad_rules = self.validator.invalid_rules();
        if !bad_rules.is_empty() {
            return Err(invalid(
                "validator",
                format!("hard bounds must be finite with min <= max: {}", bad_rules.join(", ")),
            ));
        }
        self.validate_combiner()
    }

    fn validate_engine(&self) -> Result<(), ConfigError> {
        let e = &self.engine;
        if !(e.initial_capital.is_finite() && e.initial_capital > 0.0) {
            return Err(invalid("engine.initial_capital", format!("must be positive, got {}", e.initial_capital)));
        }
        if !(e.allocation_fraction > 0.0 && e.allocation_fraction <= 1.0) {
            return Err(invalid(
                "engine.allocation_fraction",
                format!("must be in (0, 1], got {}", e.allocation_fraction),
            ));
        }
        if e.min_data_points < 2 {
            return Err(invalid("engine.min_data_points", "must be at least 2"));
        }
        if e.ic_horizon == 0 {
            return Err(invalid("engine.ic_horizon", "must be at least 1 bar"));
        }
        if !(e.trading_days_per_year.is_finite() && e.trading_days_per_year > 0.0) {
            return Err(invalid("engine.trading_days_per_year", "must be positive"));
        }
        if e.session_minutes == 0 {
            return Err(invalid("engine.session_minutes", "must be positive"));
        }
        if !(e.signal_threshold.is_finite() && e.signal_threshold >= 0.0) {
            return Err(invalid("engine.signal_threshold", "must be finite and non-negative"));
        }
        Ok(())
    }

    fn validate_combiner(&self) -> Result<(), ConfigError> {
        let c = &self.combiner;
        if c.top_n == 0 {
            return Err(ConfigError::InvalidTopN(c.top_n));
        }
        let (min, max) = (c.min_combination_size, c.max_combination_size);
        if !(MIN_COMBINATION_SIZE <= min && min <= max && max <= MAX_COMBINATION_SIZE) {
            return Err(ConfigError::InvalidCombinationSize { min, max });
        }
        if c.max_combinations == Some(0) {
            return Err(ConfigError::ZeroMaxCombinations);
        }
        if c.min_information_coefficient.is_nan() || c.min_sharpe.is_nan() {
            return Err(invalid("combiner", "thresholds must not be NaN"));
        }
        Ok(())
    }
}
