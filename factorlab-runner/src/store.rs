//! Result store — append-only JSONL persistence and CSV export.
//!
//! Every record is wrapped with a schema version, the run id of the
//! configuration that produced it and a wall-clock timestamp. Readers skip
//! malformed lines so a partially written file stays usable.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use factorlab_core::domain::{FactorResult, StrategyResult};
use factorlab_core::fingerprint::RunId;

pub const SCHEMA_VERSION: u32 = 1;

pub const FACTOR_RESULTS_FILE: &str = "factor_results.jsonl";
pub const STRATEGY_RESULTS_FILE: &str = "strategy_results.jsonl";
pub const STRATEGY_RANKING_FILE: &str = "strategy_ranking.csv";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),
}

/// Where finished results go.
pub trait ResultRepository {
    fn save_factor_results(&self, results: &[FactorResult]) -> Result<usize, StoreError>;

    fn save_strategy_results(&self, results: &[StrategyResult]) -> Result<usize, StoreError>;
}

/// One persisted line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord<T> {
    pub schema_version: u32,
    pub run_id: String,
    pub recorded_at: DateTime<Utc>,
    pub result: T,
}

/// JSONL files under one output directory.
#[derive(Debug, Clone)]
pub struct JsonlStore {
    dir: PathBuf,
    run_id: RunId,
}

impl JsonlStore {
    pub fn new(dir: impl Into<PathBuf>, run_id: RunId) -> Self {
        Self {
            dir: dir.into(),
            run_id,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn factor_results_path(&self) -> PathBuf {
        self.dir.join(FACTOR_RESULTS_FILE)
    }

    pub fn strategy_results_path(&self) -> PathBuf {
        self.dir.join(STRATEGY_RESULTS_FILE)
    }

    /// All stored factor records, any run.
    pub fn load_factor_results(&self) -> Result<Vec<StoredRecord<FactorResult>>, StoreError> {
        read_records(&self.factor_results_path())
    }

    pub fn load_strategy_results(&self) -> Result<Vec<StoredRecord<StrategyResult>>, StoreError> {
        read_records(&self.strategy_results_path())
    }

    /// Factor results written by this store's run only.
    pub fn load_run_factor_results(&self) -> Result<Vec<FactorResult>, StoreError> {
        Ok(self
            .load_factor_results()?
            .into_iter()
            .filter(|r| r.run_id == self.run_id.0)
            .map(|r| r.result)
            .collect())
    }

    /// Writes the ranking next to the JSONL files and returns its path.
    pub fn export_strategy_ranking(&self, ranked: &[StrategyResult]) -> Result<PathBuf, StoreError> {
        let path = self.dir.join(STRATEGY_RANKING_FILE);
        let csv = export_strategies_csv(ranked)?;
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        fs::write(&path, csv).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    fn append<T: Serialize>(&self, path: &Path, results: &[T]) -> Result<usize, StoreError> {
        let io_err = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;

        let recorded_at = Utc::now();
        for result in results {
            let record = StoredRecord {
                schema_version: SCHEMA_VERSION,
                run_id: self.run_id.0.clone(),
                recorded_at,
                result,
            };
            let json = serde_json::to_string(&record)?;
            writeln!(file, "{json}").map_err(io_err)?;
        }
        file.flush().map_err(io_err)?;
        debug!(path = %path.display(), records = results.len(), "appended results");
        Ok(results.len())
    }
}

impl ResultRepository for JsonlStore {
    fn save_factor_results(&self, results: &[FactorResult]) -> Result<usize, StoreError> {
        self.append(&self.factor_results_path(), results)
    }

    fn save_strategy_results(&self, results: &[StrategyResult]) -> Result<usize, StoreError> {
        self.append(&self.strategy_results_path(), results)
    }
}

fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<StoredRecord<T>>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = fs::File::open(path).map_err(io_err)?;
    let mut records = Vec::new();
    for (number, line) in io::BufReader::new(file).lines().enumerate() {
        let line = line.map_err(io_err)?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<StoredRecord<T>>(&line) {
            Ok(record) if record.schema_version <= SCHEMA_VERSION => records.push(record),
            Ok(record) => warn!(
                line = number + 1,
                version = record.schema_version,
                "skipping record with newer schema"
            ),
            Err(e) => warn!(line = number + 1, error = %e, "skipping malformed line"),
        }
    }
    Ok(records)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Ranked strategies as CSV, one row per strategy in the given order.
pub fn export_strategies_csv(ranked: &[StrategyResult]) -> Result<String, StoreError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "rank",
        "symbol",
        "strategy_name",
        "factors",
        "timeframes",
        "sharpe_ratio",
        "stability",
        "trades_count",
        "win_rate",
        "profit_factor",
        "max_drawdown",
        "average_information_coefficient",
        "validation_status",
        "diagnostics",
        "validation_violations",
    ])?;

    for (i, s) in ranked.iter().enumerate() {
        let timeframes: Vec<String> = s.timeframes().iter().map(ToString::to_string).collect();
        wtr.write_record([
            &(i + 1).to_string(),
            &s.symbol,
            &s.strategy_name,
            &s.factors().join("|"),
            &timeframes.join("|"),
            &format!("{:.6}", s.sharpe_ratio),
            &format!("{:.6}", s.stability),
            &s.trades_count.to_string(),
            &format!("{:.6}", s.win_rate),
            &format!("{:.6}", s.profit_factor),
            &format!("{:.6}", s.max_drawdown),
            &format!("{:.6}", s.average_information_coefficient),
            &format!("{:?}", s.validation_status).to_lowercase(),
            &s.diagnostics.join("|"),
            &s.validation_violations.join("|"),
        ])?;
    }

    let bytes = wtr.into_inner().map_err(|e| StoreError::Io {
        path: PathBuf::from("<csv buffer>"),
        source: e.into_error(),
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use factorlab_core::domain::{FactorLeg, FactorMetrics, Timeframe};

    fn tf(s: &str) -> Timeframe {
        s.parse().unwrap()
    }

    fn metrics(sharpe: f64) -> FactorMetrics {
        FactorMetrics {
            sharpe_ratio: sharpe,
            stability: 0.5,
            trades_count: 12,
            win_rate: 0.5,
            profit_factor: 1.4,
            max_drawdown: 0.1,
            information_coefficient: 0.03,
        }
    }

    fn strategy(sharpe: f64) -> StrategyResult {
        let legs = [FactorLeg::new("A", tf("1m")), FactorLeg::new("B", tf("1h"))];
        StrategyResult::new("0700.HK", &legs, &metrics(sharpe), 0.02, vec![]).unwrap()
    }

    #[test]
    fn factor_results_round_trip_with_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::new(dir.path(), RunId("abc123".into()));
        let result = FactorResult::new("0700.HK", tf("5m"), "roc_10", &metrics(1.0), vec![]);

        assert_eq!(store.save_factor_results(&[result.clone()]).unwrap(), 1);
        let loaded = store.load_factor_results().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].schema_version, SCHEMA_VERSION);
        assert_eq!(loaded[0].run_id, "abc123");
        assert_eq!(loaded[0].result, result);
    }

    #[test]
    fn appends_across_saves() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::new(dir.path(), RunId("r".into()));
        store.save_strategy_results(&[strategy(1.0)]).unwrap();
        store.save_strategy_results(&[strategy(2.0), strategy(3.0)]).unwrap();
        let loaded = store.load_strategy_results().unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[2].result.sharpe_ratio, 3.0);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::new(dir.path(), RunId("r".into()));
        let result = FactorResult::new("X", tf("1m"), "f", &metrics(0.5), vec![]);
        store.save_factor_results(&[result]).unwrap();
        let mut file = OpenOptions::new()
            .append(true)
            .open(store.factor_results_path())
            .unwrap();
        writeln!(file, "{{not json").unwrap();
        writeln!(file).unwrap();
        drop(file);

        assert_eq!(store.load_factor_results().unwrap().len(), 1);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::new(dir.path().join("nested"), RunId("r".into()));
        assert!(store.load_strategy_results().unwrap().is_empty());
    }

    #[test]
    fn run_filter_keeps_only_own_records() {
        let dir = tempfile::tempdir().unwrap();
        let a = JsonlStore::new(dir.path(), RunId("run-a".into()));
        let b = JsonlStore::new(dir.path(), RunId("run-b".into()));
        let r = FactorResult::new("X", tf("1m"), "f", &metrics(0.5), vec![]);
        a.save_factor_results(&[r.clone()]).unwrap();
        b.save_factor_results(&[r.clone(), r]).unwrap();
        assert_eq!(a.load_run_factor_results().unwrap().len(), 1);
        assert_eq!(b.load_run_factor_results().unwrap().len(), 2);
    }

    #[test]
    fn csv_export_has_rank_and_paired_legs() {
        let csv = export_strategies_csv(&[strategy(2.0), strategy(1.0)]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("rank,symbol,strategy_name,factors,timeframes"));
        assert!(lines[1].starts_with("1,0700.HK,A@1m+B@1h,A|B,1m|1h,2.000000"));
        assert!(lines[2].starts_with("2,"));
    }
}
