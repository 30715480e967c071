//! CSV run log

use crate::error::{FloodError, Result};
use crate::evaluation::Evaluation;
use chrono::Local;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const RUN_LOG_HEADER: [&str; 11] = [
    "RunID",
    "Timestamp",
    "Model",
    "Accuracy",
    "Precision",
    "Recall",
    "F1-score",
    "Train Size",
    "Test Size",
    "Parameters",
    "Notes",
];

/// One row of the run log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    #[serde(rename = "RunID")]
    pub run_id: u64,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "Accuracy")]
    pub accuracy: f64,
    #[serde(rename = "Precision")]
    pub precision: f64,
    #[serde(rename = "Recall")]
    pub recall: f64,
    #[serde(rename = "F1-score")]
    pub f1_score: f64,
    #[serde(rename = "Train Size")]
    pub train_size: usize,
    #[serde(rename = "Test Size")]
    pub test_size: usize,
    /// JSON object, or empty
    #[serde(rename = "Parameters")]
    pub parameters: String,
    #[serde(rename = "Notes")]
    pub notes: String,
}

/// What a caller knows about a run before it is logged
#[derive(Debug, Clone)]
pub struct NewRun {
    pub model: String,
    pub accuracy: f64,
    /// Structured classification report; macro averages are read from it
    pub report: serde_json::Value,
    pub train_size: usize,
    pub test_size: usize,
    pub params: Option<serde_json::Value>,
    pub notes: String,
}

impl NewRun {
    pub fn new(model: impl Into<String>, accuracy: f64, train_size: usize, test_size: usize) -> Self {
        Self {
            model: model.into(),
            accuracy,
            report: serde_json::Value::Null,
            train_size,
            test_size,
            params: None,
            notes: String::new(),
        }
    }

    pub fn from_evaluation(
        model: impl Into<String>,
        evaluation: &Evaluation,
        train_size: usize,
        test_size: usize,
    ) -> Self {
        Self {
            report: evaluation.report.to_json(),
            ..Self::new(model, evaluation.accuracy, train_size, test_size)
        }
    }

    pub fn with_report(mut self, report: serde_json::Value) -> Self {
        self.report = report;
        self
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    fn macro_metric(&self, name: &str) -> f64 {
        self.report
            .get("macro avg")
            .and_then(|avg| avg.get(name))
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
    }
}

/// Appends runs to a CSV file by reading it, adding a row and rewriting it.
///
/// Calls through one `RunLogger` are serialized. Separate loggers (or
/// processes) on the same file are not coordinated: two of them can read
/// the same row count and hand out the same RunID.
#[derive(Debug)]
pub struct RunLogger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl RunLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every row currently in the log; an absent file is an empty log
    pub fn read_records(&self) -> Result<Vec<RunRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)?;
        let records = reader
            .deserialize()
            .collect::<std::result::Result<Vec<RunRecord>, csv::Error>>()?;
        Ok(records)
    }

    /// RunID the next append would receive
    pub fn next_run_id(&self) -> Result<u64> {
        Ok(self.read_records()?.len() as u64 + 1)
    }

    /// Append one run and return the stored row
    pub fn log_run(&self, run: &NewRun) -> Result<RunRecord> {
        let _guard = self.lock.lock();

        let mut records = self.read_records()?;
        let parameters = match &run.params {
            Some(p) => serde_json::to_string(p)?,
            None => String::new(),
        };
        let record = RunRecord {
            run_id: records.len() as u64 + 1,
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            model: run.model.clone(),
            accuracy: run.accuracy,
            precision: run.macro_metric("precision"),
            recall: run.macro_metric("recall"),
            f1_score: run.macro_metric("f1-score"),
            train_size: run.train_size,
            test_size: run.test_size,
            parameters,
            notes: run.notes.clone(),
        };
        records.push(record.clone());
        self.rewrite(&records)?;

        info!(
            run_id = record.run_id,
            model = %record.model,
            accuracy = record.accuracy,
            path = %self.path.display(),
            "Logged run"
        );
        Ok(record)
    }

    /// Write all rows to a sibling temp file, then rename it over the log
    fn rewrite(&self, records: &[RunRecord]) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| FloodError::Config(format!("invalid log path {}", self.path.display())))?;
        let tmp = parent.join(format!(".{}.tmp", file_name.to_string_lossy()));

        {
            let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(&tmp)?;
            writer.write_record(RUN_LOG_HEADER)?;
            for record in records {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_first_run_gets_id_one() {
        let dir = TempDir::new().unwrap();
        let logger = RunLogger::new(dir.path().join("nested/logs/training_logs.csv"));

        let record = logger
            .log_run(&NewRun::new("Random Forest", 0.9, 80, 20))
            .unwrap();
        assert_eq!(record.run_id, 1);
        assert!(logger.path().exists());

        let header = fs::read_to_string(logger.path()).unwrap();
        assert!(header.starts_with(
            "RunID,Timestamp,Model,Accuracy,Precision,Recall,F1-score,Train Size,Test Size,Parameters,Notes"
        ));
    }

    #[test]
    fn test_macro_metrics_and_params() {
        let dir = TempDir::new().unwrap();
        let logger = RunLogger::new(dir.path().join("log.csv"));
        let report = json!({
            "macro avg": {"precision": 0.8, "recall": 0.7, "f1-score": 0.75, "support": 20}
        });
        let run = NewRun::new("XGBoost (Tuned)", 0.85, 100, 20)
            .with_report(report)
            .with_params(json!({"max_depth": 4, "learning_rate": 0.1}))
            .with_notes("grid, k=5");

        logger.log_run(&run).unwrap();
        let stored = &logger.read_records().unwrap()[0];
        assert_eq!(stored.precision, 0.8);
        assert_eq!(stored.recall, 0.7);
        assert_eq!(stored.f1_score, 0.75);
        assert_eq!(stored.notes, "grid, k=5");
        let params: serde_json::Value = serde_json::from_str(&stored.parameters).unwrap();
        assert_eq!(params["max_depth"], 4);
    }

    #[test]
    fn test_missing_report_values_are_zero() {
        let dir = TempDir::new().unwrap();
        let logger = RunLogger::new(dir.path().join("log.csv"));
        let record = logger.log_run(&NewRun::new("SVM", 0.5, 10, 5)).unwrap();
        assert_eq!(record.precision, 0.0);
        assert_eq!(record.parameters, "");
    }

    #[test]
    fn test_timestamp_format() {
        let dir = TempDir::new().unwrap();
        let logger = RunLogger::new(dir.path().join("log.csv"));
        let record = logger.log_run(&NewRun::new("SVM", 0.5, 10, 5)).unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(&record.timestamp, "%Y-%m-%d %H:%M:%S").is_ok());
    }
}
