//! Run tracking
//!
//! One CSV row per training run, with an auto-incrementing RunID.

mod run_log;

pub use run_log::{NewRun, RunLogger, RunRecord, RUN_LOG_HEADER};
