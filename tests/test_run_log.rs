//! Integration test: run log numbering

use flood_risk::tracking::{NewRun, RunLogger};
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_sequential_runs_are_numbered_from_one() {
    let dir = TempDir::new().unwrap();
    let logger = RunLogger::new(dir.path().join("training_logs.csv"));

    let ids: Vec<u64> = (0..5)
        .map(|i| {
            logger
                .log_run(&NewRun::new("Random Forest", 0.8 + i as f64 * 0.01, 80, 20))
                .unwrap()
                .run_id
        })
        .collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);

    let stored: Vec<u64> = logger.read_records().unwrap().iter().map(|r| r.run_id).collect();
    assert_eq!(stored, ids);
    assert_eq!(logger.next_run_id().unwrap(), 6);
}

#[test]
fn test_existing_log_is_continued() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("training_logs.csv");

    RunLogger::new(&path).log_run(&NewRun::new("SVM", 0.7, 80, 20)).unwrap();
    let record = RunLogger::new(&path)
        .log_run(&NewRun::new("XGBoost (Tuned)", 0.9, 80, 20))
        .unwrap();
    assert_eq!(record.run_id, 2);

    let models: Vec<String> = RunLogger::new(&path)
        .read_records()
        .unwrap()
        .into_iter()
        .map(|r| r.model)
        .collect();
    assert_eq!(models, vec!["SVM", "XGBoost (Tuned)"]);
}

#[test]
fn test_shared_logger_serializes_threads() {
    let dir = TempDir::new().unwrap();
    let logger = Arc::new(RunLogger::new(dir.path().join("training_logs.csv")));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let logger = Arc::clone(&logger);
            std::thread::spawn(move || {
                logger
                    .log_run(&NewRun::new("Random Forest", 0.5, 10, 5))
                    .unwrap()
                    .run_id
            })
        })
        .collect();

    let mut ids: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    ids.sort_unstable();
    assert_eq!(ids, (1..=8).collect::<Vec<u64>>());
}

#[test]
fn test_independent_loggers_can_hand_out_the_same_id() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("training_logs.csv");
    let first = RunLogger::new(&path);
    let second = RunLogger::new(&path);

    // Both read the log before either writes: the read-modify-rewrite race
    assert_eq!(first.next_run_id().unwrap(), 1);
    assert_eq!(second.next_run_id().unwrap(), 1);

    first.log_run(&NewRun::new("SVM", 0.6, 10, 5)).unwrap();
    assert_eq!(second.next_run_id().unwrap(), 2);
}
