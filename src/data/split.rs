//! Stratified train/test split

use crate::error::{FloodError, Result};
use ndarray::Array1;
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// Held-out split of a feature table and its labels
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: DataFrame,
    pub x_test: DataFrame,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
}

/// Split rows so each class keeps its proportion in both halves.
///
/// Every class with at least two rows contributes at least one row to each
/// side. Row order inside both halves is shuffled with the same seeded rng.
pub fn stratified_split(
    x: &DataFrame,
    y: &Array1<f64>,
    test_size: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    if x.height() != y.len() {
        return Err(FloodError::Training(format!(
            "feature rows ({}) and labels ({}) differ in length",
            x.height(),
            y.len()
        )));
    }
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(FloodError::InvalidParameter {
            name: "test_size".to_string(),
            value: test_size.to_string(),
            reason: "must be in (0, 1)".to_string(),
        });
    }

    let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        by_class.entry(label as i64).or_default().push(i);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train_idx = Vec::with_capacity(y.len());
    let mut test_idx = Vec::new();

    for (_, mut members) in by_class {
        members.shuffle(&mut rng);
        let n = members.len();
        let n_test = if n < 2 {
            0
        } else {
            ((n as f64 * test_size).round() as usize).clamp(1, n - 1)
        };
        test_idx.extend_from_slice(&members[..n_test]);
        train_idx.extend_from_slice(&members[n_test..]);
    }

    if train_idx.is_empty() || test_idx.is_empty() {
        return Err(FloodError::Training(format!(
            "cannot split {} rows with test_size {}",
            y.len(),
            test_size
        )));
    }

    train_idx.shuffle(&mut rng);
    test_idx.shuffle(&mut rng);

    Ok(TrainTestSplit {
        x_train: take_rows(x, &train_idx)?,
        x_test: take_rows(x, &test_idx)?,
        y_train: train_idx.iter().map(|&i| y[i]).collect(),
        y_test: test_idx.iter().map(|&i| y[i]).collect(),
    })
}

/// Gather rows of a table by position
pub(crate) fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec(
        "idx".into(),
        indices.iter().map(|&i| i as IdxSize).collect(),
    );
    Ok(df.take(&idx)?)
}
