//! Class-imbalance correction by synthetic minority oversampling

mod smote;

pub use smote::Smote;

use ndarray::{Array1, Array2};
use std::collections::BTreeMap;

/// Result of resampling: original rows first, synthetic rows after them
#[derive(Debug, Clone)]
pub struct ResampleResult {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    /// Synthetic rows generated per class
    pub n_synthetic: BTreeMap<i64, usize>,
}

/// Class distribution, ordered by class label
pub fn class_counts(y: &Array1<f64>) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for &label in y.iter() {
        *counts.entry(label as i64).or_insert(0) += 1;
    }
    counts
}

/// Row indices for each class, ordered by class label
pub fn class_indices(y: &Array1<f64>) -> BTreeMap<i64, Vec<usize>> {
    let mut indices = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        indices.entry(label as i64).or_insert_with(Vec::new).push(i);
    }
    indices
}
