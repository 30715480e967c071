//! Stratified k-fold cross-validation

use crate::error::{FloodError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single train/validation split
#[derive(Debug, Clone, PartialEq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Folds that keep the class ratio of `y`. Members of each class are dealt
/// round-robin into folds, in row order unless a shuffle seed is set.
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    n_splits: usize,
    shuffle_seed: Option<u64>,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle_seed: None,
        }
    }

    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        let n_splits = self.n_splits;
        if n_splits < 2 {
            return Err(FloodError::InvalidParameter {
                name: "cv_folds".to_string(),
                value: n_splits.to_string(),
                reason: "need at least 2 folds".to_string(),
            });
        }

        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in y.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        if let Some((class, members)) = class_indices.iter().find(|(_, m)| m.len() < n_splits) {
            return Err(FloodError::Training(format!(
                "class {} has {} members, fewer than {} folds",
                class,
                members.len(),
                n_splits
            )));
        }

        if let Some(seed) = self.shuffle_seed {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        for indices in class_indices.values() {
            for (i, &idx) in indices.iter().enumerate() {
                folds[i % n_splits].push(idx);
            }
        }
        for fold in &mut folds {
            fold.sort_unstable();
        }

        let splits = (0..n_splits)
            .map(|fold_idx| {
                let mut train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                train_indices.sort_unstable();
                CVSplit {
                    train_indices,
                    test_indices: folds[fold_idx].clone(),
                    fold_idx,
                }
            })
            .collect();

        Ok(splits)
    }
}

/// Cross-validation results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
}

impl CVResults {
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n = scores.len().max(1) as f64;
        let mean_score = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n;

        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stratified_k_fold() {
        let y = Array1::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        let splits = StratifiedKFold::new(3).split(&y).unwrap();

        assert_eq!(splits.len(), 3);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 3);
            let positives = split.test_indices.iter().filter(|&&i| y[i] > 0.5).count();
            assert_eq!(positives, 1);
            assert_eq!(split.train_indices.len() + split.test_indices.len(), 9);
        }

        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort_unstable();
        assert_eq!(all_test, (0..9).collect::<Vec<_>>());
    }

    #[test]
    fn test_unshuffled_folds_are_fixed() {
        let y = Array1::from_vec(vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
        let a = StratifiedKFold::new(3).split(&y).unwrap();
        let b = StratifiedKFold::new(3).split(&y).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].test_indices, vec![0, 1]);
    }

    #[test]
    fn test_class_smaller_than_folds() {
        let y = Array1::from_vec(vec![0.0, 0.0, 0.0, 1.0]);
        assert!(matches!(
            StratifiedKFold::new(3).split(&y),
            Err(FloodError::Training(_))
        ));
    }

    #[test]
    fn test_cv_results() {
        let results = CVResults::from_scores(vec![0.8, 0.9, 1.0]);
        assert!((results.mean_score - 0.9).abs() < 1e-12);
        assert!(results.std_score > 0.0);
    }
}
