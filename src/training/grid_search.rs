//! Exhaustive hyperparameter grid search with stratified cross-validation
//!
//! Every (combination, fold) pair is scored on the rayon pool. Scores are
//! gathered back in grid order, so the winner (highest mean score, first
//! combination on ties) does not depend on scheduling.

use super::cross_validation::{CVResults, CVSplit, StratifiedKFold};
use super::xgboost::XGBoostParams;
use crate::error::{FloodError, Result};
use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Candidate values for each boosted-tree hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<usize>,
    pub learning_rate: Vec<f64>,
    pub subsample: Vec<f64>,
    pub colsample_bytree: Vec<f64>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200],
            max_depth: vec![4, 6, 8],
            learning_rate: vec![0.01, 0.05, 0.1],
            subsample: vec![0.8, 1.0],
            colsample_bytree: vec![0.8, 1.0],
        }
    }
}

/// One point of the grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub colsample_bytree: f64,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub n_estimators: usize,
    pub subsample: f64,
}

impl GridPoint {
    /// `base` with this point's values substituted
    pub fn apply(&self, base: &XGBoostParams) -> XGBoostParams {
        XGBoostParams {
            n_estimators: self.n_estimators,
            max_depth: self.max_depth,
            learning_rate: self.learning_rate,
            subsample: self.subsample,
            colsample_bytree: self.colsample_bytree,
            ..base.clone()
        }
    }
}

fn check_fractions(name: &str, values: &[f64]) -> Result<()> {
    for &v in values {
        if !(v > 0.0 && v <= 1.0) {
            return Err(FloodError::InvalidParameter {
                name: name.to_string(),
                value: v.to_string(),
                reason: "must be in (0, 1]".to_string(),
            });
        }
    }
    Ok(())
}

impl ParamGrid {
    pub fn validate(&self) -> Result<()> {
        let lists = [
            ("n_estimators", self.n_estimators.len()),
            ("max_depth", self.max_depth.len()),
            ("learning_rate", self.learning_rate.len()),
            ("subsample", self.subsample.len()),
            ("colsample_bytree", self.colsample_bytree.len()),
        ];
        if let Some((name, _)) = lists.iter().find(|(_, len)| *len == 0) {
            return Err(FloodError::InvalidParameter {
                name: format!("grid.{}", name),
                value: "[]".to_string(),
                reason: "needs at least one candidate".to_string(),
            });
        }
        if self.n_estimators.contains(&0) {
            return Err(FloodError::InvalidParameter {
                name: "grid.n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_depth.contains(&0) {
            return Err(FloodError::InvalidParameter {
                name: "grid.max_depth".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        check_fractions("grid.learning_rate", &self.learning_rate)?;
        check_fractions("grid.subsample", &self.subsample)?;
        check_fractions("grid.colsample_bytree", &self.colsample_bytree)
    }

    pub fn len(&self) -> usize {
        self.n_estimators.len()
            * self.max_depth.len()
            * self.learning_rate.len()
            * self.subsample.len()
            * self.colsample_bytree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cartesian product with parameter names in alphabetical order; the
    /// last name (`subsample`) varies fastest.
    pub fn combinations(&self) -> Vec<GridPoint> {
        let mut points = Vec::with_capacity(self.len());
        for &colsample_bytree in &self.colsample_bytree {
            for &learning_rate in &self.learning_rate {
                for &max_depth in &self.max_depth {
                    for &n_estimators in &self.n_estimators {
                        for &subsample in &self.subsample {
                            points.push(GridPoint {
                                colsample_bytree,
                                learning_rate,
                                max_depth,
                                n_estimators,
                                subsample,
                            });
                        }
                    }
                }
            }
        }
        points
    }
}

/// Shared flag that stops a running search
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Mean CV score of one grid point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridScore {
    pub point: GridPoint,
    pub cv: CVResults,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSearchResult {
    pub best: GridPoint,
    pub best_score: f64,
    /// Every point, in grid order
    pub scores: Vec<GridScore>,
}

/// Grid search driver; the caller supplies how one fold is fit and scored
#[derive(Debug, Clone)]
pub struct GridSearch {
    grid: ParamGrid,
    cv_folds: usize,
    timeout: Option<Duration>,
    token: CancellationToken,
}

impl GridSearch {
    pub fn new(grid: ParamGrid) -> Self {
        Self {
            grid,
            cv_folds: 3,
            timeout: None,
            token: CancellationToken::new(),
        }
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Score every grid point on stratified folds of `y`. `score_fold`
    /// receives the point and a split (row indices into the caller's data)
    /// and returns the validation score, higher is better.
    pub fn run<F>(&self, y: &Array1<f64>, score_fold: F) -> Result<GridSearchResult>
    where
        F: Fn(&GridPoint, &CVSplit) -> Result<f64> + Sync,
    {
        self.grid.validate()?;
        let splits = StratifiedKFold::new(self.cv_folds).split(y)?;
        let points = self.grid.combinations();
        let start = Instant::now();

        info!(
            candidates = points.len(),
            folds = splits.len(),
            fits = points.len() * splits.len(),
            "Starting grid search"
        );

        let tasks: Vec<(usize, usize)> = (0..points.len())
            .flat_map(|p| (0..splits.len()).map(move |s| (p, s)))
            .collect();

        let fold_scores: Vec<f64> = tasks
            .par_iter()
            .map(|&(p, s)| {
                self.check_interrupt(start)?;
                score_fold(&points[p], &splits[s])
            })
            .collect::<Result<Vec<_>>>()?;
        self.check_interrupt(start)?;

        let scores: Vec<GridScore> = points
            .iter()
            .enumerate()
            .map(|(p, point)| {
                let per_fold = fold_scores[p * splits.len()..(p + 1) * splits.len()].to_vec();
                GridScore {
                    point: *point,
                    cv: CVResults::from_scores(per_fold),
                }
            })
            .collect();

        let mut best_idx = 0;
        for (idx, score) in scores.iter().enumerate() {
            if score.cv.mean_score > scores[best_idx].cv.mean_score {
                best_idx = idx;
            }
        }
        let best = scores[best_idx].point;
        let best_score = scores[best_idx].cv.mean_score;

        info!(
            best_score,
            n_estimators = best.n_estimators,
            max_depth = best.max_depth,
            learning_rate = best.learning_rate,
            subsample = best.subsample,
            colsample_bytree = best.colsample_bytree,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Grid search finished"
        );

        Ok(GridSearchResult {
            best,
            best_score,
            scores,
        })
    }

    fn check_interrupt(&self, start: Instant) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(FloodError::Cancelled("grid search cancelled".to_string()));
        }
        if let Some(limit) = self.timeout {
            if start.elapsed() > limit {
                self.token.cancel();
                return Err(FloodError::Cancelled(format!(
                    "grid search exceeded {:.1}s",
                    limit.as_secs_f64()
                )));
            }
        }
        Ok(())
    }
}
