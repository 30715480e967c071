//! XGBoost-style gradient boosting with second-order approximation
//!
//! - Logistic loss; gradient `p - y`, hessian `p (1 - p)`
//! - Regularized leaf weights: w* = -G / (H + lambda)
//! - Split gain: 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)] - γ
//! - Per-tree row subsampling and column subsampling

use super::{validate_training_data, Classifier};
use crate::error::{FloodError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Boosting hyperparameters; the grid search varies the first five
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XGBoostParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// Minimum loss reduction to make a split
    pub gamma: f64,
    pub random_state: u64,
}

impl Default for XGBoostParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 6,
            learning_rate: 0.3,
            subsample: 1.0,
            colsample_bytree: 1.0,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            gamma: 0.0,
            random_state: 42,
        }
    }
}

/// A single node in a boosted tree
#[derive(Debug, Clone, Serialize, Deserialize)]
enum XGBNode {
    Leaf { weight: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                XGBNode::Leaf { weight } => return *weight,
                XGBNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }
}

struct GradStats<'a> {
    grad: &'a Array1<f64>,
    hess: &'a Array1<f64>,
}

/// Exact greedy tree over the given rows and columns; split gains are
/// accumulated into `gains` per feature.
fn build_xgb_tree(
    x: &Array2<f64>,
    stats: &GradStats,
    indices: &[usize],
    feature_indices: &[usize],
    depth: usize,
    params: &XGBoostParams,
    gains: &mut [f64],
) -> XGBNode {
    let g_sum: f64 = indices.iter().map(|&i| stats.grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| stats.hess[i]).sum();
    let leaf_weight = -g_sum / (h_sum + params.reg_lambda);

    if depth >= params.max_depth || indices.len() < 2 || h_sum < params.min_child_weight {
        return XGBNode::Leaf { weight: leaf_weight };
    }

    // Collected in feature order so ties resolve to the lowest feature index
    let candidates: Vec<Option<(usize, f64, f64)>> = feature_indices
        .par_iter()
        .map(|&f| find_best_split_for_feature(x, stats, indices, f, params))
        .collect();
    let best = candidates
        .into_iter()
        .flatten()
        .fold(None, |acc: Option<(usize, f64, f64)>, cand| match acc {
            Some(a) if a.2 >= cand.2 => Some(a),
            _ => Some(cand),
        });

    match best {
        Some((feature, threshold, gain)) if gain - params.gamma > 0.0 => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| x[[i, feature]] <= threshold);

            if left_idx.is_empty() || right_idx.is_empty() {
                return XGBNode::Leaf { weight: leaf_weight };
            }
            gains[feature] += gain;

            let left = build_xgb_tree(x, stats, &left_idx, feature_indices, depth + 1, params, gains);
            let right = build_xgb_tree(x, stats, &right_idx, feature_indices, depth + 1, params, gains);

            XGBNode::Split {
                feature,
                threshold,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => XGBNode::Leaf { weight: leaf_weight },
    }
}

/// Best (feature, threshold, gain) for a single feature
fn find_best_split_for_feature(
    x: &Array2<f64>,
    stats: &GradStats,
    indices: &[usize],
    feature: usize,
    params: &XGBoostParams,
) -> Option<(usize, f64, f64)> {
    let mut sorted: Vec<usize> = indices.to_vec();
    sorted.sort_by(|&a, &b| {
        x[[a, feature]]
            .partial_cmp(&x[[b, feature]])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let g_total: f64 = sorted.iter().map(|&i| stats.grad[i]).sum();
    let h_total: f64 = sorted.iter().map(|&i| stats.hess[i]).sum();
    let lambda = params.reg_lambda;

    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best: Option<(usize, f64, f64)> = None;

    for pos in 0..sorted.len() - 1 {
        let idx = sorted[pos];
        let next_idx = sorted[pos + 1];
        g_left += stats.grad[idx];
        h_left += stats.hess[idx];

        if x[[idx, feature]] == x[[next_idx, feature]] {
            continue;
        }

        let g_right = g_total - g_left;
        let h_right = h_total - h_left;
        if h_left < params.min_child_weight || h_right < params.min_child_weight {
            continue;
        }

        let gain = 0.5
            * ((g_left * g_left) / (h_left + lambda) + (g_right * g_right) / (h_right + lambda)
                - (g_total * g_total) / (h_total + lambda));

        if best.map_or(true, |b| gain > b.2) {
            let threshold = (x[[idx, feature]] + x[[next_idx, feature]]) / 2.0;
            best = Some((feature, threshold, gain));
        }
    }

    best
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Boosted-tree binary classifier (logistic objective)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostClassifier {
    params: XGBoostParams,
    trees: Vec<XGBNode>,
    base_score: f64,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for XGBoostClassifier {
    fn default() -> Self {
        Self::new(XGBoostParams::default())
    }
}

impl XGBoostClassifier {
    pub fn new(params: XGBoostParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            base_score: 0.0,
            n_features: 0,
            feature_importances: None,
        }
    }

    pub fn hyperparams(&self) -> &XGBoostParams {
        &self.params
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn raw_scores(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() && self.n_features == 0 {
            return Err(FloodError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(FloodError::SchemaMismatch(format!(
                "booster expects {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }
        let lr = self.params.learning_rate;
        Ok(x
            .rows()
            .into_iter()
            .map(|row| {
                self.base_score + self.trees.iter().map(|t| lr * t.predict(row)).sum::<f64>()
            })
            .collect())
    }

    fn positive_probability(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.raw_scores(x)?.mapv(sigmoid))
    }
}

impl Classifier for XGBoostClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        validate_training_data(x, y)?;
        let n_samples = x.nrows();
        let n_features = x.ncols();
        let params = self.params.clone();

        // Base score in log-odds space
        let p = y.mean().unwrap_or(0.5).clamp(1e-7, 1.0 - 1e-7);
        let base_score = (p / (1.0 - p)).ln();
        let mut raw_preds = Array1::from_elem(n_samples, base_score);

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(params.random_state);
        let mut gains = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let probs: Array1<f64> = raw_preds.mapv(sigmoid);
            let grad: Array1<f64> = &probs - y;
            let hess: Array1<f64> = probs.mapv(|p| (p * (1.0 - p)).max(1e-7));
            let stats = GradStats {
                grad: &grad,
                hess: &hess,
            };

            let row_indices = subsample(&mut rng, n_samples, params.subsample);
            let col_indices = subsample(&mut rng, n_features, params.colsample_bytree);
            let tree = build_xgb_tree(x, &stats, &row_indices, &col_indices, 0, &params, &mut gains);

            // Every row moves, including the ones left out of this tree's sample
            for (i, row) in x.rows().into_iter().enumerate() {
                raw_preds[i] += params.learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }

        let total: f64 = gains.iter().sum();
        if total > 0.0 {
            for g in &mut gains {
                *g /= total;
            }
        }

        self.trees = trees;
        self.base_score = base_score;
        self.n_features = n_features;
        self.feature_importances = Some(Array1::from_vec(gains));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self
            .positive_probability(x)?
            .mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let p = self.positive_probability(x)?;
        Ok(Array2::from_shape_fn((p.len(), 2), |(i, j)| {
            if j == 1 {
                p[i]
            } else {
                1.0 - p[i]
            }
        }))
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }

    fn params(&self) -> serde_json::Value {
        serde_json::to_value(&self.params).unwrap_or(serde_json::Value::Null)
    }
}

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = (((n as f64) * ratio).ceil() as usize).clamp(1, n.max(1));
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort_unstable();
    indices
}
