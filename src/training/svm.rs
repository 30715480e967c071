//! Support Vector Machine classifier
//!
//! Binary RBF-kernel SVM trained with SMO (Sequential Minimal Optimization).
//! Probabilities come from Platt scaling fitted on the training decision values.

use super::{validate_training_data, Classifier};
use crate::calibration::{Calibrator, PlattScaling};
use crate::config::SvmParams;
use crate::error::{FloodError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training returns an error instead of allocating n² floats.
pub const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Consecutive passes without an update before SMO stops
const MAX_QUIET_PASSES: usize = 5;

/// Kernel width choice
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Gamma {
    /// `1 / (n_features * Var(X))`, variance over every entry of X
    Scale,
    Value(f64),
}

/// RBF support vector classifier for labels in {0, 1}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMClassifier {
    pub c: f64,
    pub gamma: Gamma,
    pub tol: f64,
    /// Upper bound on SMO passes over the data
    pub max_iter: usize,
    pub random_state: u64,
    /// Gamma resolved at fit time
    fitted_gamma: f64,
    support_vectors: Option<Array2<f64>>,
    /// alpha_i * y_i for each support vector
    dual_coef: Array1<f64>,
    bias: f64,
    calibrator: PlattScaling,
    n_features: usize,
}

impl Default for SVMClassifier {
    fn default() -> Self {
        Self::from_params(&SvmParams::default(), 42)
    }
}

impl SVMClassifier {
    pub fn from_params(params: &SvmParams, seed: u64) -> Self {
        Self {
            c: params.c,
            gamma: params.gamma.map_or(Gamma::Scale, Gamma::Value),
            tol: params.tol,
            max_iter: params.max_iter,
            random_state: seed,
            fitted_gamma: 0.0,
            support_vectors: None,
            dual_coef: Array1::zeros(0),
            bias: 0.0,
            calibrator: PlattScaling::new(),
            n_features: 0,
        }
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_gamma(mut self, gamma: Gamma) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.as_ref().map_or(0, |sv| sv.nrows())
    }

    fn resolve_gamma(&self, x: &Array2<f64>) -> f64 {
        match self.gamma {
            Gamma::Value(g) => g,
            Gamma::Scale => {
                let var = x.var(0.0);
                if var > 0.0 {
                    1.0 / (x.ncols() as f64 * var)
                } else {
                    1.0
                }
            }
        }
    }

    /// Signed distance-like score; positive means class 1
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let sv = self.support_vectors.as_ref().ok_or(FloodError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(FloodError::SchemaMismatch(format!(
                "SVM expects {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }

        let gamma = self.fitted_gamma;
        let scores: Vec<f64> = x
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|row| {
                sv.axis_iter(Axis(0))
                    .zip(self.dual_coef.iter())
                    .map(|(s, &coef)| coef * rbf(gamma, s, row))
                    .sum::<f64>()
                    + self.bias
            })
            .collect();
        Ok(Array1::from_vec(scores))
    }
}

fn rbf(gamma: f64, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    let sq: f64 = a.iter().zip(b.iter()).map(|(u, v)| (u - v) * (u - v)).sum();
    (-gamma * sq).exp()
}

fn kernel_matrix(x: &Array2<f64>, gamma: f64) -> Result<Array2<f64>> {
    let n = x.nrows();
    let values: Vec<f64> = (0..n)
        .into_par_iter()
        .flat_map_iter(|i| (0..n).map(move |j| rbf(gamma, x.row(i), x.row(j))))
        .collect();
    Ok(Array2::from_shape_vec((n, n), values)?)
}

struct SmoSolution {
    alphas: Array1<f64>,
    bias: f64,
    passes: usize,
}

/// SMO over a precomputed kernel; `y` is in {-1, +1}. The error cache
/// `errors[k] = f(x_k) - y_k` is updated incrementally after every step.
fn smo(k: &Array2<f64>, y: &Array1<f64>, c: f64, tol: f64, max_iter: usize, seed: u64) -> SmoSolution {
    let n = y.len();
    let mut alphas = Array1::<f64>::zeros(n);
    let mut bias = 0.0;
    let mut errors: Array1<f64> = -y;
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

    let mut quiet = 0;
    let mut passes = 0;
    while quiet < MAX_QUIET_PASSES && passes < max_iter {
        let mut num_changed = 0;

        for i in 0..n {
            let e_i = errors[i];
            let kkt_violated = (y[i] * e_i < -tol && alphas[i] < c) || (y[i] * e_i > tol && alphas[i] > 0.0);
            if !kkt_violated {
                continue;
            }

            let j = loop {
                let j = rng.gen_range(0..n);
                if j != i {
                    break j;
                }
            };
            let e_j = errors[j];

            let alpha_i_old = alphas[i];
            let alpha_j_old = alphas[j];

            let (l, h) = if y[i] != y[j] {
                ((alpha_j_old - alpha_i_old).max(0.0), (c + alpha_j_old - alpha_i_old).min(c))
            } else {
                ((alpha_i_old + alpha_j_old - c).max(0.0), (alpha_i_old + alpha_j_old).min(c))
            };
            if (l - h).abs() < 1e-10 {
                continue;
            }

            let eta = 2.0 * k[[i, j]] - k[[i, i]] - k[[j, j]];
            if eta >= 0.0 {
                continue;
            }

            let alpha_j = (alpha_j_old - y[j] * (e_i - e_j) / eta).clamp(l, h);
            if (alpha_j - alpha_j_old).abs() < 1e-5 {
                continue;
            }
            let alpha_i = alpha_i_old + y[i] * y[j] * (alpha_j_old - alpha_j);

            let d_i = y[i] * (alpha_i - alpha_i_old);
            let d_j = y[j] * (alpha_j - alpha_j_old);
            let b1 = bias - e_i - d_i * k[[i, i]] - d_j * k[[i, j]];
            let b2 = bias - e_j - d_i * k[[i, j]] - d_j * k[[j, j]];
            let new_bias = if alpha_i > 0.0 && alpha_i < c {
                b1
            } else if alpha_j > 0.0 && alpha_j < c {
                b2
            } else {
                (b1 + b2) / 2.0
            };

            let d_b = new_bias - bias;
            for t in 0..n {
                errors[t] += d_i * k[[i, t]] + d_j * k[[j, t]] + d_b;
            }

            alphas[i] = alpha_i;
            alphas[j] = alpha_j;
            bias = new_bias;
            num_changed += 1;
        }

        passes += 1;
        if num_changed == 0 {
            quiet += 1;
        } else {
            quiet = 0;
        }
    }

    SmoSolution { alphas, bias, passes }
}

impl Classifier for SVMClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        validate_training_data(x, y)?;
        let n = x.nrows();
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(FloodError::Training(format!(
                "{} samples exceed the SVM kernel matrix limit of {}",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }

        let gamma = self.resolve_gamma(x);
        let k = kernel_matrix(x, gamma)?;
        let signed = y.mapv(|v| if v > 0.5 { 1.0 } else { -1.0 });
        let solution = smo(&k, &signed, self.c, self.tol, self.max_iter, self.random_state);

        let support: Vec<usize> = solution
            .alphas
            .iter()
            .enumerate()
            .filter(|(_, &a)| a > 1e-8)
            .map(|(i, _)| i)
            .collect();

        self.fitted_gamma = gamma;
        self.n_features = x.ncols();
        self.support_vectors = Some(x.select(Axis(0), &support));
        self.dual_coef = support.iter().map(|&i| solution.alphas[i] * signed[i]).collect();
        self.bias = solution.bias;

        let scores = self.decision_function(x)?;
        let mut calibrator = PlattScaling::new();
        calibrator.fit(&scores, y)?;
        self.calibrator = calibrator;

        debug!(
            n_support = support.len(),
            gamma,
            passes = solution.passes,
            "Fitted SVM"
        );
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self
            .decision_function(x)?
            .mapv(|s| if s > 0.0 { 1.0 } else { 0.0 }))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let p = self.calibrator.calibrate(&self.decision_function(x)?)?;
        Ok(Array2::from_shape_fn((p.len(), 2), |(i, j)| {
            if j == 1 {
                p[i]
            } else {
                1.0 - p[i]
            }
        }))
    }

    fn params(&self) -> serde_json::Value {
        let gamma = match self.gamma {
            Gamma::Scale => json!("scale"),
            Gamma::Value(g) => json!(g),
        };
        json!({
            "kernel": "rbf",
            "C": self.c,
            "gamma": gamma,
            "tol": self.tol,
            "max_iter": self.max_iter,
            "random_state": self.random_state,
        })
    }
}
