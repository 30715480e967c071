//! Platt scaling (sigmoid calibration)

use crate::calibration::Calibrator;
use crate::error::{FloodError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Platt scaling calibrator
///
/// Fits P(y=1|f) = 1 / (1 + exp(-(A*f + B))) where f is a raw decision value.
/// Targets use Platt's smoothing, (n+ + 1)/(n+ + 2) and 1/(n- + 2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlattScaling {
    a: Option<f64>,
    b: Option<f64>,
    max_iter: usize,
    tol: f64,
}

impl PlattScaling {
    pub fn new() -> Self {
        Self {
            a: None,
            b: None,
            max_iter: 100,
            tol: 1e-10,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Fitted (A, B)
    pub fn parameters(&self) -> Option<(f64, f64)> {
        match (self.a, self.b) {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        }
    }

    /// Calibrated probability of a single score
    pub fn probability(&self, score: f64) -> Result<f64> {
        let (a, b) = self.parameters().ok_or(FloodError::ModelNotFitted)?;
        Ok(sigmoid(a * score + b))
    }
}

impl Default for PlattScaling {
    fn default() -> Self {
        Self::new()
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// ln(1 + e^z) without overflow
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

fn objective(scores: &[f64], targets: &[f64], a: f64, b: f64) -> f64 {
    scores
        .iter()
        .zip(targets)
        .map(|(&f, &t)| {
            let z = a * f + b;
            t * softplus(-z) + (1.0 - t) * softplus(z)
        })
        .sum()
}

impl Calibrator for PlattScaling {
    fn fit(&mut self, scores: &Array1<f64>, labels: &Array1<f64>) -> Result<()> {
        let n = scores.len();
        if n != labels.len() {
            return Err(FloodError::Training(format!(
                "calibration got {} scores but {} labels",
                n,
                labels.len()
            )));
        }
        if n == 0 {
            return Err(FloodError::Training("cannot calibrate on zero samples".to_string()));
        }

        let n_pos = labels.iter().filter(|&&y| y > 0.5).count() as f64;
        let n_neg = n as f64 - n_pos;
        let target_pos = (n_pos + 1.0) / (n_pos + 2.0);
        let target_neg = 1.0 / (n_neg + 2.0);

        let f: Vec<f64> = scores.to_vec();
        let targets: Vec<f64> = labels
            .iter()
            .map(|&y| if y > 0.5 { target_pos } else { target_neg })
            .collect();

        let mut a = 0.0;
        let mut b = ((n_pos + 1.0) / (n_neg + 1.0)).ln();
        let mut current = objective(&f, &targets, a, b);

        // Newton's method with backtracking
        for _ in 0..self.max_iter {
            let mut grad_a = 0.0;
            let mut grad_b = 0.0;
            let mut hess_aa = 1e-12;
            let mut hess_ab = 0.0;
            let mut hess_bb = 1e-12;

            for (&fi, &t) in f.iter().zip(&targets) {
                let p = sigmoid(a * fi + b);
                let d1 = p - t;
                let d2 = p * (1.0 - p);

                grad_a += fi * d1;
                grad_b += d1;
                hess_aa += fi * fi * d2;
                hess_ab += fi * d2;
                hess_bb += d2;
            }

            if grad_a.abs() < 1e-5 && grad_b.abs() < 1e-5 {
                break;
            }

            let det = hess_aa * hess_bb - hess_ab * hess_ab;
            if det.abs() < 1e-15 {
                break;
            }
            let delta_a = (hess_bb * grad_a - hess_ab * grad_b) / det;
            let delta_b = (hess_aa * grad_b - hess_ab * grad_a) / det;

            let mut step = 1.0;
            let mut moved = false;
            while step >= 1e-10 {
                let new_a = a - step * delta_a;
                let new_b = b - step * delta_b;
                let candidate = objective(&f, &targets, new_a, new_b);
                if candidate < current + 1e-4 * step * (grad_a * -delta_a + grad_b * -delta_b) {
                    a = new_a;
                    b = new_b;
                    current = candidate;
                    moved = true;
                    break;
                }
                step /= 2.0;
            }

            if !moved || (step * delta_a).abs().max((step * delta_b).abs()) < self.tol {
                break;
            }
        }

        self.a = Some(a);
        self.b = Some(b);
        Ok(())
    }

    fn calibrate(&self, scores: &Array1<f64>) -> Result<Array1<f64>> {
        let (a, b) = self.parameters().ok_or(FloodError::ModelNotFitted)?;
        Ok(scores.mapv(|f| sigmoid(a * f + b)))
    }
}
