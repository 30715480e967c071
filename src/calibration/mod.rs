//! Probability calibration
//!
//! Maps raw classifier scores (SVM decision values) to probabilities.

mod platt;

pub use platt::PlattScaling;

use crate::error::Result;
use ndarray::Array1;

/// Fits a monotone map from scores to P(y = 1)
pub trait Calibrator: Send + Sync {
    /// Fit on raw scores and binary labels
    fn fit(&mut self, scores: &Array1<f64>, labels: &Array1<f64>) -> Result<()>;

    /// Positive-class probability for each score
    fn calibrate(&self, scores: &Array1<f64>) -> Result<Array1<f64>>;

    fn fit_calibrate(&mut self, scores: &Array1<f64>, labels: &Array1<f64>) -> Result<Array1<f64>> {
        self.fit(scores, labels)?;
        self.calibrate(scores)
    }
}
