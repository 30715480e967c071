//! Model training module
//!
//! Provides the classifiers used by the flood-risk pipeline:
//! - Random Forest (bagged Gini trees)
//! - Support Vector Machine (RBF kernel, SMO, Platt probabilities)
//! - XGBoost-style gradient boosting, tuned by grid search
//!
//! plus the pipeline that ties feature engineering, encoding and a
//! classifier together, and the trainer that builds one per model kind.

pub mod grid_search;
mod cross_validation;
mod decision_tree;
mod pipeline;
mod random_forest;
mod svm;
mod trainer;
mod xgboost;

pub use cross_validation::{CVResults, CVSplit, StratifiedKFold};
pub use decision_tree::{DecisionTree, TreeNode};
pub use pipeline::FloodPipeline;
pub use random_forest::{MaxFeatures, RandomForest};
pub use svm::{Gamma, SVMClassifier};
pub use trainer::{ModelTrainer, TrainedModel};
pub use xgboost::{XGBoostClassifier, XGBoostParams};

use crate::config::ModelKind;
use crate::error::{FloodError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// A binary classifier over encoded feature matrices
pub trait Classifier: Send + Sync {
    /// Fit on `x` (n × d) and labels in {0, 1}
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Hard labels in {0, 1}
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// n × 2 matrix of [P(0), P(1)]
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Normalized importances, for models that have them
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }

    /// Hyperparameters as a JSON object
    fn params(&self) -> serde_json::Value;
}

/// Checks shared by every classifier's `fit`
pub(crate) fn validate_training_data(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(FloodError::Training(format!(
            "x has {} rows but y has {} labels",
            x.nrows(),
            y.len()
        )));
    }
    if x.nrows() == 0 {
        return Err(FloodError::Training("training set is empty".to_string()));
    }
    if x.ncols() == 0 {
        return Err(FloodError::Training("training set has no feature columns".to_string()));
    }
    if let Some(bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
        return Err(FloodError::Training(format!(
            "labels must be 0 or 1, found {}",
            bad
        )));
    }
    let positives = y.iter().filter(|&&v| v == 1.0).count();
    if positives == 0 || positives == y.len() {
        return Err(FloodError::Training(
            "training labels contain a single class".to_string(),
        ));
    }
    Ok(())
}

/// Any of the fitted model variants, as stored in a bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedClassifier {
    RandomForest(RandomForest),
    Svm(SVMClassifier),
    XGBoost(XGBoostClassifier),
}

impl TrainedClassifier {
    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedClassifier::RandomForest(_) => ModelKind::RandomForest,
            TrainedClassifier::Svm(_) => ModelKind::Svm,
            TrainedClassifier::XGBoost(_) => ModelKind::XGBoost,
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            TrainedClassifier::RandomForest(m) => m,
            TrainedClassifier::Svm(m) => m,
            TrainedClassifier::XGBoost(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            TrainedClassifier::RandomForest(m) => m,
            TrainedClassifier::Svm(m) => m,
            TrainedClassifier::XGBoost(m) => m,
        }
    }
}

impl Classifier for TrainedClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.inner().predict_proba(x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.inner().feature_importances()
    }

    fn params(&self) -> serde_json::Value {
        self.inner().params()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_validate_training_data() {
        let x = array![[1.0], [2.0], [3.0]];
        assert!(validate_training_data(&x, &array![0.0, 1.0, 0.0]).is_ok());
        assert!(validate_training_data(&x, &array![0.0, 1.0]).is_err());
        assert!(validate_training_data(&x, &array![0.0, 2.0, 1.0]).is_err());
        assert!(validate_training_data(&x, &array![1.0, 1.0, 1.0]).is_err());
        assert!(validate_training_data(&Array2::zeros((3, 0)), &array![0.0, 1.0, 0.0]).is_err());
    }

    #[test]
    fn test_trained_classifier_delegates() {
        let x = array![[0.0], [0.1], [0.2], [1.0], [1.1], [1.2]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut model = TrainedClassifier::RandomForest(RandomForest::new(5));
        model.fit(&x, &y).unwrap();

        assert_eq!(model.kind(), ModelKind::RandomForest);
        assert_eq!(model.predict(&x).unwrap(), y);
        assert_eq!(model.params()["n_estimators"], 5);
    }
}
