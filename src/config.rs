//! Run configuration for the training pipeline

use crate::error::{FloodError, Result};
use crate::training::grid_search::ParamGrid;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Classifier family trained by a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    RandomForest,
    Svm,
    #[serde(rename = "xgboost")]
    XGBoost,
}

impl ModelKind {
    /// Name written to the run log and used for the bundle file name
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "Random Forest",
            ModelKind::Svm => "Support Vector Machine",
            ModelKind::XGBoost => "XGBoost (Tuned)",
        }
    }

    pub fn all() -> [ModelKind; 3] {
        [ModelKind::RandomForest, ModelKind::Svm, ModelKind::XGBoost]
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ModelKind {
    type Err = FloodError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "random_forest" | "rf" => Ok(ModelKind::RandomForest),
            "svm" | "support_vector_machine" => Ok(ModelKind::Svm),
            "xgboost" | "xgb" | "xgboost_tuned" => Ok(ModelKind::XGBoost),
            other => Err(FloodError::Config(format!(
                "unknown model '{}', expected one of: random_forest, svm, xgboost",
                other
            ))),
        }
    }
}

/// Where synthetic oversampling runs relative to the feature transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResamplePlacement {
    /// SMOTE on the engineered, unscaled table before the pipeline is fit
    #[default]
    BeforeTransform,
    /// SMOTE on the encoded matrix inside every pipeline fit
    AfterTransform,
}

impl FromStr for ResamplePlacement {
    type Err = FloodError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "before" | "before_transform" => Ok(ResamplePlacement::BeforeTransform),
            "after" | "after_transform" => Ok(ResamplePlacement::AfterTransform),
            other => Err(FloodError::Config(format!(
                "unknown resample placement '{}', expected 'before' or 'after'",
                other
            ))),
        }
    }
}

/// Random forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomForestParams {
    pub n_estimators: usize,
    /// `None` grows trees until leaves are pure
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

/// RBF support vector machine hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvmParams {
    pub c: f64,
    /// Explicit kernel width; `None` means `1 / (n_features * Var(X))`
    pub gamma: Option<f64>,
    pub tol: f64,
    pub max_iter: usize,
}

impl Default for SvmParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            gamma: None,
            tol: 1e-3,
            max_iter: 1000,
        }
    }
}

/// Grid search settings for the boosted model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSearchConfig {
    pub grid: ParamGrid,
    pub cv_folds: usize,
    /// Wall-clock limit for the whole search
    pub timeout_secs: Option<u64>,
}

impl Default for GridSearchConfig {
    fn default() -> Self {
        Self {
            grid: ParamGrid::default(),
            cv_folds: 3,
            timeout_secs: None,
        }
    }
}

/// Complete configuration for one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub target_column: String,
    pub test_size: f64,
    pub seed: u64,
    pub model: ModelKind,
    pub resample: ResamplePlacement,
    pub smote_k: usize,
    pub log_path: PathBuf,
    pub output_dir: PathBuf,
    pub notes: String,
    pub random_forest: RandomForestParams,
    pub svm: SvmParams,
    pub grid_search: GridSearchConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_column: "Flood Occurred".to_string(),
            test_size: 0.2,
            seed: 42,
            model: ModelKind::RandomForest,
            resample: ResamplePlacement::BeforeTransform,
            smote_k: 5,
            log_path: PathBuf::from("training_logs.csv"),
            output_dir: PathBuf::from("."),
            notes: String::new(),
            random_forest: RandomForestParams::default(),
            svm: SvmParams::default(),
            grid_search: GridSearchConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new(model: ModelKind) -> Self {
        Self {
            model,
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file; absent keys keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FloodError::Config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .map_err(|e| FloodError::Config(format!("invalid config {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_target_column(mut self, target: impl Into<String>) -> Self {
        self.target_column = target.into();
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_resample(mut self, placement: ResamplePlacement) -> Self {
        self.resample = placement;
        self
    }

    pub fn with_smote_k(mut self, k: usize) -> Self {
        self.smote_k = k;
        self
    }

    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = path.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_random_forest(mut self, params: RandomForestParams) -> Self {
        self.random_forest = params;
        self
    }

    pub fn with_svm(mut self, params: SvmParams) -> Self {
        self.svm = params;
        self
    }

    pub fn with_grid(mut self, grid: ParamGrid) -> Self {
        self.grid_search.grid = grid;
        self
    }

    pub fn with_grid_timeout(mut self, secs: u64) -> Self {
        self.grid_search.timeout_secs = Some(secs);
        self
    }

    /// Reject settings no run can succeed with
    pub fn validate(&self) -> Result<()> {
        if self.target_column.trim().is_empty() {
            return Err(invalid("target_column", &self.target_column, "must not be empty"));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(invalid("test_size", self.test_size, "must be in (0, 1)"));
        }
        if self.smote_k == 0 {
            return Err(invalid("smote_k", self.smote_k, "must be at least 1"));
        }
        if self.random_forest.n_estimators == 0 {
            return Err(invalid(
                "random_forest.n_estimators",
                self.random_forest.n_estimators,
                "must be at least 1",
            ));
        }
        if self.svm.c <= 0.0 {
            return Err(invalid("svm.c", self.svm.c, "must be positive"));
        }
        if let Some(gamma) = self.svm.gamma {
            if gamma <= 0.0 {
                return Err(invalid("svm.gamma", gamma, "must be positive"));
            }
        }
        if self.grid_search.cv_folds < 2 {
            return Err(invalid(
                "grid_search.cv_folds",
                self.grid_search.cv_folds,
                "must be at least 2",
            ));
        }
        self.grid_search.grid.validate()
    }
}

fn invalid(name: &str, value: impl fmt::Display, reason: &str) -> FloodError {
    FloodError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
