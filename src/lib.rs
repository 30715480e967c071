//! flood-risk - training pipeline and inference for flood-risk classifiers
//!
//! A dataset of environmental readings (rainfall, river discharge, water
//! level, elevation, land cover, ...) with a binary `Flood Occurred` label is
//! cleaned, enriched with derived features, balanced with SMOTE and used to
//! fit one of three classifier variants. Every run is evaluated on a
//! stratified hold-out, appended to a CSV run log and saved as a bundle that
//! the inference side loads without refitting.
//!
//! # Modules
//!
//! ## Pipeline stages
//! - [`data`] - CSV/XLSX loading, header cleanup, stratified split, profiling
//! - [`feature_engineering`] - Declarative derived-feature rules
//! - [`preprocessing`] - One-hot encoding and standard scaling
//! - [`synthetic`] - SMOTE oversampling
//! - [`training`] - Random forest, SVM, boosted trees, grid search, pipeline
//! - [`calibration`] - Platt scaling for SVM probabilities
//! - [`evaluation`] - Accuracy, classification report, confusion matrix
//!
//! ## Persistence
//! - [`tracking`] - CSV run log with sequential run ids
//! - [`export`] - Model bundle (classifier + scaler + encoders)
//!
//! ## Entry points
//! - [`workflow`] - One complete training run
//! - [`inference`] - Bundle-backed predictor and weather fill
//! - [`cli`] - Command-line interface

pub mod error;
pub mod config;

pub mod data;
pub mod feature_engineering;
pub mod preprocessing;
pub mod synthetic;
pub mod training;
pub mod calibration;
pub mod evaluation;

pub mod tracking;
pub mod export;

pub mod workflow;
pub mod inference;
pub mod cli;

pub use error::{FloodError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{FloodError, Result};

    pub use crate::config::{ModelKind, PipelineConfig, ResamplePlacement};
    pub use crate::data::{extract_labels, stratified_split, DatasetLoader, TrainTestSplit};
    pub use crate::feature_engineering::{EngineeringRule, FeatureEngineer, Formula};
    pub use crate::preprocessing::{FeatureTransformer, OneHotEncoders, StandardScaler};
    pub use crate::synthetic::Smote;

    pub use crate::training::grid_search::{CancellationToken, GridSearch, ParamGrid};
    pub use crate::training::{
        Classifier, FloodPipeline, ModelTrainer, RandomForest, SVMClassifier, TrainedClassifier,
        TrainedModel, XGBoostClassifier,
    };

    pub use crate::evaluation::{ClassificationReport, ConfusionMatrix, Evaluation, Evaluator};
    pub use crate::tracking::{RunLogger, RunRecord};
    pub use crate::export::{BundleMetadata, ModelBundle};
    pub use crate::inference::weather::{apply_weather, JsonSnapshotWeather, WeatherReport, WeatherSource};
    pub use crate::inference::{FloodPredictor, Observation, Prediction};
    pub use crate::workflow::{run_training, TrainingOutcome};
}
