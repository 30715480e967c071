//! Builds and fits one pipeline per model kind

use super::grid_search::{CancellationToken, GridSearch, GridSearchResult};
use super::svm::MAX_KERNEL_MATRIX_SAMPLES;
use super::{
    Classifier, FloodPipeline, RandomForest, SVMClassifier, TrainedClassifier, XGBoostClassifier,
    XGBoostParams,
};
use crate::config::{ModelKind, PipelineConfig, ResamplePlacement};
use crate::data::take_rows;
use crate::error::{FloodError, Result};
use crate::evaluation::accuracy_score;
use crate::feature_engineering::{EngineeringRule, FeatureEngineer};
use crate::synthetic::{class_counts, Smote};
use ndarray::{Array1, Axis};
use polars::prelude::*;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::info;

/// A fitted pipeline with the facts the run log needs
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub pipeline: FloodPipeline,
    pub model_name: String,
    pub kind: ModelKind,
    /// Final classifier hyperparameters as a JSON object
    pub params: serde_json::Value,
    /// Engineering rules that produced a column for this data
    pub fired_rules: Vec<EngineeringRule>,
    /// Rows the classifier saw, after any oversampling before the transform
    pub train_rows: usize,
    pub grid_search: Option<GridSearchResult>,
}

/// Trains the configured model variant
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    config: PipelineConfig,
    token: CancellationToken,
}

impl ModelTrainer {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            token: CancellationToken::new(),
        }
    }

    /// Share a token with the caller so the grid search can be stopped
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn smote(&self) -> Smote {
        Smote::new()
            .with_k_neighbors(self.config.smote_k)
            .with_seed(self.config.seed)
    }

    /// Engineer, oversample, and fit on raw features `x` with labels `y`
    pub fn train(&self, x: &DataFrame, y: &Array1<f64>) -> Result<TrainedModel> {
        check_inputs(x, y)?;
        let kind = self.config.model;
        if kind == ModelKind::Svm {
            check_svm_capacity(y)?;
        }
        let start = Instant::now();

        let engineer = FeatureEngineer::for_model(kind);
        let (engineered, fired_rules) = engineer.apply(x)?;

        let (train_df, train_y) = match self.config.resample {
            ResamplePlacement::BeforeTransform => self.smote().fit_resample_frame(&engineered, y)?,
            ResamplePlacement::AfterTransform => (engineered, y.clone()),
        };

        let (classifier, grid_search) = match kind {
            ModelKind::RandomForest => (
                TrainedClassifier::RandomForest(RandomForest::from_params(
                    &self.config.random_forest,
                    self.config.seed,
                )),
                None,
            ),
            ModelKind::Svm => (
                TrainedClassifier::Svm(SVMClassifier::from_params(&self.config.svm, self.config.seed)),
                None,
            ),
            ModelKind::XGBoost => {
                let result = self.search_boosting(&engineer, &train_df, &train_y)?;
                let params = result.best.apply(&self.boosting_base());
                (
                    TrainedClassifier::XGBoost(XGBoostClassifier::new(params)),
                    Some(result),
                )
            }
        };

        let mut pipeline = self.assemble(engineer, classifier);
        pipeline.fit_engineered(&train_df, &train_y)?;

        let mut params = pipeline.classifier().params();
        if let (Some(result), Some(map)) = (&grid_search, params.as_object_mut()) {
            map.insert("cv_accuracy".to_string(), json!(result.best_score));
        }

        let counts = class_counts(&train_y);
        info!(
            model = kind.display_name(),
            train_rows = train_df.height(),
            negatives = counts.get(&0).copied().unwrap_or(0),
            positives = counts.get(&1).copied().unwrap_or(0),
            rules_fired = fired_rules.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Trained model"
        );

        Ok(TrainedModel {
            pipeline,
            model_name: kind.display_name().to_string(),
            kind,
            params,
            fired_rules,
            train_rows: train_df.height(),
            grid_search,
        })
    }

    fn assemble(&self, engineer: FeatureEngineer, classifier: TrainedClassifier) -> FloodPipeline {
        let pipeline = FloodPipeline::new(engineer, classifier);
        match self.config.resample {
            ResamplePlacement::AfterTransform => pipeline.with_oversampler(self.smote()),
            ResamplePlacement::BeforeTransform => pipeline,
        }
    }

    fn boosting_base(&self) -> XGBoostParams {
        XGBoostParams {
            random_state: self.config.seed,
            ..Default::default()
        }
    }

    /// Cross-validated grid search over an engineered table
    fn search_boosting(
        &self,
        engineer: &FeatureEngineer,
        train_df: &DataFrame,
        train_y: &Array1<f64>,
    ) -> Result<GridSearchResult> {
        let settings = &self.config.grid_search;
        let mut search = GridSearch::new(settings.grid.clone())
            .with_cv_folds(settings.cv_folds)
            .with_cancellation(self.token.clone());
        if let Some(secs) = settings.timeout_secs {
            search = search.with_timeout(Duration::from_secs(secs));
        }

        let base = self.boosting_base();
        search.run(train_y, |point, split| {
            let fold_x = take_rows(train_df, &split.train_indices)?;
            let fold_y = train_y.select(Axis(0), &split.train_indices);
            let val_x = take_rows(train_df, &split.test_indices)?;
            let val_y = train_y.select(Axis(0), &split.test_indices);

            let classifier = TrainedClassifier::XGBoost(XGBoostClassifier::new(point.apply(&base)));
            let mut pipeline = self.assemble(engineer.clone(), classifier);
            pipeline.fit_engineered(&fold_x, &fold_y)?;
            let predictions = pipeline.predict_engineered(&val_x)?;
            Ok(accuracy_score(&val_y, &predictions))
        })
    }
}

fn check_inputs(x: &DataFrame, y: &Array1<f64>) -> Result<()> {
    if x.height() != y.len() {
        return Err(FloodError::Training(format!(
            "feature table has {} rows but {} labels were given",
            x.height(),
            y.len()
        )));
    }
    if x.width() == 0 {
        return Err(FloodError::Training("feature table has no columns".to_string()));
    }
    if x.height() == 0 {
        return Err(FloodError::Training("feature table is empty".to_string()));
    }
    if let Some(bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
        return Err(FloodError::Training(format!(
            "labels must be 0 or 1, found {}",
            bad
        )));
    }
    Ok(())
}

/// Oversampling lifts every class to the majority count, so the SVM sees
/// `majority * classes` rows whichever placement is configured
fn check_svm_capacity(y: &Array1<f64>) -> Result<()> {
    let counts = class_counts(y);
    let majority = counts.values().copied().max().unwrap_or(0);
    let balanced = majority * counts.len();
    if balanced > MAX_KERNEL_MATRIX_SAMPLES {
        return Err(FloodError::Training(format!(
            "{} training rows after oversampling exceed the SVM limit of {}; \
             use random_forest or xgboost, or a smaller sample",
            balanced, MAX_KERNEL_MATRIX_SAMPLES
        )));
    }
    Ok(())
}
