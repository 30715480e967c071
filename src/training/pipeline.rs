//! Feature engineering + encoding + classifier, fit and applied as one unit

use super::{Classifier, TrainedClassifier};
use crate::error::{FloodError, Result};
use crate::feature_engineering::FeatureEngineer;
use crate::preprocessing::FeatureTransformer;
use crate::synthetic::Smote;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use tracing::debug;

/// End-to-end model: raw table in, labels or probabilities out.
///
/// Engineering runs on every raw input. When an oversampler is attached it
/// runs on the encoded matrix during `fit` only, never at prediction time.
#[derive(Debug, Clone)]
pub struct FloodPipeline {
    engineer: FeatureEngineer,
    transformer: FeatureTransformer,
    classifier: TrainedClassifier,
    oversampler: Option<Smote>,
}

impl FloodPipeline {
    pub fn new(engineer: FeatureEngineer, classifier: TrainedClassifier) -> Self {
        Self {
            engineer,
            transformer: FeatureTransformer::new(),
            classifier,
            oversampler: None,
        }
    }

    /// Oversample the encoded training matrix inside `fit`
    pub fn with_oversampler(mut self, smote: Smote) -> Self {
        self.oversampler = Some(smote);
        self
    }

    /// Reassemble an already fitted pipeline, e.g. from a saved bundle
    pub fn from_fitted(
        engineer: FeatureEngineer,
        transformer: FeatureTransformer,
        classifier: TrainedClassifier,
    ) -> Result<Self> {
        if !transformer.is_fitted() {
            return Err(FloodError::ModelNotFitted);
        }
        Ok(Self {
            engineer,
            transformer,
            classifier,
            oversampler: None,
        })
    }

    /// Engineer `raw`, then fit encoder and classifier
    pub fn fit(&mut self, raw: &DataFrame, y: &Array1<f64>) -> Result<&mut Self> {
        let (engineered, _) = self.engineer.apply(raw)?;
        self.fit_engineered(&engineered, y)
    }

    /// Fit on a table whose derived columns are already present
    pub fn fit_engineered(&mut self, engineered: &DataFrame, y: &Array1<f64>) -> Result<&mut Self> {
        if engineered.height() != y.len() {
            return Err(FloodError::Training(format!(
                "table has {} rows but {} labels were given",
                engineered.height(),
                y.len()
            )));
        }

        let mut transformer = FeatureTransformer::new();
        let x = transformer.fit_transform(engineered)?;

        let mut classifier = self.classifier.clone();
        match &self.oversampler {
            Some(smote) => {
                let resampled = smote.fit_resample(&x, y)?;
                debug!(
                    rows = resampled.x.nrows(),
                    synthetic = resampled.n_synthetic.values().sum::<usize>(),
                    "Oversampled encoded matrix"
                );
                classifier.fit(&resampled.x, &resampled.y)?;
            }
            None => classifier.fit(&x, y)?,
        }

        self.transformer = transformer;
        self.classifier = classifier;
        Ok(self)
    }

    /// Encoded matrix for a raw table
    pub fn transform(&self, raw: &DataFrame) -> Result<Array2<f64>> {
        let (engineered, _) = self.engineer.apply(raw)?;
        self.transformer.transform(&engineered)
    }

    pub fn predict(&self, raw: &DataFrame) -> Result<Array1<f64>> {
        self.classifier.predict(&self.transform(raw)?)
    }

    /// n × 2 matrix of [P(no flood), P(flood)]
    pub fn predict_proba(&self, raw: &DataFrame) -> Result<Array2<f64>> {
        self.classifier.predict_proba(&self.transform(raw)?)
    }

    /// Predict on a table that already went through the engineer
    pub fn predict_engineered(&self, engineered: &DataFrame) -> Result<Array1<f64>> {
        self.classifier.predict(&self.transformer.transform(engineered)?)
    }

    pub fn engineer(&self) -> &FeatureEngineer {
        &self.engineer
    }

    pub fn transformer(&self) -> &FeatureTransformer {
        &self.transformer
    }

    pub fn classifier(&self) -> &TrainedClassifier {
        &self.classifier
    }

    /// Importances paired with encoded feature names, largest first
    pub fn ranked_importances(&self) -> Option<Vec<(String, f64)>> {
        let importances = self.classifier.feature_importances()?;
        let mut ranked: Vec<(String, f64)> = self
            .transformer
            .feature_names_out()
            .into_iter()
            .zip(importances.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Some(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelKind;
    use crate::training::RandomForest;

    fn frame() -> (DataFrame, Array1<f64>) {
        let rainfall: Vec<f64> = (0..40).map(|i| i as f64 * 5.0).collect();
        let absorption: Vec<f64> = (0..40).map(|i| 0.5 + (i % 3) as f64 * 0.1).collect();
        let cover: Vec<&str> = (0..40).map(|i| if i % 2 == 0 { "Urban" } else { "Forest" }).collect();
        let y: Vec<f64> = (0..40).map(|i| if i >= 28 { 1.0 } else { 0.0 }).collect();
        let df = df! {
            "Rainfall" => rainfall,
            "Soil Absorption" => absorption,
            "Land Cover" => cover,
        }
        .unwrap();
        (df, Array1::from_vec(y))
    }

    #[test]
    fn test_fit_predict_raw_table() {
        let (df, y) = frame();
        let mut pipeline = FloodPipeline::new(
            FeatureEngineer::for_model(ModelKind::RandomForest),
            TrainedClassifier::RandomForest(RandomForest::new(20)),
        );
        pipeline.fit(&df, &y).unwrap();

        let names = pipeline.transformer().feature_names_out();
        assert!(names.contains(&"rainfall_absorption".to_string()));
        assert!(names.contains(&"Land Cover=Urban".to_string()));

        let preds = pipeline.predict(&df).unwrap();
        let correct = preds.iter().zip(y.iter()).filter(|(p, a)| p == a).count();
        assert!(correct >= 38);

        let proba = pipeline.predict_proba(&df).unwrap();
        assert_eq!(proba.dim(), (40, 2));
    }

    #[test]
    fn test_oversampler_inside_fit() {
        let (df, y) = frame();
        let mut pipeline = FloodPipeline::new(
            FeatureEngineer::default(),
            TrainedClassifier::RandomForest(RandomForest::new(10)),
        )
        .with_oversampler(Smote::new().with_seed(3));
        pipeline.fit(&df, &y).unwrap();
        assert_eq!(pipeline.predict(&df).unwrap().len(), 40);
    }

    #[test]
    fn test_ranked_importances() {
        let (df, y) = frame();
        let mut pipeline = FloodPipeline::new(
            FeatureEngineer::default(),
            TrainedClassifier::RandomForest(RandomForest::new(10)),
        );
        pipeline.fit(&df, &y).unwrap();
        let ranked = pipeline.ranked_importances().unwrap();
        assert_eq!(ranked.len(), pipeline.transformer().n_features_out());
        assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_missing_column_at_predict() {
        let (df, y) = frame();
        let mut pipeline = FloodPipeline::new(
            FeatureEngineer::default(),
            TrainedClassifier::RandomForest(RandomForest::new(5)),
        );
        pipeline.fit(&df, &y).unwrap();
        let partial = df.drop("Land Cover").unwrap();
        assert!(matches!(
            pipeline.predict(&partial),
            Err(FloodError::SchemaMismatch(_))
        ));
    }
}
