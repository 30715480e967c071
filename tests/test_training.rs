//! Integration test: trainer variants on one table, determinism for a fixed seed

use flood_risk::config::{ModelKind, PipelineConfig, ResamplePlacement};
use flood_risk::export::ModelBundle;
use flood_risk::training::grid_search::ParamGrid;
use flood_risk::training::{Classifier, ModelTrainer, TrainedModel};
use ndarray::Array1;
use polars::prelude::*;

fn create_flood_dataset() -> (DataFrame, Array1<f64>) {
    let n = 80;
    let mut rainfall = Vec::with_capacity(n);
    let mut humidity = Vec::with_capacity(n);
    let mut temperature = Vec::with_capacity(n);
    let mut discharge = Vec::with_capacity(n);
    let mut water_level = Vec::with_capacity(n);
    let mut elevation = Vec::with_capacity(n);
    let mut land_cover = Vec::with_capacity(n);
    let mut target = Vec::with_capacity(n);

    for i in 0..n {
        let rank = (i * 29 % n) as f64;
        rainfall.push(rank * 3.5);
        humidity.push(40.0 + (i * 13 % 50) as f64);
        temperature.push(12.0 + (i % 17) as f64);
        discharge.push(200.0 + (i * 7 % 40) as f64 * 25.0);
        water_level.push(0.5 + (i * 11 % 16) as f64 * 0.4);
        elevation.push(3.0 + (i * 31 % 60) as f64 * 5.0);
        land_cover.push(["Urban", "Forest", "Agricultural", "Desert"][i % 4]);
        target.push(if rank >= 56.0 { 1.0 } else { 0.0 });
    }

    let df = df!(
        "Rainfall" => &rainfall,
        "Humidity" => &humidity,
        "Temperature" => &temperature,
        "River Discharge" => &discharge,
        "Water Level" => &water_level,
        "Elevation" => &elevation,
        "Land Cover" => &land_cover
    )
    .unwrap();
    (df, Array1::from_vec(target))
}

fn config(model: ModelKind) -> PipelineConfig {
    let mut config = PipelineConfig::new(model).with_seed(7).with_grid(ParamGrid {
        n_estimators: vec![15, 30],
        max_depth: vec![3],
        learning_rate: vec![0.1],
        subsample: vec![0.8],
        colsample_bytree: vec![0.8, 1.0],
    });
    config.random_forest.n_estimators = 40;
    config
}

fn train(model: ModelKind) -> TrainedModel {
    let (df, y) = create_flood_dataset();
    ModelTrainer::new(config(model)).train(&df, &y).unwrap()
}

#[test]
fn test_every_variant_is_deterministic() {
    let (df, _) = create_flood_dataset();
    for kind in ModelKind::all() {
        let first = train(kind);
        let second = train(kind);

        let p1 = first.pipeline.predict_proba(&df).unwrap();
        let p2 = second.pipeline.predict_proba(&df).unwrap();
        assert_eq!(p1, p2, "{} is not reproducible", kind);
        assert_eq!(first.params, second.params);
    }
}

#[test]
fn test_every_variant_learns_the_table() {
    let (df, y) = create_flood_dataset();
    for kind in ModelKind::all() {
        let model = train(kind);
        let predictions = model.pipeline.predict(&df).unwrap();
        let correct = predictions
            .iter()
            .zip(y.iter())
            .filter(|(p, t)| (*p - *t).abs() < 0.5)
            .count();
        assert!(
            correct as f64 / y.len() as f64 >= 0.8,
            "{} only got {}/{} right",
            kind,
            correct,
            y.len()
        );
    }
}

#[test]
fn test_xgboost_engineers_all_rules() {
    let model = train(ModelKind::XGBoost);
    let names: Vec<&str> = model.fired_rules.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Rainfall_Humidity", "Temp_Elevation", "Discharge_Level", "Rainfall_to_Elevation"]
    );
    let grid = model.grid_search.unwrap();
    assert_eq!(grid.scores.len(), 4);
    assert!((0.0..=1.0).contains(&grid.best_score));
}

#[test]
fn test_tree_models_report_importances() {
    for kind in [ModelKind::RandomForest, ModelKind::XGBoost] {
        let model = train(kind);
        let ranked = model.pipeline.ranked_importances().unwrap();
        let total: f64 = ranked.iter().map(|(_, v)| v).sum();
        assert!((total - 1.0).abs() < 1e-6, "{} importances sum to {}", kind, total);
    }
    assert!(train(ModelKind::Svm).pipeline.ranked_importances().is_none());
}

#[test]
fn test_placement_changes_rows_seen() {
    let (df, y) = create_flood_dataset();
    let before = ModelTrainer::new(config(ModelKind::RandomForest)).train(&df, &y).unwrap();
    let after = ModelTrainer::new(
        config(ModelKind::RandomForest).with_resample(ResamplePlacement::AfterTransform),
    )
    .train(&df, &y)
    .unwrap();

    // 56 negatives, 24 positives
    assert_eq!(before.train_rows, 112);
    assert_eq!(after.train_rows, 80);
}

#[test]
fn test_bundle_round_trip_keeps_predictions() {
    let (df, _) = create_flood_dataset();
    for kind in ModelKind::all() {
        let model = train(kind);
        let dir = tempfile::TempDir::new().unwrap();
        let bundle = ModelBundle::from_trained(&model, "Flood Occurred");
        let path = bundle.default_path(dir.path());
        bundle.save(&path).unwrap();

        let restored = ModelBundle::load(&path).unwrap();
        assert_eq!(restored.model.kind(), kind);
        let pipeline = restored.into_pipeline().unwrap();
        assert_eq!(
            pipeline.predict_proba(&df).unwrap(),
            model.pipeline.predict_proba(&df).unwrap()
        );
        assert_eq!(pipeline.classifier().params(), model.pipeline.classifier().params());
    }
}
