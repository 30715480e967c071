//! Integration test: feature transform, engineering and oversampling on tables

use flood_risk::config::ModelKind;
use flood_risk::error::FloodError;
use flood_risk::feature_engineering::FeatureEngineer;
use flood_risk::preprocessing::FeatureTransformer;
use flood_risk::synthetic::{class_counts, Smote};
use ndarray::Array1;
use polars::prelude::*;

fn readings() -> (DataFrame, Array1<f64>) {
    let n = 30;
    let rainfall: Vec<f64> = (0..n).map(|i| 20.0 + i as f64 * 9.5).collect();
    let humidity: Vec<f64> = (0..n).map(|i| 45.0 + (i * 7 % 40) as f64).collect();
    let temperature: Vec<f64> = (0..n).map(|i| 15.0 + (i % 12) as f64).collect();
    let elevation: Vec<f64> = (0..n).map(|i| 2.0 + (i * 11 % 30) as f64 * 4.0).collect();
    let land_cover: Vec<&str> = (0..n)
        .map(|i| ["Urban", "Forest", "Agricultural", "Water Body"][i % 4])
        .collect();
    let soil_type: Vec<&str> = (0..n).map(|i| ["Clay", "Sandy", "Loam"][i % 3]).collect();
    let y: Vec<f64> = (0..n).map(|i| if i >= 22 { 1.0 } else { 0.0 }).collect();

    let df = df!(
        "Rainfall" => &rainfall,
        "Humidity" => &humidity,
        "Temperature" => &temperature,
        "Elevation" => &elevation,
        "Land Cover" => &land_cover,
        "Soil Type" => &soil_type
    )
    .unwrap();
    (df, Array1::from_vec(y))
}

#[test]
fn test_transform_is_idempotent() {
    let (df, _) = readings();
    let mut transformer = FeatureTransformer::new();
    let fitted = transformer.fit_transform(&df).unwrap();

    let again = transformer.transform(&df).unwrap();
    let third = transformer.transform(&df).unwrap();
    assert_eq!(fitted, again);
    assert_eq!(again, third);
}

#[test]
fn test_output_schema_is_stable() {
    let (df, _) = readings();
    let mut transformer = FeatureTransformer::new();
    transformer.fit(&df).unwrap();

    // 4 scaled + 4 land cover + 3 soil type
    assert_eq!(transformer.n_features_out(), 11);

    let subset = df.slice(0, 3);
    assert_eq!(transformer.transform(&subset).unwrap().ncols(), 11);

    let names = transformer.feature_names_out();
    assert_eq!(&names[..4], &["Rainfall", "Humidity", "Temperature", "Elevation"]);
    assert!(names.contains(&"Soil Type=Loam".to_string()));
}

#[test]
fn test_unseen_category_encodes_as_zeros() {
    let (df, _) = readings();
    let mut transformer = FeatureTransformer::new();
    transformer.fit(&df).unwrap();

    let unseen = df!(
        "Rainfall" => &[100.0],
        "Humidity" => &[60.0],
        "Temperature" => &[22.0],
        "Elevation" => &[30.0],
        "Land Cover" => &["Desert"],
        "Soil Type" => &["Peat"]
    )
    .unwrap();
    let row = transformer.transform(&unseen).unwrap();
    assert_eq!(row.ncols(), 11);
    assert!(row.row(0).iter().skip(4).all(|&v| v == 0.0));
}

#[test]
fn test_missing_column_is_schema_mismatch() {
    let (df, _) = readings();
    let mut transformer = FeatureTransformer::new();
    transformer.fit(&df).unwrap();

    let without_soil = df.drop("Soil Type").unwrap();
    assert!(matches!(
        transformer.transform(&without_soil),
        Err(FloodError::SchemaMismatch(_))
    ));
}

#[test]
fn test_engineering_depends_on_present_columns() {
    let (df, _) = readings();

    let (svm, fired) = FeatureEngineer::for_model(ModelKind::Svm).apply(&df).unwrap();
    assert_eq!(fired.len(), 2);
    assert!(svm.column("rainfall_elevation_interaction").is_ok());
    assert!(svm.column("humid_temp_interaction").is_ok());

    let (rf, fired) = FeatureEngineer::for_model(ModelKind::RandomForest).apply(&df).unwrap();
    assert!(fired.is_empty());
    assert_eq!(rf.width(), df.width());
}

#[test]
fn test_smote_balances_table() {
    let (df, y) = readings();
    let (resampled, labels) = Smote::new().with_seed(42).fit_resample_frame(&df, &y).unwrap();

    let counts = class_counts(&labels);
    assert_eq!(counts[&0], 22);
    assert_eq!(counts[&1], 22);
    assert_eq!(resampled.height(), 44);
    assert_eq!(resampled.width(), df.width());

    // Synthetic rows copy categories from real rows
    let covers = resampled
        .column("Land Cover")
        .unwrap()
        .as_materialized_series()
        .str()
        .unwrap();
    assert!(covers
        .into_iter()
        .flatten()
        .all(|c| ["Urban", "Forest", "Agricultural", "Water Body"].contains(&c)));
}

#[test]
fn test_smote_rejects_tiny_minority() {
    let (df, _) = readings();
    let y = Array1::from_iter((0..30).map(|i| if i < 3 { 1.0 } else { 0.0 }));
    assert!(matches!(
        Smote::new().fit_resample_frame(&df, &y),
        Err(FloodError::Imbalance(_))
    ));
}
