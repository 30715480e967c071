//! Dataset loading, cleaning and splitting
//!
//! The loader turns a CSV or XLSX file into a clean `DataFrame`
//! (normalized headers, no missing values). `extract_labels` separates the
//! binary target and `stratified_split` produces the held-out test set.

mod loader;
mod split;
pub mod profile;

pub use loader::{normalize_header, DatasetLoader};
pub use split::{stratified_split, TrainTestSplit};
pub(crate) use split::take_rows;

use crate::error::{FloodError, Result};
use ndarray::Array1;
use polars::prelude::*;

/// Comparison key for column names: lowercase alphanumerics only
pub fn column_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Split a table into its feature columns and a binary label vector
pub fn extract_labels(df: &DataFrame, target: &str) -> Result<(DataFrame, Array1<f64>)> {
    let column = df.column(target).map_err(|_| {
        FloodError::SchemaMismatch(format!("target column '{}' not found", target))
    })?;

    let labels = column
        .as_materialized_series()
        .cast(&DataType::Float64)
        .map_err(|e| FloodError::Training(format!("target '{}' is not numeric: {}", target, e)))?;
    let ca = labels.f64()?;

    let mut y = Vec::with_capacity(ca.len());
    for value in ca.into_iter() {
        match value {
            Some(v) if v == 0.0 || v == 1.0 => y.push(v),
            Some(v) => {
                return Err(FloodError::Training(format!(
                    "target '{}' must be binary (0/1), found {}",
                    target, v
                )))
            }
            None => {
                return Err(FloodError::Training(format!(
                    "target '{}' contains missing values",
                    target
                )))
            }
        }
    }

    let features = df.drop(target)?;
    if features.width() == 0 {
        return Err(FloodError::Training(
            "no feature columns remain after removing the target".to_string(),
        ));
    }
    if features.height() == 0 {
        return Err(FloodError::Training("feature table is empty".to_string()));
    }

    Ok((features, Array1::from_vec(y)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_key() {
        assert_eq!(column_key("River Discharge"), "riverdischarge");
        assert_eq!(column_key("river_discharge"), "riverdischarge");
        assert_eq!(column_key("RiverDischarge"), "riverdischarge");
    }

    #[test]
    fn test_extract_labels() {
        let df = df! {
            "Rainfall" => [10.0, 20.0, 30.0],
            "Flood Occurred" => [0i64, 1, 0],
        }
        .unwrap();

        let (x, y) = extract_labels(&df, "Flood Occurred").unwrap();
        assert_eq!(x.width(), 1);
        assert_eq!(y.to_vec(), vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_extract_labels_rejects_non_binary() {
        let df = df! {
            "Rainfall" => [10.0, 20.0],
            "Flood Occurred" => [0i64, 2],
        }
        .unwrap();

        assert!(matches!(
            extract_labels(&df, "Flood Occurred"),
            Err(FloodError::Training(_))
        ));
    }

    #[test]
    fn test_extract_labels_requires_features() {
        let df = df! { "Flood Occurred" => [0i64, 1] }.unwrap();
        assert!(matches!(
            extract_labels(&df, "Flood Occurred"),
            Err(FloodError::Training(_))
        ));
    }

    #[test]
    fn test_extract_labels_missing_target() {
        let df = df! { "Rainfall" => [1.0] }.unwrap();
        assert!(matches!(
            extract_labels(&df, "Flood Occurred"),
            Err(FloodError::SchemaMismatch(_))
        ));
    }
}
