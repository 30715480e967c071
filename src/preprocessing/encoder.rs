//! One-hot encoding for categorical columns

use super::categorical_values;
use crate::error::{FloodError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One encoder per categorical column; categories kept in sorted order.
/// A value not seen at fit time encodes as an all-zero block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoders {
    columns: Vec<String>,
    categories: Vec<Vec<String>>,
    is_fitted: bool,
}

impl OneHotEncoders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        let mut categories = Vec::with_capacity(columns.len());
        for name in columns {
            let observed: BTreeSet<String> = categorical_values(df, name)?.into_iter().collect();
            categories.push(observed.into_iter().collect());
        }

        self.columns = columns.to_vec();
        self.categories = categories;
        self.is_fitted = true;
        Ok(self)
    }

    /// Indicator matrix, columns grouped per source column in fit order
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(FloodError::ModelNotFitted);
        }

        let mut out = Array2::zeros((df.height(), self.n_outputs()));
        let mut offset = 0;
        for (name, categories) in self.columns.iter().zip(&self.categories) {
            let values = categorical_values(df, name)?;
            for (i, value) in values.iter().enumerate() {
                if let Ok(pos) = categories.binary_search(value) {
                    out[[i, offset + pos]] = 1.0;
                }
            }
            offset += categories.len();
        }
        Ok(out)
    }

    /// Total number of indicator columns
    pub fn n_outputs(&self) -> usize {
        self.categories.iter().map(Vec::len).sum()
    }

    /// `column=category` for every indicator, in output order
    pub fn feature_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .zip(&self.categories)
            .flat_map(|(name, cats)| cats.iter().map(move |c| format!("{}={}", name, c)))
            .collect()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn categories(&self, column: &str) -> Option<&[String]> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| self.categories[idx].as_slice())
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fitted() -> OneHotEncoders {
        let df = df! {
            "Land Cover" => ["Urban", "Forest", "Agricultural", "Forest"],
        }
        .unwrap();
        let mut encoders = OneHotEncoders::new();
        encoders.fit(&df, &["Land Cover".to_string()]).unwrap();
        encoders
    }

    #[test]
    fn test_sorted_categories() {
        let encoders = fitted();
        assert_eq!(
            encoders.categories("Land Cover").unwrap(),
            &["Agricultural", "Forest", "Urban"]
        );
        assert_eq!(
            encoders.feature_names(),
            vec!["Land Cover=Agricultural", "Land Cover=Forest", "Land Cover=Urban"]
        );
    }

    #[test]
    fn test_one_hot_rows() {
        let encoders = fitted();
        let df = df! { "Land Cover" => ["Urban", "Agricultural"] }.unwrap();
        let out = encoders.transform(&df).unwrap();
        assert_eq!(out.row(0).to_vec(), vec![0.0, 0.0, 1.0]);
        assert_eq!(out.row(1).to_vec(), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_unseen_category_is_all_zero() {
        let encoders = fitted();
        let df = df! { "Land Cover" => ["Desert"] }.unwrap();
        let out = encoders.transform(&df).unwrap();
        assert_eq!(out.shape(), &[1, 3]);
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_missing_column_is_schema_mismatch() {
        let encoders = fitted();
        let df = df! { "Soil Type" => ["Clay"] }.unwrap();
        assert!(matches!(
            encoders.transform(&df),
            Err(FloodError::SchemaMismatch(_))
        ));
    }
}
