//! Standard scaling for numeric columns

use super::numeric_values;
use crate::error::{FloodError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// z-score scaler: `(x - mean) / std` with population std; zero std scales by 1
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<String>,
    means: Vec<f64>,
    scales: Vec<f64>,
    is_fitted: bool,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit on the given numeric columns, in the given order
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        let mut means = Vec::with_capacity(columns.len());
        let mut scales = Vec::with_capacity(columns.len());

        for name in columns {
            let values = numeric_values(df, name)?;
            let (mean, std) = population_stats(&values);
            means.push(mean);
            scales.push(if std > 0.0 { std } else { 1.0 });
        }

        self.columns = columns.to_vec();
        self.means = means;
        self.scales = scales;
        self.is_fitted = true;
        Ok(self)
    }

    /// Scale the fitted columns into an `n_rows x n_columns` matrix
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(FloodError::ModelNotFitted);
        }

        let mut out = Array2::zeros((df.height(), self.columns.len()));
        for (j, name) in self.columns.iter().enumerate() {
            let values = numeric_values(df, name)?;
            let (mean, scale) = (self.means[j], self.scales[j]);
            for (i, v) in values.into_iter().enumerate() {
                out[[i, j]] = (v - mean) / scale;
            }
        }
        Ok(out)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

fn population_stats(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 1.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}
