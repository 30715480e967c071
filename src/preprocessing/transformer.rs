//! Fit-once / apply-many feature transform

use super::{partition_columns, ColumnKind, OneHotEncoders, StandardScaler};
use crate::error::{FloodError, Result};
use ndarray::{concatenate, Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Scaled numeric block followed by one-hot indicator blocks.
///
/// Column kinds are decided at fit time; extra columns at transform time are
/// ignored and missing ones are a schema mismatch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTransformer {
    scaler: StandardScaler,
    encoders: OneHotEncoders,
    is_fitted: bool,
}

impl FeatureTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a transformer from previously fitted parts
    pub fn from_parts(scaler: StandardScaler, encoders: OneHotEncoders) -> Result<Self> {
        if !scaler.is_fitted() || !encoders.is_fitted() {
            return Err(FloodError::ModelNotFitted);
        }
        Ok(Self {
            scaler,
            encoders,
            is_fitted: true,
        })
    }

    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let (numeric, categorical) = partition_columns(df);
        if numeric.is_empty() && categorical.is_empty() {
            return Err(FloodError::Training("no feature columns to fit".to_string()));
        }

        let mut scaler = StandardScaler::new();
        scaler.fit(df, &numeric)?;
        let mut encoders = OneHotEncoders::new();
        encoders.fit(df, &categorical)?;

        debug!(
            numeric = numeric.len(),
            categorical = categorical.len(),
            width = scaler.columns().len() + encoders.n_outputs(),
            "Fitted feature transformer"
        );

        self.scaler = scaler;
        self.encoders = encoders;
        self.is_fitted = true;
        Ok(self)
    }

    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(FloodError::ModelNotFitted);
        }
        let numeric = self.scaler.transform(df)?;
        let indicators = self.encoders.transform(df)?;
        Ok(concatenate(Axis(1), &[numeric.view(), indicators.view()])?)
    }

    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<Array2<f64>> {
        self.fit(df)?;
        self.transform(df)
    }

    pub fn n_features_out(&self) -> usize {
        self.scaler.columns().len() + self.encoders.n_outputs()
    }

    pub fn feature_names_out(&self) -> Vec<String> {
        let mut names = self.scaler.columns().to_vec();
        names.extend(self.encoders.feature_names());
        names
    }

    /// Source columns and their kinds, numeric first
    pub fn input_columns(&self) -> Vec<(String, ColumnKind)> {
        self.scaler
            .columns()
            .iter()
            .map(|c| (c.clone(), ColumnKind::Numeric))
            .chain(
                self.encoders
                    .columns()
                    .iter()
                    .map(|c| (c.clone(), ColumnKind::Categorical)),
            )
            .collect()
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn encoders(&self) -> &OneHotEncoders {
        &self.encoders
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}
