//! Feature preprocessing
//!
//! - Column partition into numeric and categorical kinds
//! - Standard scaling for numeric columns (population statistics)
//! - One-hot encoding for categorical columns (sorted categories)
//! - `FeatureTransformer`: both fitted once and applied identically at
//!   training and inference time

mod scaler;
mod encoder;
mod transformer;

pub use scaler::StandardScaler;
pub use encoder::OneHotEncoders;
pub use transformer::FeatureTransformer;

use crate::error::{FloodError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of a feature column, derived from its dtype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// Integer, float and boolean dtypes are numeric; everything else is categorical
pub fn column_kind(dtype: &DataType) -> ColumnKind {
    match dtype {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64
        | DataType::Float32
        | DataType::Float64
        | DataType::Boolean => ColumnKind::Numeric,
        _ => ColumnKind::Categorical,
    }
}

/// Split column names by kind, preserving table order
pub fn partition_columns(df: &DataFrame) -> (Vec<String>, Vec<String>) {
    let mut numeric = Vec::new();
    let mut categorical = Vec::new();
    for column in df.get_columns() {
        let name = column.name().to_string();
        match column_kind(column.dtype()) {
            ColumnKind::Numeric => numeric.push(name),
            ColumnKind::Categorical => categorical.push(name),
        }
    }
    (numeric, categorical)
}

fn lookup<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name).map_err(|_| {
        FloodError::SchemaMismatch(format!("column '{}' is missing from the input", name))
    })
}

/// Values of a numeric column as f64
pub(crate) fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = lookup(df, name)?;
    if column_kind(column.dtype()) != ColumnKind::Numeric {
        return Err(FloodError::SchemaMismatch(format!(
            "column '{}' was numeric at fit time but has dtype {}",
            name,
            column.dtype()
        )));
    }

    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    series
        .f64()?
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| {
                FloodError::SchemaMismatch(format!("column '{}' contains missing values", name))
            })
        })
        .collect()
}

/// Values of any column rendered as strings
pub(crate) fn categorical_values(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let column = lookup(df, name)?;
    let series = column.as_materialized_series().cast(&DataType::String)?;
    series
        .str()?
        .into_iter()
        .map(|v| {
            v.map(str::to_string).ok_or_else(|| {
                FloodError::SchemaMismatch(format!("column '{}' contains missing values", name))
            })
        })
        .collect()
}
