//! Distribution profile of a dataset (skewness, kurtosis, class balance)

use crate::error::Result;
use crate::preprocessing::{column_kind, ColumnKind};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Symmetry {
    Symmetric,
    PositivelySkewed,
    NegativelySkewed,
}

impl Symmetry {
    fn from_skewness(skew: f64) -> Self {
        if skew.abs() < 0.5 {
            Symmetry::Symmetric
        } else if skew > 0.5 {
            Symmetry::PositivelySkewed
        } else {
            Symmetry::NegativelySkewed
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Symmetry::Symmetric => "approximately symmetric",
            Symmetry::PositivelySkewed => "positively skewed (long right tail)",
            Symmetry::NegativelySkewed => "negatively skewed (long left tail)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tails {
    Heavy,
    Light,
    Normal,
}

impl Tails {
    /// Thresholds are compared against excess kurtosis
    fn from_kurtosis(kurt: f64) -> Self {
        if kurt > 3.0 {
            Tails::Heavy
        } else if kurt < 3.0 {
            Tails::Light
        } else {
            Tails::Normal
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Tails::Heavy => "heavy-tailed (more outliers)",
            Tails::Light => "light-tailed (fewer outliers)",
            Tails::Normal => "tails close to normal",
        }
    }
}

/// Shape statistics of one numeric column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub skewness: f64,
    /// Excess kurtosis (normal distribution = 0)
    pub kurtosis: f64,
    pub symmetry: Symmetry,
    pub tails: Tails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionProfile {
    pub n_rows: usize,
    pub columns: Vec<ColumnProfile>,
    /// Fraction of rows per target class
    pub class_balance: Option<BTreeMap<i64, f64>>,
}

impl fmt::Display for DistributionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<28} {:>10} {:>10}  interpretation", "column", "skewness", "kurtosis")?;
        for col in &self.columns {
            writeln!(
                f,
                "{:<28} {:>10.4} {:>10.4}  {}, {}",
                col.name,
                col.skewness,
                col.kurtosis,
                col.symmetry.describe(),
                col.tails.describe()
            )?;
        }
        if let Some(balance) = &self.class_balance {
            writeln!(f)?;
            writeln!(f, "class balance")?;
            for (class, share) in balance {
                writeln!(f, "  {:<4} {:>6.2}%", class, share * 100.0)?;
            }
        }
        Ok(())
    }
}

/// Profile every numeric column; the target (if given) is reported as class balance
pub fn profile_dataset(df: &DataFrame, target: Option<&str>) -> Result<DistributionProfile> {
    let mut columns = Vec::new();

    for column in df.get_columns() {
        let name = column.name().to_string();
        if Some(name.as_str()) == target {
            continue;
        }
        if column_kind(column.dtype()) != ColumnKind::Numeric {
            continue;
        }

        let series = column.as_materialized_series().cast(&DataType::Float64)?;
        let values: Vec<f64> = series.f64()?.into_iter().flatten().collect();
        let skewness = sample_skewness(&values);
        let kurtosis = sample_excess_kurtosis(&values);

        columns.push(ColumnProfile {
            name,
            skewness,
            kurtosis,
            symmetry: Symmetry::from_skewness(skewness),
            tails: Tails::from_kurtosis(kurtosis),
        });
    }

    let class_balance = match target {
        Some(target) if df.get_column_index(target).is_some() => {
            let series = df
                .column(target)?
                .as_materialized_series()
                .cast(&DataType::Float64)?;
            let labels: Vec<f64> = series.f64()?.into_iter().flatten().collect();
            let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
            for label in &labels {
                *counts.entry(*label as i64).or_insert(0) += 1;
            }
            let total = labels.len().max(1) as f64;
            Some(
                counts
                    .into_iter()
                    .map(|(class, count)| (class, count as f64 / total))
                    .collect(),
            )
        }
        _ => None,
    };

    Ok(DistributionProfile {
        n_rows: df.height(),
        columns,
        class_balance,
    })
}

fn central_moments(values: &[f64]) -> (f64, f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for &v in values {
        let d = v - mean;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    (m2 / n, m3 / n, m4 / n)
}

/// Bias-corrected sample skewness (G1)
fn sample_skewness(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if values.len() < 3 {
        return 0.0;
    }
    let (m2, m3, _) = central_moments(values);
    if m2 <= f64::EPSILON {
        return 0.0;
    }
    let g1 = m3 / m2.powf(1.5);
    g1 * (n * (n - 1.0)).sqrt() / (n - 2.0)
}

/// Bias-corrected sample excess kurtosis (G2)
fn sample_excess_kurtosis(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if values.len() < 4 {
        return 0.0;
    }
    let (m2, _, m4) = central_moments(values);
    if m2 <= f64::EPSILON {
        return 0.0;
    }
    let g2 = m4 / (m2 * m2) - 3.0;
    ((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_column() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!(sample_skewness(&values).abs() < 1e-12);
        assert!((sample_excess_kurtosis(&values) - (-1.2)).abs() < 1e-9);
    }

    #[test]
    fn test_right_skewed_column() {
        let values = [1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 3.0, 10.0];
        let skew = sample_skewness(&values);
        assert!(skew > 0.5);
        assert_eq!(Symmetry::from_skewness(skew), Symmetry::PositivelySkewed);
    }

    #[test]
    fn test_constant_column_profiles_as_zero() {
        let values = [2.0; 10];
        assert_eq!(sample_skewness(&values), 0.0);
        assert_eq!(sample_excess_kurtosis(&values), 0.0);
    }

    #[test]
    fn test_profile_dataset() {
        let df = df! {
            "Rainfall" => [1.0, 2.0, 3.0, 4.0, 5.0],
            "Land Cover" => ["a", "b", "a", "b", "a"],
            "Flood Occurred" => [0i64, 0, 0, 1, 1],
        }
        .unwrap();

        let profile = profile_dataset(&df, Some("Flood Occurred")).unwrap();
        assert_eq!(profile.columns.len(), 1, "only numeric non-target columns are profiled");
        assert_eq!(profile.columns[0].name, "Rainfall");
        assert_eq!(profile.columns[0].tails, Tails::Light);

        let balance = profile.class_balance.unwrap();
        assert!((balance[&0] - 0.6).abs() < 1e-12);
        assert!((balance[&1] - 0.4).abs() < 1e-12);
        assert!(profile_dataset(&df, None).unwrap().class_balance.is_none());
    }
}
