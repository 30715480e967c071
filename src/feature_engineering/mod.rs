//! Rule-driven derivation of interaction and ratio features
//!
//! Each rule fires only when both of its source columns are present. Source
//! columns are matched on a normalized key, so `"River Discharge"`,
//! `"river_discharge"` and `"RiverDischarge"` all resolve to the same column.

mod rules;

pub use rules::{random_forest_rules, svm_rules, xgboost_rules, EngineeringRule, Formula};

use crate::config::ModelKind;
use crate::data::column_key;
use crate::error::Result;
use crate::preprocessing::{column_kind, numeric_values, ColumnKind};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Applies a fixed list of engineering rules to a table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureEngineer {
    rules: Vec<EngineeringRule>,
}

impl FeatureEngineer {
    pub fn new(rules: Vec<EngineeringRule>) -> Self {
        Self { rules }
    }

    /// Rule set carried by a trainer variant
    pub fn for_model(kind: ModelKind) -> Self {
        let rules = match kind {
            ModelKind::RandomForest => random_forest_rules(),
            ModelKind::Svm => svm_rules(),
            ModelKind::XGBoost => xgboost_rules(),
        };
        Self::new(rules)
    }

    pub fn rules(&self) -> &[EngineeringRule] {
        &self.rules
    }

    /// Append one derived column per applicable rule.
    ///
    /// Returns the engineered table and the rules that fired. A column that
    /// already carries a derived name is replaced.
    pub fn apply(&self, df: &DataFrame) -> Result<(DataFrame, Vec<EngineeringRule>)> {
        let mut out = df.clone();
        let mut fired = Vec::new();

        for rule in &self.rules {
            let (left, right) = match (resolve(&out, &rule.left), resolve(&out, &rule.right)) {
                (Some(l), Some(r)) => (l, r),
                _ => {
                    debug!(rule = %rule.name, "Skipping rule, source column absent");
                    continue;
                }
            };

            let left_values = numeric_values(&out, &left)?;
            let right_values = numeric_values(&out, &right)?;
            let derived: Vec<f64> = left_values
                .iter()
                .zip(&right_values)
                .map(|(&l, &r)| rule.formula.apply(l, r))
                .collect();

            out.with_column(Column::new(rule.name.as_str().into(), derived))?;
            debug!(rule = %rule.name, left = %left, right = %right, "Derived feature");
            fired.push(rule.clone());
        }

        Ok((out, fired))
    }
}

/// Find the numeric column whose normalized name matches `wanted`
fn resolve(df: &DataFrame, wanted: &str) -> Option<String> {
    let key = column_key(wanted);
    let column = df
        .get_columns()
        .iter()
        .find(|c| column_key(c.name().as_str()) == key)?;

    if column_kind(column.dtype()) != ColumnKind::Numeric {
        warn!(column = %column.name(), "Engineering source column is not numeric");
        return None;
    }
    Some(column.name().to_string())
}
