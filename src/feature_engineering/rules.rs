//! Derived-feature rules and the per-model rule sets

use serde::{Deserialize, Serialize};

/// How a derived column combines its two sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Formula {
    /// left * right
    Product,
    /// left / (right + 1)
    RatioPlusOne,
}

impl Formula {
    /// Non-finite results (a denominator of exactly zero) become 0.0
    pub fn apply(&self, left: f64, right: f64) -> f64 {
        let value = match self {
            Formula::Product => left * right,
            Formula::RatioPlusOne => left / (right + 1.0),
        };
        if value.is_finite() {
            value
        } else {
            0.0
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Formula::Product => "*",
            Formula::RatioPlusOne => "/(+1)",
        }
    }
}

/// One derived column built from two source columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineeringRule {
    pub name: String,
    pub left: String,
    pub right: String,
    pub formula: Formula,
}

impl EngineeringRule {
    pub fn new(
        name: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
        formula: Formula,
    ) -> Self {
        Self {
            name: name.into(),
            left: left.into(),
            right: right.into(),
            formula,
        }
    }

    pub fn product(name: &str, left: &str, right: &str) -> Self {
        Self::new(name, left, right, Formula::Product)
    }

    pub fn ratio_plus_one(name: &str, numerator: &str, denominator: &str) -> Self {
        Self::new(name, numerator, denominator, Formula::RatioPlusOne)
    }
}

pub fn random_forest_rules() -> Vec<EngineeringRule> {
    vec![
        EngineeringRule::product("rainfall_absorption", "Rainfall", "Soil Absorption"),
        EngineeringRule::product("slope_river_interaction", "Slope", "River Distance"),
    ]
}

pub fn svm_rules() -> Vec<EngineeringRule> {
    vec![
        EngineeringRule::product("rainfall_elevation_interaction", "Rainfall", "Elevation"),
        EngineeringRule::product("humid_temp_interaction", "Humidity", "Temperature"),
    ]
}

pub fn xgboost_rules() -> Vec<EngineeringRule> {
    vec![
        EngineeringRule::product("Rainfall_Humidity", "Rainfall", "Humidity"),
        EngineeringRule::product("Temp_Elevation", "Temperature", "Elevation"),
        EngineeringRule::product("Discharge_Level", "River Discharge", "Water Level"),
        EngineeringRule::ratio_plus_one("Rainfall_to_Elevation", "Rainfall", "Elevation"),
    ]
}
