//! Inference over a saved model bundle
//!
//! - `Observation`: the 13 environmental readings of one location
//! - `FloodPredictor`: loads a bundle once and scores observations
//! - `weather`: optional fill of temperature, humidity and rainfall

pub mod weather;

use crate::error::{FloodError, Result};
use crate::export::{BundleMetadata, ModelBundle};
use crate::preprocessing::OneHotEncoders;
use crate::training::FloodPipeline;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Readings for one location, named after the dataset columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Observation {
    pub latitude: f64,
    pub longitude: f64,
    pub rainfall: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub river_discharge: f64,
    pub water_level: f64,
    pub elevation: f64,
    pub land_cover: i64,
    pub soil_type: i64,
    pub population_density: f64,
    pub infrastructure: i64,
    pub historical_floods: i64,
}

impl Default for Observation {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            rainfall: 0.0,
            temperature: 25.0,
            humidity: 70.0,
            river_discharge: 0.0,
            water_level: 0.0,
            elevation: 0.0,
            land_cover: 2,
            soil_type: 1,
            population_density: 500.0,
            infrastructure: 2,
            historical_floods: 1,
        }
    }
}

fn parse_or_zero(text: &str) -> f64 {
    text.trim().parse().unwrap_or(0.0)
}

impl Observation {
    /// Build from free-text form fields keyed by column name
    /// (`"Rainfall"`, `"River Discharge"`, ...). Absent fields keep their
    /// defaults; present fields that do not parse become 0.
    pub fn from_form(fields: &HashMap<String, String>) -> Self {
        let mut obs = Self::default();
        for (name, text) in fields {
            let value = parse_or_zero(text);
            match crate::data::column_key(name).as_str() {
                "latitude" => obs.latitude = value,
                "longitude" => obs.longitude = value,
                "rainfall" => obs.rainfall = value,
                "temperature" => obs.temperature = value,
                "humidity" => obs.humidity = value,
                "riverdischarge" => obs.river_discharge = value,
                "waterlevel" => obs.water_level = value,
                "elevation" => obs.elevation = value,
                "landcover" => obs.land_cover = value as i64,
                "soiltype" => obs.soil_type = value as i64,
                "populationdensity" => obs.population_density = value,
                "infrastructure" => obs.infrastructure = value as i64,
                "historicalfloods" => obs.historical_floods = value as i64,
                other => debug!(field = other, "Ignoring unknown form field"),
            }
        }
        obs
    }

    /// One-row table with the dataset's column names
    pub fn to_frame(&self) -> Result<DataFrame> {
        let df = df! {
            "Latitude" => [self.latitude],
            "Longitude" => [self.longitude],
            "Rainfall" => [self.rainfall],
            "Temperature" => [self.temperature],
            "Humidity" => [self.humidity],
            "River Discharge" => [self.river_discharge],
            "Water Level" => [self.water_level],
            "Elevation" => [self.elevation],
            "Land Cover" => [self.land_cover],
            "Soil Type" => [self.soil_type],
            "Population Density" => [self.population_density],
            "Infrastructure" => [self.infrastructure],
            "Historical Floods" => [self.historical_floods],
        }?;
        Ok(df)
    }

    /// The integer-coded selections, keyed by dataset column name
    fn category_codes(&self) -> [(&'static str, i64); 4] {
        [
            ("Land Cover", self.land_cover),
            ("Soil Type", self.soil_type),
            ("Infrastructure", self.infrastructure),
            ("Historical Floods", self.historical_floods),
        ]
    }

    /// Like [`to_frame`](Self::to_frame), but a code whose column was
    /// string-typed at fit time is replaced by the fitted category at that
    /// position in sorted order. Codes for numeric columns pass through.
    pub fn to_frame_for(&self, encoders: &OneHotEncoders) -> Result<DataFrame> {
        let mut df = self.to_frame()?;
        for (name, code) in self.category_codes() {
            let key = crate::data::column_key(name);
            let Some(fitted) = encoders
                .columns()
                .iter()
                .find(|c| crate::data::column_key(c) == key)
            else {
                continue;
            };
            let categories = encoders.categories(fitted).unwrap_or_default();
            let category = usize::try_from(code)
                .ok()
                .and_then(|idx| categories.get(idx))
                .ok_or_else(|| {
                    FloodError::SchemaMismatch(format!(
                        "'{}' code {} is out of range; the model knows {} categories",
                        fitted,
                        code,
                        categories.len()
                    ))
                })?;
            debug!(column = %fitted, code, category = %category, "Mapped form code to category");
            df.drop_in_place(name)?;
            df.with_column(Column::new(fitted.as_str().into(), [category.as_str()]))?;
        }
        Ok(df)
    }
}

/// Verdict for one observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// 1 when flooding is predicted
    pub label: u8,
    /// [P(no flood), P(flood)]
    pub probability: Option<[f64; 2]>,
}

impl Prediction {
    pub fn is_flood_likely(&self) -> bool {
        self.label == 1
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.is_flood_likely() {
            "High Risk: Flood Likely!"
        } else {
            "Safe: Flood Not Likely"
        };
        match self.probability {
            Some([_, p]) => write!(f, "{} (flood probability {:.1}%)", verdict, p * 100.0),
            None => f.write_str(verdict),
        }
    }
}

/// Scores observations with a pipeline restored from a bundle
#[derive(Debug, Clone)]
pub struct FloodPredictor {
    pipeline: FloodPipeline,
    metadata: BundleMetadata,
}

impl FloodPredictor {
    pub fn from_bundle(bundle: ModelBundle) -> Result<Self> {
        let metadata = bundle.metadata.clone();
        let pipeline = bundle.into_pipeline()?;
        Ok(Self { pipeline, metadata })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let predictor = Self::from_bundle(ModelBundle::load(path)?)?;
        info!(
            path = %path.display(),
            model = %predictor.metadata.model_name,
            "Loaded predictor"
        );
        Ok(predictor)
    }

    pub fn metadata(&self) -> &BundleMetadata {
        &self.metadata
    }

    pub fn predict(&self, observation: &Observation) -> Result<Prediction> {
        let frame = observation.to_frame_for(self.pipeline.transformer().encoders())?;
        let mut predictions = self.predict_frame(&frame)?;
        predictions
            .pop()
            .ok_or_else(|| FloodError::Training("no prediction produced".to_string()))
    }

    /// One prediction per row of a raw table
    pub fn predict_frame(&self, df: &DataFrame) -> Result<Vec<Prediction>> {
        let labels = self.pipeline.predict(df)?;
        let proba = self.pipeline.predict_proba(df)?;
        Ok(labels
            .iter()
            .zip(proba.rows())
            .map(|(&label, p)| Prediction {
                label: u8::from(label > 0.5),
                probability: Some([p[0], p[1]]),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let obs = Observation::default();
        assert_eq!(obs.temperature, 25.0);
        assert_eq!(obs.humidity, 70.0);
        assert_eq!(obs.land_cover, 2);
        assert_eq!(obs.soil_type, 1);
        assert_eq!(obs.population_density, 500.0);
        assert_eq!(obs.infrastructure, 2);
        assert_eq!(obs.historical_floods, 1);
    }

    #[test]
    fn test_from_form() {
        let fields: HashMap<String, String> = [
            ("Rainfall", "120.5"),
            ("River Discharge", "3000"),
            ("Latitude", "not a number"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let obs = Observation::from_form(&fields);
        assert_eq!(obs.rainfall, 120.5);
        assert_eq!(obs.river_discharge, 3000.0);
        assert_eq!(obs.latitude, 0.0);
        assert_eq!(obs.temperature, 25.0);
    }

    #[test]
    fn test_to_frame_columns() {
        let df = Observation::default().to_frame().unwrap();
        assert_eq!(df.shape(), (1, 13));
        assert!(df.column("River Discharge").is_ok());
        assert!(df.column("Historical Floods").is_ok());
    }

    fn cover_encoders() -> OneHotEncoders {
        let df = df! {
            "Land Cover" => ["Urban", "Forest", "Agricultural", "Desert", "Water Body"],
        }
        .unwrap();
        let mut encoders = OneHotEncoders::new();
        encoders.fit(&df, &["Land Cover".to_string()]).unwrap();
        encoders
    }

    #[test]
    fn test_to_frame_for_maps_codes_to_categories() {
        let obs = Observation {
            land_cover: 2,
            ..Observation::default()
        };
        let df = obs.to_frame_for(&cover_encoders()).unwrap();
        assert_eq!(df.width(), 13);

        let cover = df.column("Land Cover").unwrap().as_materialized_series().clone();
        assert_eq!(cover.str().unwrap().get(0), Some("Forest"));
        // Numeric-coded columns are untouched
        assert_eq!(df.column("Soil Type").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn test_to_frame_for_rejects_unknown_code() {
        for code in [5, -1] {
            let obs = Observation {
                land_cover: code,
                ..Observation::default()
            };
            assert!(matches!(
                obs.to_frame_for(&cover_encoders()),
                Err(FloodError::SchemaMismatch(_))
            ));
        }
    }

    #[test]
    fn test_prediction_display() {
        let p = Prediction {
            label: 1,
            probability: Some([0.2, 0.8]),
        };
        assert!(p.to_string().starts_with("High Risk"));
        assert!(p.to_string().contains("80.0%"));
    }
}
