//! Live weather fill for observations

use super::Observation;
use crate::error::{FloodError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Current conditions at a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub location: String,
    pub region: String,
    pub country: String,
    pub temperature_c: f64,
    pub humidity: f64,
    pub precipitation_mm: f64,
    pub condition: String,
}

/// Anything that can report current weather for a named place
pub trait WeatherSource: Send + Sync {
    fn current(&self, location: &str) -> Result<WeatherReport>;
}

/// Reads a saved weatherapi.com `current.json` response from disk
#[derive(Debug, Clone)]
pub struct JsonSnapshotWeather {
    path: PathBuf,
}

#[derive(Deserialize)]
struct ApiResponse {
    location: ApiLocation,
    current: ApiCurrent,
}

#[derive(Deserialize)]
struct ApiLocation {
    name: String,
    #[serde(default)]
    region: String,
    #[serde(default)]
    country: String,
}

#[derive(Deserialize)]
struct ApiCurrent {
    temp_c: f64,
    humidity: f64,
    #[serde(default)]
    precip_mm: f64,
    condition: ApiCondition,
}

#[derive(Deserialize)]
struct ApiCondition {
    text: String,
}

impl JsonSnapshotWeather {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse a response body
    pub fn parse(body: &str) -> Result<WeatherReport> {
        let response: ApiResponse = serde_json::from_str(body)
            .map_err(|e| FloodError::ExternalService(format!("unexpected weather response: {}", e)))?;
        Ok(WeatherReport {
            location: response.location.name,
            region: response.location.region,
            country: response.location.country,
            temperature_c: response.current.temp_c,
            humidity: response.current.humidity,
            precipitation_mm: response.current.precip_mm,
            condition: response.current.condition.text,
        })
    }
}

impl WeatherSource for JsonSnapshotWeather {
    fn current(&self, location: &str) -> Result<WeatherReport> {
        let body = std::fs::read_to_string(&self.path).map_err(|e| {
            FloodError::ExternalService(format!(
                "weather snapshot {} unavailable: {}",
                self.path.display(),
                e
            ))
        })?;
        let report = Self::parse(&body)?;
        if !report.location.eq_ignore_ascii_case(location) {
            warn!(
                requested = location,
                snapshot = %report.location,
                "Weather snapshot is for a different location"
            );
        }
        Ok(report)
    }
}

/// Fill temperature, humidity and rainfall from `source`.
///
/// A failing source leaves the observation untouched and returns `None`.
pub fn apply_weather(
    observation: &mut Observation,
    source: &dyn WeatherSource,
    location: &str,
) -> Option<WeatherReport> {
    match source.current(location) {
        Ok(report) => {
            observation.temperature = report.temperature_c;
            observation.humidity = report.humidity;
            observation.rainfall = report.precipitation_mm;
            info!(
                location = %report.location,
                temperature_c = report.temperature_c,
                humidity = report.humidity,
                precipitation_mm = report.precipitation_mm,
                condition = %report.condition,
                "Applied live weather"
            );
            Some(report)
        }
        Err(e) => {
            warn!(location, error = %e, "Weather lookup failed, keeping entered values");
            None
        }
    }
}
