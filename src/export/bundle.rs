//! Bundle save/load in JSON or SHA-256 checked binary form

use crate::error::{FloodError, Result};
use crate::feature_engineering::{EngineeringRule, FeatureEngineer};
use crate::preprocessing::{FeatureTransformer, OneHotEncoders, StandardScaler};
use crate::training::{FloodPipeline, TrainedClassifier, TrainedModel};
use chrono::Local;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const BUNDLE_MAGIC: &[u8; 4] = b"FLDB";
pub const BUNDLE_FORMAT_VERSION: u32 = 2;

const DIGEST_LEN: usize = 32;
const HEADER_LEN: usize = 4 + 4 + DIGEST_LEN;

/// Descriptive facts stored next to the fitted parts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleMetadata {
    pub model_name: String,
    pub target_column: String,
    /// Rules replayed on raw input before the transform
    pub rules: Vec<EngineeringRule>,
    /// Columns the transformer reads, after engineering
    pub feature_columns: Vec<String>,
    /// Classifier hyperparameters as a JSON string
    pub params: String,
    pub created_at: String,
    pub crate_version: String,
}

/// Fitted model, scaler and encoders saved as one artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    pub model: TrainedClassifier,
    pub scaler: StandardScaler,
    pub encoders: OneHotEncoders,
    pub metadata: BundleMetadata,
}

/// On-disk layout; every part is optional so a missing one can be reported
#[derive(Serialize, Deserialize)]
struct StoredBundle {
    #[serde(default)]
    model: Option<TrainedClassifier>,
    #[serde(default)]
    scaler: Option<StandardScaler>,
    #[serde(default)]
    encoders: Option<OneHotEncoders>,
    #[serde(default)]
    metadata: Option<BundleMetadata>,
}

/// `"Random Forest"` → `"Random_Forest_model.bin"`
pub fn default_file_name(model_name: &str) -> String {
    format!("{}_model.bin", model_name.replace(' ', "_"))
}

/// SHA-256 of the bincode payload, stored after the version
fn payload_digest(payload: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    let mut digest = [0u8; DIGEST_LEN];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("json"))
}

impl ModelBundle {
    pub fn from_trained(trained: &TrainedModel, target_column: &str) -> Self {
        let transformer = trained.pipeline.transformer();
        Self {
            model: trained.pipeline.classifier().clone(),
            scaler: transformer.scaler().clone(),
            encoders: transformer.encoders().clone(),
            metadata: BundleMetadata {
                model_name: trained.model_name.clone(),
                target_column: target_column.to_string(),
                rules: trained.pipeline.engineer().rules().to_vec(),
                feature_columns: transformer
                    .input_columns()
                    .into_iter()
                    .map(|(name, _)| name)
                    .collect(),
                params: trained.params.to_string(),
                created_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                crate_version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    /// Rebuild the inference pipeline; nothing is refit
    pub fn into_pipeline(self) -> Result<FloodPipeline> {
        let transformer = FeatureTransformer::from_parts(self.scaler, self.encoders)?;
        FloodPipeline::from_fitted(FeatureEngineer::new(self.metadata.rules), transformer, self.model)
    }

    /// `<dir>/<Model_Name>_model.bin`
    pub fn default_path(&self, dir: impl AsRef<Path>) -> PathBuf {
        dir.as_ref().join(default_file_name(&self.metadata.model_name))
    }

    /// Pretty JSON for `.json` paths, digest-checked binary otherwise
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let stored = StoredBundle {
            model: Some(self.model.clone()),
            scaler: Some(self.scaler.clone()),
            encoders: Some(self.encoders.clone()),
            metadata: Some(self.metadata.clone()),
        };

        let bytes = if is_json(path) {
            serde_json::to_vec_pretty(&stored)?
        } else {
            let payload = bincode::serialize(&stored)?;
            let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
            bytes.extend_from_slice(BUNDLE_MAGIC);
            bytes.extend_from_slice(&BUNDLE_FORMAT_VERSION.to_le_bytes());
            bytes.extend_from_slice(&payload_digest(&payload));
            bytes.extend_from_slice(&payload);
            bytes
        };
        fs::write(path, &bytes)?;

        info!(
            path = %path.display(),
            model = %self.metadata.model_name,
            bytes = bytes.len(),
            "Saved model bundle"
        );
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| {
            FloodError::BundleFormat(format!("cannot read bundle {}: {}", path.display(), e))
        })?;

        let stored: StoredBundle = if is_json(path) {
            serde_json::from_slice(&bytes)
                .map_err(|e| FloodError::BundleFormat(format!("undecodable bundle: {}", e)))?
        } else {
            decode_binary(&bytes)?
        };

        let missing = |field: &str| FloodError::BundleFormat(format!("bundle has no '{}' field", field));
        Ok(Self {
            model: stored.model.ok_or_else(|| missing("model"))?,
            scaler: stored.scaler.ok_or_else(|| missing("scaler"))?,
            encoders: stored.encoders.ok_or_else(|| missing("encoders"))?,
            metadata: stored.metadata.unwrap_or_default(),
        })
    }
}

fn decode_binary(bytes: &[u8]) -> Result<StoredBundle> {
    if bytes.len() < HEADER_LEN || &bytes[..4] != BUNDLE_MAGIC {
        return Err(FloodError::BundleFormat("not a model bundle (bad magic)".to_string()));
    }

    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[4..8]);
    let version = u32::from_le_bytes(version);
    if version != BUNDLE_FORMAT_VERSION {
        return Err(FloodError::BundleFormat(format!(
            "unsupported bundle version {} (expected {})",
            version, BUNDLE_FORMAT_VERSION
        )));
    }

    let payload = &bytes[HEADER_LEN..];
    if payload_digest(payload)[..] != bytes[8..HEADER_LEN] {
        return Err(FloodError::BundleFormat("digest mismatch".to_string()));
    }

    bincode::deserialize(payload)
        .map_err(|e| FloodError::BundleFormat(format!("undecodable bundle: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelKind, PipelineConfig};
    use crate::training::ModelTrainer;
    use ndarray::Array1;
    use polars::prelude::*;
    use tempfile::TempDir;

    fn trained() -> (TrainedModel, DataFrame) {
        let rainfall: Vec<f64> = (0..40).map(|i| i as f64 * 6.0).collect();
        let absorption: Vec<f64> = (0..40).map(|i| 0.3 + (i % 4) as f64 * 0.1).collect();
        let cover: Vec<&str> = (0..40).map(|i| ["Urban", "Forest"][i % 2]).collect();
        let y: Vec<f64> = (0..40).map(|i| if i >= 30 { 1.0 } else { 0.0 }).collect();
        let df = df! {
            "Rainfall" => rainfall,
            "Soil Absorption" => absorption,
            "Land Cover" => cover,
        }
        .unwrap();

        let mut config = PipelineConfig::new(ModelKind::RandomForest);
        config.random_forest.n_estimators = 10;
        let model = ModelTrainer::new(config)
            .train(&df, &Array1::from_vec(y))
            .unwrap();
        (model, df)
    }

    #[test]
    fn test_payload_digest_is_sha256() {
        let hex: String = payload_digest(b"hello world")
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        assert_eq!(hex, "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9");
    }

    #[test]
    fn test_header_carries_payload_digest() {
        let (model, _) = trained();
        let bundle = ModelBundle::from_trained(&model, "Flood Occurred");
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.bin");
        bundle.save(&path).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[..4], BUNDLE_MAGIC);
        assert_eq!(&bytes[8..HEADER_LEN], &payload_digest(&bytes[HEADER_LEN..])[..]);

        // Flip one digest byte; the payload itself is intact
        let mut tampered = bytes.clone();
        tampered[8] ^= 0x01;
        fs::write(&path, &tampered).unwrap();
        match ModelBundle::load(&path) {
            Err(FloodError::BundleFormat(msg)) => assert!(msg.contains("digest")),
            other => panic!("unexpected: {:?}", other.map(|b| b.metadata)),
        }
    }

    #[test]
    fn test_binary_round_trip() {
        let (model, df) = trained();
        let bundle = ModelBundle::from_trained(&model, "Flood Occurred");
        let dir = TempDir::new().unwrap();
        let path = bundle.default_path(dir.path());
        assert!(path.ends_with("Random_Forest_model.bin"));

        bundle.save(&path).unwrap();
        let loaded = ModelBundle::load(&path).unwrap();
        assert_eq!(loaded.metadata, bundle.metadata);

        let pipeline = loaded.into_pipeline().unwrap();
        assert_eq!(
            pipeline.predict_proba(&df).unwrap(),
            model.pipeline.predict_proba(&df).unwrap()
        );
    }

    #[test]
    fn test_json_round_trip() {
        let (model, df) = trained();
        let bundle = ModelBundle::from_trained(&model, "Flood Occurred");
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bundle.json");

        bundle.save(&path).unwrap();
        let pipeline = ModelBundle::load(&path).unwrap().into_pipeline().unwrap();
        assert_eq!(pipeline.predict(&df).unwrap(), model.pipeline.predict(&df).unwrap());
    }

    #[test]
    fn test_missing_field() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.json");
        fs::write(&path, r#"{"scaler": null, "encoders": null}"#).unwrap();
        match ModelBundle::load(&path) {
            Err(FloodError::BundleFormat(msg)) => assert!(msg.contains("model")),
            other => panic!("unexpected: {:?}", other.map(|b| b.metadata)),
        }
    }

    #[test]
    fn test_corrupt_binary() {
        let (model, _) = trained();
        let bundle = ModelBundle::from_trained(&model, "Flood Occurred");
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.bin");
        bundle.save(&path).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, &bytes).unwrap();
        assert!(matches!(ModelBundle::load(&path), Err(FloodError::BundleFormat(_))));

        fs::write(&path, b"PK\x03\x04garbage").unwrap();
        assert!(matches!(ModelBundle::load(&path), Err(FloodError::BundleFormat(_))));
    }
}
