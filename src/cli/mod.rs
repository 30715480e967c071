//! flood-risk command-line interface
//!
//! `train` runs the full pipeline on a dataset, `predict` scores one
//! observation with a saved bundle and `describe` profiles a dataset.

use clap::{Parser, Subcommand};
use colored::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{ModelKind, PipelineConfig, ResamplePlacement};
use crate::data::profile::profile_dataset;
use crate::data::DatasetLoader;
use crate::inference::weather::{apply_weather, JsonSnapshotWeather};
use crate::inference::{FloodPredictor, Observation};
use crate::workflow::run_training;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<16} {}", muted(key), val.white());
}

fn indented(block: &str) {
    for line in block.lines() {
        println!("    {}", line);
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "flood-risk")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train and apply flood-risk classifiers")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train, evaluate, log and save one model
    Train {
        /// Dataset file (CSV or XLSX)
        data: PathBuf,

        /// JSON configuration; flags below override its values
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Model variant (random_forest, svm, xgboost). The SVM refuses
        /// tables above 10000 rows after class balancing
        #[arg(short, long)]
        model: Option<ModelKind>,

        /// Target column name
        #[arg(short, long)]
        target: Option<String>,

        /// Held-out fraction
        #[arg(long)]
        test_size: Option<f64>,

        #[arg(long)]
        seed: Option<u64>,

        /// Oversample before or after the feature transform
        #[arg(long)]
        resample: Option<ResamplePlacement>,

        /// Run log CSV file
        #[arg(long)]
        log: Option<PathBuf>,

        /// Directory the model bundle is written to
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Free text stored with the run
        #[arg(long)]
        notes: Option<String>,
    },

    /// Score one observation with a saved bundle
    Predict {
        /// Model bundle file
        bundle: PathBuf,

        /// Reading as NAME=VALUE, e.g. --field "Rainfall=120.5"
        #[arg(short, long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,

        /// Saved weatherapi.com current.json response
        #[arg(long)]
        weather_json: Option<PathBuf>,

        /// Location the weather is requested for
        #[arg(long, default_value = "")]
        location: String,
    },

    /// Skewness, kurtosis and class balance of a dataset
    Describe {
        data: PathBuf,

        /// Target column reported as class balance
        #[arg(short, long, default_value = "Flood Occurred")]
        target: String,
    },
}

fn parse_field(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        match self.command {
            Commands::Train {
                data,
                config,
                model,
                target,
                test_size,
                seed,
                resample,
                log,
                output,
                notes,
            } => {
                let mut cfg = match config {
                    Some(path) => PipelineConfig::from_json_file(path)?,
                    None => PipelineConfig::default(),
                };
                if let Some(model) = model {
                    cfg.model = model;
                }
                if let Some(target) = target {
                    cfg.target_column = target;
                }
                if let Some(test_size) = test_size {
                    cfg.test_size = test_size;
                }
                if let Some(seed) = seed {
                    cfg.seed = seed;
                }
                if let Some(resample) = resample {
                    cfg.resample = resample;
                }
                if let Some(log) = log {
                    cfg.log_path = log;
                }
                if let Some(output) = output {
                    cfg.output_dir = output;
                }
                if let Some(notes) = notes {
                    cfg.notes = notes;
                }
                cmd_train(&data, &cfg)
            }
            Commands::Predict {
                bundle,
                fields,
                weather_json,
                location,
            } => cmd_predict(&bundle, fields, weather_json.as_deref(), &location),
            Commands::Describe { data, target } => cmd_describe(&data, &target),
        }
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(data_path: &Path, config: &PipelineConfig) -> anyhow::Result<()> {
    section("Train");
    kv("Dataset", &data_path.display().to_string());
    kv("Model", config.model.display_name());
    kv("Seed", &config.seed.to_string());
    println!();

    step_run(&format!("Training {}", config.model.display_name().cyan()));
    let start = Instant::now();
    let outcome = run_training(data_path, config)?;
    step_done(&format!("{:.2?}", start.elapsed()));

    println!();
    kv("Run", &outcome.run.run_id.to_string());
    kv("Train / test", &format!("{} / {}", outcome.train_size, outcome.test_size));
    println!(
        "  {:<16} {}",
        muted("Accuracy"),
        format!("{:.4}", outcome.evaluation.accuracy).white().bold()
    );

    section("Classification report");
    indented(&outcome.evaluation.report.to_string());

    section("Confusion matrix");
    indented(&outcome.evaluation.confusion.to_string());

    if let Some(ranked) = outcome.trained.pipeline.ranked_importances() {
        section("Top features");
        for (feature, importance) in ranked.iter().take(10) {
            println!("  {:<36} {:>8.4}", feature, importance);
        }
    }

    println!();
    println!("  {} {}", ok("saved"), outcome.bundle_path.display());
    println!("  {} {}", ok("logged"), config.log_path.display());
    println!();
    Ok(())
}

pub fn cmd_predict(
    bundle: &Path,
    fields: Vec<(String, String)>,
    weather_json: Option<&Path>,
    location: &str,
) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading bundle");
    let predictor = FloodPredictor::load(bundle)?;
    step_done(&predictor.metadata().model_name);

    let form: HashMap<String, String> = fields.into_iter().collect();
    let mut observation = Observation::from_form(&form);

    if let Some(path) = weather_json {
        let source = JsonSnapshotWeather::new(path);
        match apply_weather(&mut observation, &source, location) {
            Some(report) => {
                kv("Location", &format!("{}, {}, {}", report.location, report.region, report.country));
                kv("Condition", &report.condition);
                kv("Temperature", &format!("{:.1} °C", report.temperature_c));
                kv("Humidity", &format!("{:.0}%", report.humidity));
                kv("Precipitation", &format!("{:.1} mm", report.precipitation_mm));
            }
            None => println!("  {}", "weather unavailable, using entered values".yellow()),
        }
    }

    let prediction = predictor.predict(&observation)?;
    println!();
    let verdict = prediction.to_string();
    if prediction.is_flood_likely() {
        println!("  {}", verdict.red().bold());
    } else {
        println!("  {}", verdict.green().bold());
    }
    println!();
    Ok(())
}

pub fn cmd_describe(data_path: &Path, target: &str) -> anyhow::Result<()> {
    section("Describe");

    step_run("Loading data");
    let df = DatasetLoader::new().with_drop_missing(false).load(data_path)?;
    step_done(&format!("{} rows × {} cols", df.height(), df.width()));

    let profile = profile_dataset(&df, Some(target))?;
    println!();
    indented(&profile.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field() {
        assert_eq!(
            parse_field("River Discharge = 12.5").unwrap(),
            ("River Discharge".to_string(), "12.5".to_string())
        );
        assert!(parse_field("Rainfall").is_err());
    }

    #[test]
    fn test_resample_flag_uses_from_str() {
        let placement = |value: &str| {
            Cli::try_parse_from(["flood-risk", "train", "data.csv", "--resample", value]).map(
                |cli| match cli.command {
                    Commands::Train { resample, .. } => resample,
                    _ => None,
                },
            )
        };
        assert_eq!(
            placement("before-transform").unwrap(),
            Some(ResamplePlacement::BeforeTransform)
        );
        assert_eq!(placement("after").unwrap(), Some(ResamplePlacement::AfterTransform));
        assert!(placement("sideways").is_err());
    }

    #[test]
    fn test_train_args_parse() {
        let cli = Cli::try_parse_from([
            "flood-risk", "train", "data.csv", "--model", "svm", "--seed", "7", "--resample", "after",
        ])
        .unwrap();
        match cli.command {
            Commands::Train { model, seed, resample, .. } => {
                assert_eq!(model, Some(ModelKind::Svm));
                assert_eq!(seed, Some(7));
                assert_eq!(resample, Some(ResamplePlacement::AfterTransform));
            }
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn test_predict_args_parse() {
        let cli = Cli::try_parse_from([
            "flood-risk", "predict", "model.bin", "-f", "Rainfall=200", "-f", "Elevation=3",
        ])
        .unwrap();
        match cli.command {
            Commands::Predict { fields, weather_json, .. } => {
                assert_eq!(fields.len(), 2);
                assert!(weather_json.is_none());
            }
            _ => panic!("expected predict"),
        }
    }
}
