//! One complete training run: load, split, train, evaluate, log, save

use crate::config::PipelineConfig;
use crate::data::{extract_labels, stratified_split, DatasetLoader};
use crate::error::Result;
use crate::evaluation::{Evaluation, Evaluator};
use crate::export::ModelBundle;
use crate::tracking::{NewRun, RunLogger, RunRecord};
use crate::training::grid_search::CancellationToken;
use crate::training::{ModelTrainer, TrainedModel};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Number of importances written to the log after training
const TOP_IMPORTANCES: usize = 10;

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model_name: String,
    pub evaluation: Evaluation,
    pub run: RunRecord,
    pub bundle_path: PathBuf,
    pub trained: TrainedModel,
    /// Rows in the held-out split before any oversampling
    pub train_size: usize,
    pub test_size: usize,
}

/// Run the whole pipeline on the dataset at `path`
pub fn run_training(path: impl AsRef<Path>, config: &PipelineConfig) -> Result<TrainingOutcome> {
    run_training_with_cancellation(path, config, CancellationToken::new())
}

/// Like [`run_training`], stoppable through `token` while the grid search runs.
///
/// A cancelled run returns before anything is logged or saved.
pub fn run_training_with_cancellation(
    path: impl AsRef<Path>,
    config: &PipelineConfig,
    token: CancellationToken,
) -> Result<TrainingOutcome> {
    config.validate()?;
    let path = path.as_ref();
    let start = Instant::now();

    let df = DatasetLoader::new().load(path)?;
    let (x, y) = extract_labels(&df, &config.target_column)?;
    let split = stratified_split(&x, &y, config.test_size, config.seed)?;
    let train_size = split.x_train.height();
    let test_size = split.x_test.height();
    info!(
        dataset = %path.display(),
        train_size,
        test_size,
        "Split dataset"
    );

    let trained = ModelTrainer::new(config.clone())
        .with_cancellation(token)
        .train(&split.x_train, &split.y_train)?;

    let evaluation = Evaluator::new().evaluate(&trained.pipeline, &split.x_test, &split.y_test)?;

    let run = RunLogger::new(&config.log_path).log_run(
        &NewRun::from_evaluation(&trained.model_name, &evaluation, train_size, test_size)
            .with_params(trained.params.clone())
            .with_notes(config.notes.clone()),
    )?;

    let bundle = ModelBundle::from_trained(&trained, &config.target_column);
    let bundle_path = bundle.default_path(&config.output_dir);
    bundle.save(&bundle_path)?;

    if let Some(ranked) = trained.pipeline.ranked_importances() {
        for (rank, (feature, importance)) in ranked.iter().take(TOP_IMPORTANCES).enumerate() {
            info!(rank = rank + 1, feature = %feature, importance, "Feature importance");
        }
    }

    info!(
        run_id = run.run_id,
        model = %trained.model_name,
        accuracy = evaluation.accuracy,
        bundle = %bundle_path.display(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Training run complete"
    );

    Ok(TrainingOutcome {
        model_name: trained.model_name.clone(),
        evaluation,
        run,
        bundle_path,
        trained,
        train_size,
        test_size,
    })
}
