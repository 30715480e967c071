use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use flood_risk::config::{ModelKind, PipelineConfig};
use flood_risk::preprocessing::FeatureTransformer;
use flood_risk::synthetic::Smote;
use flood_risk::training::ModelTrainer;
use ndarray::Array1;
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_flood_data(n_rows: usize) -> (DataFrame, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    let rainfall: Vec<f64> = (0..n_rows).map(|_| rng.gen::<f64>() * 300.0).collect();
    let humidity: Vec<f64> = (0..n_rows).map(|_| 30.0 + rng.gen::<f64>() * 70.0).collect();
    let temperature: Vec<f64> = (0..n_rows).map(|_| 10.0 + rng.gen::<f64>() * 30.0).collect();
    let discharge: Vec<f64> = (0..n_rows).map(|_| rng.gen::<f64>() * 5000.0).collect();
    let water_level: Vec<f64> = (0..n_rows).map(|_| rng.gen::<f64>() * 10.0).collect();
    let elevation: Vec<f64> = (0..n_rows).map(|_| rng.gen::<f64>() * 500.0).collect();
    let land_cover: Vec<&str> = (0..n_rows)
        .map(|_| ["Urban", "Forest", "Agricultural", "Water Body", "Desert"][rng.gen_range(0..5)])
        .collect();

    // Wet, low-lying rows flood; roughly a quarter of the table
    let target: Vec<f64> = rainfall
        .iter()
        .zip(&elevation)
        .map(|(&r, &e)| if r / (e + 50.0) > 0.9 { 1.0 } else { 0.0 })
        .collect();

    let df = df!(
        "Rainfall" => &rainfall,
        "Humidity" => &humidity,
        "Temperature" => &temperature,
        "River Discharge" => &discharge,
        "Water Level" => &water_level,
        "Elevation" => &elevation,
        "Land Cover" => &land_cover
    )
    .unwrap();
    (df, Array1::from_vec(target))
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10);

    let (df, y) = create_flood_data(1000);
    for kind in [ModelKind::RandomForest, ModelKind::Svm] {
        let mut config = PipelineConfig::new(kind);
        config.random_forest.n_estimators = 50;
        group.bench_with_input(BenchmarkId::new("fit", kind.display_name()), &config, |b, config| {
            b.iter(|| {
                ModelTrainer::new(config.clone())
                    .train(black_box(&df), black_box(&y))
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_preprocessing(c: &mut Criterion) {
    let mut group = c.benchmark_group("preprocessing");

    for n_rows in [1000, 10000] {
        let (df, y) = create_flood_data(n_rows);

        group.bench_with_input(BenchmarkId::new("transform", n_rows), &df, |b, df| {
            let mut transformer = FeatureTransformer::new();
            transformer.fit(df).unwrap();
            b.iter(|| transformer.transform(black_box(df)).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("smote", n_rows), &df, |b, df| {
            let smote = Smote::new().with_seed(42);
            b.iter(|| smote.fit_resample_frame(black_box(df), black_box(&y)).unwrap())
        });
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    let (train_df, train_y) = create_flood_data(2000);
    let mut config = PipelineConfig::new(ModelKind::RandomForest);
    config.random_forest.n_estimators = 50;
    let model = ModelTrainer::new(config).train(&train_df, &train_y).unwrap();

    for n_rows in [1, 100, 1000] {
        let (df, _) = create_flood_data(n_rows);
        group.bench_with_input(BenchmarkId::new("predict_proba", n_rows), &df, |b, df| {
            b.iter(|| model.pipeline.predict_proba(black_box(df)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_training, bench_preprocessing, bench_prediction);
criterion_main!(benches);
