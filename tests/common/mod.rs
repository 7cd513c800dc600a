//! Shared synthetic screening data for integration tests

#![allow(dead_code)]

use autisense::optimizer::AdaBoostGrid;
use autisense::pipeline::PipelineConfig;
use autisense::preprocessing::RawRecord;
use autisense::training::ModelKind;
use autisense::utils::Dataset;
use ndarray::Array1;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

pub const SEXES: [&str; 2] = ["m", "f"];
pub const ETHNICITIES: [&str; 4] = ["White European", "asian", "middle eastern", "black"];
pub const YES_NO: [&str; 2] = ["yes", "no"];
pub const RESPONDENTS: [&str; 4] = ["family member", "health care professional", "self", "others"];

/// One screening record; categorical values cycle with `i` so every value occurs
pub fn screening_record(i: usize, rng: &mut impl Rng) -> (RawRecord, f64) {
    let mut record = RawRecord::new();
    let mut score = 0.0;
    for item in 1..=10 {
        let answer = if rng.gen_bool(0.35) { 1.0 } else { 0.0 };
        score += answer;
        record = record.with_number(format!("A{}", item), answer);
    }
    let record = record
        .with_number("Age_Mons", f64::from(rng.gen_range(12u32..=36)))
        .with_text("Sex", SEXES[i % 2])
        .with_text("Ethnicity", ETHNICITIES[i % 4])
        .with_text("Jaundice", YES_NO[(i / 2) % 2])
        .with_text("Family_mem_with_ASD", YES_NO[(i / 3) % 2])
        .with_text("Who completed the test", RESPONDENTS[(i / 5) % 4]);
    let label = if score >= 4.0 { 1.0 } else { 0.0 };
    (record, label)
}

/// Labelled dataset whose label is "at least four items answered 1"
pub fn synthetic_dataset(n: usize, seed: u64) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let (records, labels): (Vec<RawRecord>, Vec<f64>) =
        (0..n).map(|i| screening_record(i, &mut rng)).unzip();
    Dataset::new(records, Array1::from_vec(labels)).expect("synthetic dataset is valid")
}

/// Default pipeline with a small tuning grid and three folds
pub fn fast_config() -> PipelineConfig {
    let mut config = PipelineConfig::default().with_grid(
        AdaBoostGrid::new()
            .with_n_estimators(vec![10, 20])
            .with_learning_rate(vec![0.1, 1.0])
            .with_max_depth(vec![1]),
    );
    config.evaluation = config.evaluation.with_cv_folds(3);
    config.tuning = config.tuning.with_cv_strategy(autisense::training::CVStrategy::StratifiedKFold {
        n_splits: 3,
        shuffle: false,
    });
    config
}

/// Pipeline restricted to the quicker candidates
pub fn quick_models_config() -> PipelineConfig {
    fast_config().with_models(vec![
        ModelKind::LogisticRegression,
        ModelKind::RandomForest,
        ModelKind::Knn,
        ModelKind::AdaBoost,
    ])
}

/// Small AdaBoost artifact trained without tuning
pub fn trained_artifact() -> autisense::inference::DeployableArtifact {
    let config = fast_config()
        .with_models(vec![ModelKind::AdaBoost])
        .with_tuning(false);
    autisense::pipeline::Pipeline::new(config)
        .run(&synthetic_dataset(100, 21))
        .expect("pipeline run")
        .artifact
}
