//! Integration test: training pipeline end to end

mod common;

use autisense::evaluation::{CandidateOutcome, EvaluationConfig, EvaluationHarness};
use autisense::inference::{sample_record, InferenceService};
use autisense::pipeline::{Pipeline, TUNED_MODEL_NAME};
use autisense::training::ModelKind;
use common::{fast_config, quick_models_config, synthetic_dataset};

fn ranking_names(outcomes: &[CandidateOutcome]) -> Vec<String> {
    outcomes.iter().map(|o| o.name().to_string()).collect()
}

#[test]
fn test_ranking_is_stable_across_runs() {
    let dataset = synthetic_dataset(120, 3);
    let pipeline = Pipeline::new(quick_models_config());

    let first = pipeline.compare(&dataset).unwrap();
    let second = pipeline.compare(&dataset).unwrap();

    assert_eq!(ranking_names(first.ranking()), ranking_names(second.ranking()));
    assert_eq!(first.accuracy_by_model(), second.accuracy_by_model());
}

#[test]
fn test_parallel_and_sequential_harness_agree() {
    let dataset = synthetic_dataset(100, 5);
    let pipeline = Pipeline::new(quick_models_config());
    let (transform, train, test) = pipeline.prepare(&dataset).unwrap();
    let names = transform.feature_names();
    let kinds = [ModelKind::LogisticRegression, ModelKind::Knn, ModelKind::AdaBoost];

    let parallel = EvaluationHarness::new(EvaluationConfig::default().with_cv_folds(3))
        .evaluate(&kinds, &train, &test, &names);
    let sequential = EvaluationHarness::new(EvaluationConfig::default().with_cv_folds(3).with_parallel(false))
        .evaluate(&kinds, &train, &test, &names);

    assert_eq!(ranking_names(parallel.ranking()), ranking_names(sequential.ranking()));
    assert_eq!(parallel.accuracy_by_model(), sequential.accuracy_by_model());
}

#[test]
fn test_every_candidate_is_reported() {
    let dataset = synthetic_dataset(120, 11);
    let report = Pipeline::new(fast_config()).compare(&dataset).unwrap();

    assert_eq!(report.ranking().len(), ModelKind::all().len());
    for kind in ModelKind::all() {
        let outcome = report.get(kind.name()).expect("candidate present");
        let result = outcome.result().expect("candidate succeeded");
        assert!((0.0..=1.0).contains(&result.accuracy()));
        assert_eq!(result.cv.n_folds, 3);
    }

    let importances = report.feature_importances();
    assert!(importances.contains_key("Random Forest"));
    assert_eq!(importances["Random Forest"].len(), 16);
}

#[test]
fn test_end_to_end_sample_prediction() {
    let dataset = synthetic_dataset(150, 7);
    let outcome = Pipeline::new(quick_models_config()).run(&dataset).unwrap();

    assert_eq!(outcome.artifact_metadata.model_name, TUNED_MODEL_NAME);
    assert_eq!(outcome.artifact_metadata.model_kind, ModelKind::AdaBoost);
    assert_eq!(outcome.n_train + outcome.n_test, 150);
    assert_eq!(outcome.tuning.as_ref().unwrap().trials.len(), 4);

    let service = InferenceService::new(outcome.artifact);
    let first = service.predict(&sample_record()).unwrap();
    let second = service.predict(&sample_record()).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.label, 1);
    assert_eq!(first.label_name, "Yes");
    let total = first.probabilities.negative + first.probabilities.positive;
    assert!((total - 1.0).abs() < 1e-6);
}

#[test]
fn test_untuned_run_deploys_best_candidate() {
    let dataset = synthetic_dataset(120, 13);
    let outcome = Pipeline::new(quick_models_config().with_tuning(false)).run(&dataset).unwrap();

    let best = outcome.evaluation.best().unwrap();
    assert_eq!(outcome.artifact_metadata.model_name, best.name);
    assert!(outcome.tuning.is_none());
    assert!(outcome.to_json().unwrap().contains("\"evaluation\""));
}
