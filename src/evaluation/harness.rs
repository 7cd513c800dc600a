//! Candidate evaluation under one protocol

use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::Instant;
use tracing::{info, warn};

use super::metrics::TestMetrics;
use super::report::EvaluationReport;
use crate::error::{AutisenseError, Result};
use crate::training::{cross_val_score, CVResults, CVStrategy, Classifier, CrossValidator, ModelKind, TrainedModel};

/// An encoded feature matrix with its labels
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedSplit {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
}

impl EncodedSplit {
    pub fn new(x: Array2<f64>, y: Array1<f64>) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(AutisenseError::ShapeError {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }
        Ok(Self { x, y })
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// Evaluation protocol settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub cv_strategy: CVStrategy,
    /// Seed for shuffled folds
    pub cv_random_state: u64,
    /// Evaluate candidates concurrently
    pub parallel: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            cv_strategy: CVStrategy::default(),
            cv_random_state: 42,
            parallel: true,
        }
    }
}

impl EvaluationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stratified folds
    pub fn with_cv_folds(mut self, n_splits: usize) -> Self {
        let shuffle = match self.cv_strategy {
            CVStrategy::KFold { shuffle, .. } | CVStrategy::StratifiedKFold { shuffle, .. } => shuffle,
        };
        self.cv_strategy = CVStrategy::StratifiedKFold { n_splits, shuffle };
        self
    }

    pub fn with_cv_strategy(mut self, strategy: CVStrategy) -> Self {
        self.cv_strategy = strategy;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn cross_validator(&self) -> CrossValidator {
        CrossValidator::new(self.cv_strategy).with_random_state(self.cv_random_state)
    }
}

/// Everything measured for one successful candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    pub name: String,
    pub kind: ModelKind,
    pub metrics: TestMetrics,
    pub cv: CVResults,
    /// Importances aligned with the encoded feature order
    pub feature_importances: Option<Vec<f64>>,
    pub fit_seconds: f64,
    /// The model fitted on the full training split
    #[serde(skip)]
    pub model: Option<TrainedModel>,
}

impl CandidateResult {
    pub fn accuracy(&self) -> f64 {
        self.metrics.accuracy
    }
}

/// Result of one candidate; a failure never aborts the run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CandidateOutcome {
    Succeeded(Box<CandidateResult>),
    Failed { name: String, kind: ModelKind, error: String },
}

impl CandidateOutcome {
    pub fn name(&self) -> &str {
        match self {
            CandidateOutcome::Succeeded(r) => &r.name,
            CandidateOutcome::Failed { name, .. } => name,
        }
    }

    pub fn result(&self) -> Option<&CandidateResult> {
        match self {
            CandidateOutcome::Succeeded(r) => Some(r),
            CandidateOutcome::Failed { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CandidateOutcome::Succeeded(_))
    }
}

/// Ranking order: accuracy desc, CV mean desc, name asc; failures last by name
pub(crate) fn rank_order(a: &CandidateOutcome, b: &CandidateOutcome) -> Ordering {
    match (a.result(), b.result()) {
        (Some(ra), Some(rb)) => rb
            .accuracy()
            .total_cmp(&ra.accuracy())
            .then(rb.cv.mean_score.total_cmp(&ra.cv.mean_score))
            .then_with(|| ra.name.cmp(&rb.name)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.name().cmp(b.name()),
    }
}

/// Trains, scores and ranks model candidates
#[derive(Debug, Clone, Default)]
pub struct EvaluationHarness {
    config: EvaluationConfig,
}

impl EvaluationHarness {
    pub fn new(config: EvaluationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Evaluate catalog defaults of the given kinds
    pub fn evaluate(
        &self,
        kinds: &[ModelKind],
        train: &EncodedSplit,
        test: &EncodedSplit,
        feature_names: &[String],
    ) -> EvaluationReport {
        let candidates: Vec<(String, TrainedModel)> = kinds
            .iter()
            .map(|kind| (kind.name().to_string(), kind.build()))
            .collect();
        self.evaluate_models(candidates, train, test, feature_names)
    }

    /// Evaluate unfitted models under their own names
    pub fn evaluate_models(
        &self,
        candidates: Vec<(String, TrainedModel)>,
        train: &EncodedSplit,
        test: &EncodedSplit,
        feature_names: &[String],
    ) -> EvaluationReport {
        let start = Instant::now();
        info!(
            candidates = candidates.len(),
            train_rows = train.len(),
            test_rows = test.len(),
            "Evaluating candidates"
        );

        let run = |(name, model): (String, TrainedModel)| self.evaluate_one(name, model, train, test);
        let mut outcomes: Vec<CandidateOutcome> = if self.config.parallel {
            candidates.into_par_iter().map(run).collect()
        } else {
            candidates.into_iter().map(run).collect()
        };
        outcomes.sort_by(rank_order);

        info!(
            succeeded = outcomes.iter().filter(|o| o.is_success()).count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Evaluation finished"
        );
        EvaluationReport::new(outcomes, feature_names.to_vec())
    }

    fn evaluate_one(
        &self,
        name: String,
        model: TrainedModel,
        train: &EncodedSplit,
        test: &EncodedSplit,
    ) -> CandidateOutcome {
        let kind = model.kind();
        info!(candidate = %name, "Candidate started");
        match self.try_evaluate(&name, model, train, test) {
            Ok(result) => {
                info!(
                    candidate = %name,
                    accuracy = result.accuracy(),
                    cv_mean = result.cv.mean_score,
                    cv_std = result.cv.std_score,
                    "Candidate finished"
                );
                CandidateOutcome::Succeeded(Box::new(result))
            }
            Err(e) => {
                warn!(candidate = %name, error = %e, "Candidate failed");
                CandidateOutcome::Failed {
                    name,
                    kind,
                    error: e.to_string(),
                }
            }
        }
    }

    fn try_evaluate(
        &self,
        name: &str,
        mut model: TrainedModel,
        train: &EncodedSplit,
        test: &EncodedSplit,
    ) -> Result<CandidateResult> {
        let fit_start = Instant::now();
        // Cross-validation refits a clean copy per fold
        let template = model.clone();
        model.fit(&train.x, &train.y)?;
        let fit_seconds = fit_start.elapsed().as_secs_f64();

        let metrics = score_fitted(&model, test)?;
        let cv = cross_val_score(|| template.clone(), &train.x, &train.y, &self.config.cross_validator())?;

        Ok(CandidateResult {
            name: name.to_string(),
            kind: model.kind(),
            metrics,
            cv,
            feature_importances: model.feature_importances().map(|a| a.to_vec()),
            fit_seconds,
            model: Some(model),
        })
    }
}

/// Hold-out metrics of an already fitted model
pub fn score_fitted<M: Classifier + ?Sized>(model: &M, test: &EncodedSplit) -> Result<TestMetrics> {
    let predictions = model.predict(&test.x)?;
    let proba = model.predict_proba(&test.x)?;
    if proba.ncols() != 2 {
        return Err(AutisenseError::ShapeError {
            expected: "2 probability columns".to_string(),
            actual: format!("{} columns", proba.ncols()),
        });
    }
    let positive = proba.index_axis(Axis(1), 1).to_owned();
    TestMetrics::compute(&test.y, &predictions, &positive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::AdaBoostClassifier;

    fn split(n: usize, offset: f64) -> EncodedSplit {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            let base = (i as f64 + offset) / n as f64;
            if j == 0 {
                base
            } else {
                ((i * 7) % 5) as f64 / 5.0
            }
        });
        let y = x.column(0).mapv(|v| if v > 0.5 { 1.0 } else { 0.0 });
        EncodedSplit::new(x, y).unwrap()
    }

    fn names() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    #[test]
    fn test_evaluate_ranks_all_candidates() {
        let harness = EvaluationHarness::default();
        let report = harness.evaluate(
            &[ModelKind::LogisticRegression, ModelKind::AdaBoost, ModelKind::Knn],
            &split(40, 0.0),
            &split(20, 0.25),
            &names(),
        );

        assert_eq!(report.ranking().len(), 3);
        let best = report.best().unwrap();
        assert!(best.accuracy() >= 0.8);
        assert_eq!(best.cv.n_folds, 5);

        let accuracies: Vec<f64> = report.ranking().iter().filter_map(|o| o.result()).map(|r| r.accuracy()).collect();
        assert!(accuracies.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_failed_candidate_is_isolated_and_ranked_last() {
        let harness = EvaluationHarness::new(EvaluationConfig::default().with_parallel(false));
        let broken = TrainedModel::from(AdaBoostClassifier::new(0, 1.0));
        let report = harness.evaluate_models(
            vec![
                ("broken".to_string(), broken),
                ("ada".to_string(), ModelKind::AdaBoost.build()),
            ],
            &split(40, 0.0),
            &split(20, 0.25),
            &names(),
        );

        assert_eq!(report.ranking()[0].name(), "ada");
        assert!(matches!(report.ranking()[1], CandidateOutcome::Failed { .. }));
    }

    #[test]
    fn test_rank_order_tie_breaks() {
        let train = split(40, 0.0);
        let test = split(20, 0.25);
        let harness = EvaluationHarness::new(EvaluationConfig::default().with_parallel(false));
        let report = harness.evaluate_models(
            vec![
                ("zeta".to_string(), ModelKind::AdaBoost.build()),
                ("alpha".to_string(), ModelKind::AdaBoost.build()),
            ],
            &train,
            &test,
            &names(),
        );
        let order: Vec<&str> = report.ranking().iter().map(|o| o.name()).collect();
        assert_eq!(order, vec!["alpha", "zeta"]);
    }

    fn scored(name: &str, y_pred: [f64; 4], cv_mean: f64) -> CandidateOutcome {
        let y_true = ndarray::array![1.0, 0.0, 1.0, 0.0];
        let y_pred = Array1::from_vec(y_pred.to_vec());
        let metrics = TestMetrics::compute(&y_true, &y_pred, &y_pred).unwrap();
        CandidateOutcome::Succeeded(Box::new(CandidateResult {
            name: name.to_string(),
            kind: ModelKind::AdaBoost,
            metrics,
            cv: CVResults::from_scores(vec![cv_mean, cv_mean]),
            feature_importances: None,
            fit_seconds: 0.0,
            model: None,
        }))
    }

    fn ranked(mut outcomes: Vec<CandidateOutcome>) -> Vec<String> {
        outcomes.sort_by(rank_order);
        outcomes.iter().map(|o| o.name().to_string()).collect()
    }

    #[test]
    fn test_rank_order_uses_cv_mean_on_equal_accuracy() {
        let order = ranked(vec![
            scored("alpha", [1.0, 0.0, 1.0, 0.0], 0.80),
            scored("zeta", [1.0, 0.0, 1.0, 0.0], 0.95),
        ]);
        assert_eq!(order, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_rank_order_accuracy_outweighs_cv_mean() {
        let order = ranked(vec![
            scored("alpha", [1.0, 0.0, 0.0, 0.0], 0.99),
            scored("zeta", [1.0, 0.0, 1.0, 0.0], 0.60),
            CandidateOutcome::Failed {
                name: "broken".to_string(),
                kind: ModelKind::Svm,
                error: "boom".to_string(),
            },
        ]);
        assert_eq!(order, vec!["zeta", "alpha", "broken"]);
    }
}
