//! End-to-end training pipeline: split, fit transform, evaluate, tune, package

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::info;

use crate::error::{AutisenseError, Result};
use crate::evaluation::{score_fitted, EncodedSplit, EvaluationConfig, EvaluationHarness, EvaluationReport, TestMetrics};
use crate::inference::{ArtifactMetadata, DeployableArtifact};
use crate::optimizer::{AdaBoostGrid, GridSearchTuner, TuningConfig, TuningOutcome};
use crate::preprocessing::{FieldSchema, FitterConfig, FittedTransform, TransformFitter};
use crate::training::{ModelKind, TrainedModel};
use crate::utils::{train_test_split, Dataset, SplitConfig};

/// Name the tuned model is deployed under
pub const TUNED_MODEL_NAME: &str = "Tuned AdaBoost";

/// Configuration of every pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub schema: FieldSchema,
    pub fitter: FitterConfig,
    pub split: SplitConfig,
    pub evaluation: EvaluationConfig,
    /// Candidates to compare, in catalog order by default
    pub models: Vec<ModelKind>,
    /// Grid-tune AdaBoost and deploy the tuned model
    pub tune: bool,
    pub grid: AdaBoostGrid,
    pub tuning: TuningConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            schema: FieldSchema::screening(),
            fitter: FitterConfig::default(),
            split: SplitConfig::default(),
            evaluation: EvaluationConfig::default(),
            models: ModelKind::all().to_vec(),
            tune: true,
            grid: AdaBoostGrid::default(),
            tuning: TuningConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON config; missing keys keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| AutisenseError::ConfigError(format!("{}: {}", path.as_ref().display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_models(mut self, models: Vec<ModelKind>) -> Self {
        self.models = models;
        self
    }

    pub fn with_tuning(mut self, tune: bool) -> Self {
        self.tune = tune;
        self
    }

    pub fn with_grid(mut self, grid: AdaBoostGrid) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_split(mut self, split: SplitConfig) -> Self {
        self.split = split;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.schema.validate()?;
        self.split.validate()?;
        if self.models.is_empty() && !self.tune {
            return Err(AutisenseError::ConfigError(
                "nothing to train: no models and tuning disabled".to_string(),
            ));
        }
        if self.tune {
            self.grid.validate()?;
        }
        Ok(())
    }
}

/// Everything a pipeline run produces
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    #[serde(skip)]
    pub artifact: DeployableArtifact,
    pub artifact_metadata: ArtifactMetadata,
    pub evaluation: EvaluationReport,
    pub tuning: Option<TuningOutcome>,
    /// Hold-out metrics of the tuned model
    pub tuned_metrics: Option<TestMetrics>,
    pub n_train: usize,
    pub n_test: usize,
}

impl PipelineOutcome {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs the training stages in order
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Split, fit the transform on the train side and encode both sides
    pub fn prepare(&self, dataset: &Dataset) -> Result<(FittedTransform, EncodedSplit, EncodedSplit)> {
        let (train, test) = train_test_split(dataset, &self.config.split)?;
        let transform = TransformFitter::new(self.config.schema.clone())
            .with_config(self.config.fitter.clone())
            .fit(train.records())?;

        let train_split = EncodedSplit::new(transform.apply_batch(train.records())?, train.labels().clone())?;
        let test_split = EncodedSplit::new(transform.apply_batch(test.records())?, test.labels().clone())?;
        Ok((transform, train_split, test_split))
    }

    /// Compare candidates without tuning or packaging
    pub fn compare(&self, dataset: &Dataset) -> Result<EvaluationReport> {
        self.config.validate()?;
        let (transform, train, test) = self.prepare(dataset)?;
        let harness = EvaluationHarness::new(self.config.evaluation.clone());
        Ok(harness.evaluate(&self.config.models, &train, &test, &transform.feature_names()))
    }

    pub fn run(&self, dataset: &Dataset) -> Result<PipelineOutcome> {
        self.config.validate()?;
        let start = Instant::now();
        info!(rows = dataset.len(), "Pipeline started");

        let (transform, train, test) = self.prepare(dataset)?;
        let feature_names = transform.feature_names();

        let harness = EvaluationHarness::new(self.config.evaluation.clone());
        let evaluation = harness.evaluate(&self.config.models, &train, &test, &feature_names);

        let (model, metadata, tuning, tuned_metrics) = if self.config.tune {
            let outcome = GridSearchTuner::new(self.config.grid.clone(), self.config.tuning.clone())
                .fit(&train.x, &train.y)?;
            let metrics = score_fitted(&outcome.best_model, &test)?;
            info!(accuracy = metrics.accuracy, "Tuned model scored on hold-out split");

            let metadata = ArtifactMetadata::new(TUNED_MODEL_NAME, ModelKind::AdaBoost)
                .with_tuned_params(outcome.best_params)
                .with_cv_score(outcome.best_score)
                .with_test_accuracy(metrics.accuracy);
            let model = TrainedModel::from(outcome.best_model.clone());
            (model, metadata, Some(outcome), Some(metrics))
        } else {
            let best = evaluation.best().ok_or_else(|| {
                AutisenseError::TrainingError("every candidate failed; nothing to deploy".to_string())
            })?;
            let model = best.model.clone().ok_or_else(|| {
                AutisenseError::TrainingError(format!("fitted model of {} is unavailable", best.name))
            })?;
            let metadata = ArtifactMetadata::new(best.name.clone(), best.kind)
                .with_cv_score(best.cv.mean_score)
                .with_test_accuracy(best.accuracy());
            (model, metadata, None, None)
        };

        let artifact = DeployableArtifact::new(transform, model, metadata)?;
        info!(
            model = %artifact.metadata().model_name,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Pipeline finished"
        );

        Ok(PipelineOutcome {
            artifact_metadata: artifact.metadata().clone(),
            artifact,
            evaluation,
            tuning,
            tuned_metrics,
            n_train: train.len(),
            n_test: test.len(),
        })
    }
}
