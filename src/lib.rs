//! Autisense - screening-questionnaire classification
//!
//! This crate turns toddler autism screening records into a deployable
//! binary classifier:
//! - Deterministic feature transform fitted on the training split only
//! - A catalog of six classifiers compared on one hold-out split
//! - Cross-validated grid tuning of AdaBoost
//! - A persisted artifact served from a CLI and an HTTP form
//!
//! # Modules
//!
//! - [`preprocessing`] - Imputation, category coding and scaling of raw records
//! - [`training`] - Classifiers and cross-validation
//! - [`evaluation`] - Metrics, the comparison harness and its report
//! - [`optimizer`] - AdaBoost grid search
//! - [`inference`] - Artifact persistence and the prediction service
//! - [`pipeline`] - End-to-end orchestration
//! - [`server`] - HTTP form and JSON API
//! - [`cli`] - Command-line interface

pub mod error;

pub mod preprocessing;
pub mod training;
pub mod evaluation;
pub mod optimizer;
pub mod inference;
pub mod pipeline;
pub mod utils;

pub mod server;
pub mod cli;

pub use error::{AutisenseError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{AutisenseError, Result};

    pub use crate::preprocessing::{FieldSchema, FieldValue, FittedTransform, FitterConfig, RawRecord, TransformFitter};

    pub use crate::training::{Classifier, CrossValidator, CVStrategy, ModelKind, TrainedModel};

    pub use crate::evaluation::{EvaluationConfig, EvaluationHarness, EvaluationReport, TestMetrics};

    pub use crate::optimizer::{AdaBoostGrid, GridSearchTuner, TuningConfig};

    pub use crate::inference::{DeployableArtifact, FormSubmission, InferenceService, Prediction, Verdict};

    pub use crate::pipeline::{Pipeline, PipelineConfig, PipelineOutcome};

    pub use crate::utils::{train_test_split, DataLoader, Dataset, SplitConfig};
}
