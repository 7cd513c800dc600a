//! Inference module
//!
//! Provides prediction over raw questionnaire records:
//! - The [`DeployableArtifact`] bundling the fitted transform and model
//! - JSON persistence of artifacts
//! - An [`InferenceService`] with atomic artifact swap and reload
//! - Form label mapping and verdict text

mod artifact;
pub mod form;
mod service;

pub use artifact::{ArtifactMetadata, DeployableArtifact};
pub use form::{form_options, map_ui_label, FormSubmission, Verdict};
pub use service::{sample_record, InferenceService, Prediction, Probabilities};
