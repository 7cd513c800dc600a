//! The persisted (transform, model) pair

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;
use uuid::Uuid;

use crate::error::{AutisenseError, Result};
use crate::evaluation::name_values;
use crate::optimizer::AdaBoostParams;
use crate::preprocessing::FittedTransform;
use crate::training::{Classifier, ModelKind, TrainedModel};

/// Provenance of an artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub id: Uuid,
    /// Candidate name the model was selected under
    pub model_name: String,
    pub model_kind: ModelKind,
    pub created_at: DateTime<Utc>,
    pub crate_version: String,
    pub tuned_params: Option<AdaBoostParams>,
    /// Mean cross-validated accuracy on the training split
    pub cv_score: Option<f64>,
    pub test_accuracy: Option<f64>,
}

impl ArtifactMetadata {
    pub fn new(model_name: impl Into<String>, model_kind: ModelKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            model_name: model_name.into(),
            model_kind,
            created_at: Utc::now(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            tuned_params: None,
            cv_score: None,
            test_accuracy: None,
        }
    }

    pub fn with_tuned_params(mut self, params: AdaBoostParams) -> Self {
        self.tuned_params = Some(params);
        self
    }

    pub fn with_cv_score(mut self, score: f64) -> Self {
        self.cv_score = Some(score);
        self
    }

    pub fn with_test_accuracy(mut self, accuracy: f64) -> Self {
        self.test_accuracy = Some(accuracy);
        self
    }
}

/// Fitted transform plus the model trained on its output. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployableArtifact {
    transform: FittedTransform,
    model: TrainedModel,
    metadata: ArtifactMetadata,
}

impl DeployableArtifact {
    pub fn new(transform: FittedTransform, model: TrainedModel, metadata: ArtifactMetadata) -> Result<Self> {
        let artifact = Self {
            transform,
            model,
            metadata,
        };
        artifact.validate()?;
        Ok(artifact)
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<()> {
        self.transform.validate()?;
        if self.model.kind() != self.metadata.model_kind {
            return Err(AutisenseError::InferenceError(format!(
                "artifact metadata names {} but holds {}",
                self.metadata.model_kind,
                self.model.kind()
            )));
        }
        if let Some(importances) = self.model.feature_importances() {
            if importances.len() != self.transform.n_features() {
                return Err(AutisenseError::ShapeError {
                    expected: format!("{} features", self.transform.n_features()),
                    actual: format!("{} features", importances.len()),
                });
            }
        }
        Ok(())
    }

    pub fn transform(&self) -> &FittedTransform {
        &self.transform
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    pub fn metadata(&self) -> &ArtifactMetadata {
        &self.metadata
    }

    /// Importances keyed by encoded feature name
    pub fn feature_importances(&self) -> Option<BTreeMap<String, f64>> {
        let importances = self.model.feature_importances()?;
        Some(name_values(&self.transform.feature_names(), &importances.to_vec()))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let artifact: Self = serde_json::from_slice(bytes)?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Write as pretty-printed JSON. The bytes go to a temporary file in the
    /// target directory which is then renamed over `path`, so a reader never
    /// sees a half-written artifact.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                parent
            }
            None => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(&serde_json::to_vec_pretty(self)?)?;
        staged.as_file().sync_all()?;
        staged.persist(path).map_err(|e| e.error)?;
        info!(
            path = %path.display(),
            model = %self.metadata.model_name,
            id = %self.metadata.id,
            "Saved artifact"
        );
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let artifact: Self = serde_json::from_str(&text)?;
        artifact.validate()?;
        info!(
            path = %path.display(),
            model = %artifact.metadata.model_name,
            id = %artifact.metadata.id,
            "Loaded artifact"
        );
        Ok(artifact)
    }
}
