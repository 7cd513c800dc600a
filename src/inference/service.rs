//! Prediction over raw records with a hot-swappable artifact

use ndarray::Array2;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::artifact::DeployableArtifact;
use crate::error::{AutisenseError, Result};
use crate::preprocessing::labels::label_name;
use crate::preprocessing::RawRecord;
use crate::training::Classifier;

/// Class probabilities of one record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Probabilities {
    pub negative: f64,
    pub positive: f64,
}

/// Outcome for one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// 1 for "Yes" (traits detected), 0 for "No"
    pub label: u8,
    pub label_name: String,
    pub probabilities: Probabilities,
}

impl Prediction {
    pub fn is_positive(&self) -> bool {
        self.label == 1
    }
}

/// Serves predictions from the current artifact.
///
/// Each call takes its own `Arc` of the artifact, so a concurrent `swap` never
/// changes the artifact under an in-flight prediction.
pub struct InferenceService {
    artifact: RwLock<Arc<DeployableArtifact>>,
}

impl InferenceService {
    pub fn new(artifact: DeployableArtifact) -> Self {
        Self {
            artifact: RwLock::new(Arc::new(artifact)),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(DeployableArtifact::load(path)?))
    }

    /// Snapshot of the current artifact
    pub fn artifact(&self) -> Arc<DeployableArtifact> {
        Arc::clone(&self.artifact.read())
    }

    /// Replace the artifact, returning the previous one
    pub fn swap(&self, artifact: DeployableArtifact) -> Arc<DeployableArtifact> {
        let new = Arc::new(artifact);
        let old = std::mem::replace(&mut *self.artifact.write(), new);
        info!(
            old_id = %old.metadata().id,
            new_id = %self.artifact().metadata().id,
            "Swapped artifact"
        );
        old
    }

    /// Load from disk and swap; the current artifact stays on failure
    pub fn reload(&self, path: impl AsRef<Path>) -> Result<Arc<DeployableArtifact>> {
        let artifact = DeployableArtifact::load(path)?;
        Ok(self.swap(artifact))
    }

    pub fn predict(&self, record: &RawRecord) -> Result<Prediction> {
        let mut predictions = self.predict_batch(std::slice::from_ref(record))?;
        predictions
            .pop()
            .ok_or_else(|| AutisenseError::InferenceError("model returned no prediction".to_string()))
    }

    /// All-or-nothing: one bad record fails the batch
    pub fn predict_batch(&self, records: &[RawRecord]) -> Result<Vec<Prediction>> {
        let artifact = self.artifact();
        let start = Instant::now();

        let schema = artifact.transform().schema();
        for record in records {
            schema.check_record(record)?;
        }
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let x = artifact.transform().apply_batch(records)?;
        let labels = artifact.model().predict(&x)?;
        let proba = artifact.model().predict_proba(&x)?;
        let predictions = assemble(&labels.to_vec(), &proba)?;

        debug!(
            records = records.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Predicted batch"
        );
        Ok(predictions)
    }
}

fn assemble(labels: &[f64], proba: &Array2<f64>) -> Result<Vec<Prediction>> {
    if proba.nrows() != labels.len() || proba.ncols() != 2 {
        return Err(AutisenseError::ShapeError {
            expected: format!("{}x2 probabilities", labels.len()),
            actual: format!("{}x{}", proba.nrows(), proba.ncols()),
        });
    }

    labels
        .iter()
        .zip(proba.rows())
        .map(|(&label, row)| {
            let total = row[0] + row[1];
            if !(total.is_finite() && total > 0.0) {
                return Err(AutisenseError::InferenceError(format!(
                    "invalid probabilities [{}, {}]",
                    row[0], row[1]
                )));
            }
            let label = if label >= 0.5 { 1u8 } else { 0u8 };
            Ok(Prediction {
                label,
                label_name: label_name(f64::from(label)).to_string(),
                probabilities: Probabilities {
                    negative: row[0] / total,
                    positive: row[1] / total,
                },
            })
        })
        .collect()
}

/// The reference questionnaire answered "yes" on every item
pub fn sample_record() -> RawRecord {
    let mut record = RawRecord::new();
    for i in 1..=10 {
        record = record.with_number(format!("A{}", i), 1.0);
    }
    record
        .with_number("Age_Mons", 36.0)
        .with_text("Sex", "m")
        .with_text("Ethnicity", "White European")
        .with_text("Jaundice", "yes")
        .with_text("Family_mem_with_ASD", "yes")
        .with_text("Who completed the test", "family member")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_assemble_normalizes() {
        let predictions = assemble(&[1.0, 0.0], &array![[0.2, 0.6], [0.9, 0.1]]).unwrap();
        assert_eq!(predictions[0].label, 1);
        assert_eq!(predictions[0].label_name, "Yes");
        assert!((predictions[0].probabilities.positive - 0.75).abs() < 1e-12);
        assert_eq!(predictions[1].label_name, "No");
    }

    #[test]
    fn test_assemble_rejects_shape() {
        assert!(assemble(&[1.0], &array![[0.5, 0.5], [0.5, 0.5]]).is_err());
    }

    #[test]
    fn test_sample_record_fields() {
        let record = sample_record();
        assert_eq!(record.len(), 16);
        assert!(crate::preprocessing::FieldSchema::screening().check_record(&record).is_ok());
    }
}
