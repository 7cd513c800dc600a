//! Transform fitting from a training split

use super::applier::numeric_value;
use super::encoder::{categorical_value, CategoryVocabulary};
use super::{FieldSchema, FitterConfig, Imputer, RawRecord, ScalerParams};
use crate::error::{AutisenseError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Imputation and scaling statistics of one numeric field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericFieldStats {
    field: String,
    fill_value: f64,
    scaling: ScalerParams,
}

impl NumericFieldStats {
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Training mean of the observed values, used for missing entries
    pub fn fill_value(&self) -> f64 {
        self.fill_value
    }

    pub fn scaling(&self) -> &ScalerParams {
        &self.scaling
    }
}

/// Immutable encoder/scaler bundle derived from one training split.
///
/// There are no mutating accessors: a new training run produces a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedTransform {
    pub(super) schema: FieldSchema,
    pub(super) numeric: Vec<NumericFieldStats>,
    pub(super) categorical: Vec<CategoryVocabulary>,
    pub(super) n_fit_records: usize,
}

impl FittedTransform {
    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn numeric_stats(&self) -> &[NumericFieldStats] {
        &self.numeric
    }

    pub fn vocabularies(&self) -> &[CategoryVocabulary] {
        &self.categorical
    }

    /// Vocabulary of a categorical field
    pub fn vocabulary(&self, field: &str) -> Option<&CategoryVocabulary> {
        self.categorical.iter().find(|v| v.field() == field)
    }

    /// Number of training records the statistics were computed from
    pub fn n_fit_records(&self) -> usize {
        self.n_fit_records
    }

    /// Column names of the encoded vector
    pub fn feature_names(&self) -> Vec<String> {
        self.schema.feature_fields().map(str::to_string).collect()
    }

    pub fn n_features(&self) -> usize {
        self.numeric.len() + self.categorical.len()
    }

    /// Check the invariants of a transform read back from disk
    pub fn validate(&self) -> Result<()> {
        self.schema.validate()?;

        let numeric_match = self.numeric.len() == self.schema.numeric_fields.len()
            && self.numeric.iter().zip(&self.schema.numeric_fields).all(|(s, f)| &s.field == f);
        let categorical_match = self.categorical.len() == self.schema.categorical_fields.len()
            && self
                .categorical
                .iter()
                .zip(&self.schema.categorical_fields)
                .all(|(v, f)| v.field() == f);
        if !numeric_match || !categorical_match {
            return Err(AutisenseError::SerializationError(
                "transform statistics do not line up with its schema".to_string(),
            ));
        }

        for stats in &self.numeric {
            if !(stats.scaling.std > 0.0) || !stats.scaling.mean.is_finite() || !stats.fill_value.is_finite() {
                return Err(AutisenseError::SerializationError(format!(
                    "invalid scaling statistics for '{}'",
                    stats.field
                )));
            }
        }
        for vocab in &self.categorical {
            vocab.validate()?;
        }
        Ok(())
    }
}

/// Builds a [`FittedTransform`] from training records
#[derive(Debug, Clone)]
pub struct TransformFitter {
    schema: FieldSchema,
    config: FitterConfig,
}

impl TransformFitter {
    pub fn new(schema: FieldSchema) -> Self {
        Self {
            schema,
            config: FitterConfig::default(),
        }
    }

    /// Builder method to set the fitter configuration
    pub fn with_config(mut self, config: FitterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    /// Fit imputation, vocabulary and scaling statistics on `records`.
    pub fn fit(&self, records: &[RawRecord]) -> Result<FittedTransform> {
        self.schema.validate()?;

        if records.is_empty() {
            return Err(AutisenseError::DataError(
                "cannot fit a transform on an empty training set".to_string(),
            ));
        }

        for (idx, record) in records.iter().enumerate() {
            self.schema.check_record(record).map_err(|e| {
                debug!(record = idx, error = %e, "Training record rejected");
                e
            })?;
        }

        let imputer = Imputer::new(self.config.tie_policy);

        let mut numeric = Vec::with_capacity(self.schema.numeric_fields.len());
        for field in &self.schema.numeric_fields {
            let observed = records
                .iter()
                .map(|r| match r.get(field) {
                    Some(value) => numeric_value(field, value),
                    None => Ok(None),
                })
                .collect::<Result<Vec<Option<f64>>>>()?;

            let fill_value = imputer.numeric_fill(field, &observed)?;
            let imputed: Vec<f64> = observed.iter().map(|v| v.unwrap_or(fill_value)).collect();
            let scaling = ScalerParams::fit(&imputed, self.config.zero_variance_tolerance);

            if scaling.floored {
                warn!(field = %field, value = scaling.mean, "Numeric field has zero variance; using unit divisor");
            }

            numeric.push(NumericFieldStats {
                field: field.clone(),
                fill_value,
                scaling,
            });
        }

        let mut categorical = Vec::with_capacity(self.schema.categorical_fields.len());
        for field in &self.schema.categorical_fields {
            let observed: Vec<Option<String>> = records
                .iter()
                .map(|r| r.get(field).and_then(categorical_value))
                .collect();

            let fill_value = imputer.categorical_fill(field, &observed)?;
            let vocab = CategoryVocabulary::fit(
                field,
                observed.iter().flatten().map(String::as_str),
                fill_value,
            );
            debug!(field = %field, size = vocab.len(), "Fitted vocabulary");
            categorical.push(vocab);
        }

        info!(
            records = records.len(),
            numeric_fields = numeric.len(),
            categorical_fields = categorical.len(),
            "Transform fitted"
        );

        Ok(FittedTransform {
            schema: self.schema.clone(),
            numeric,
            categorical,
            n_fit_records: records.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::{FieldValue, ModeTiePolicy};

    fn schema() -> FieldSchema {
        FieldSchema::new(["age", "score"], ["sex", "role"])
    }

    fn record(age: Option<f64>, score: f64, sex: &str, role: &str) -> RawRecord {
        let mut r = RawRecord::new()
            .with_number("score", score)
            .with_text("sex", sex)
            .with_text("role", role);
        r.insert("age", FieldValue::from(age));
        r
    }

    #[test]
    fn test_fit_statistics() {
        let records = vec![
            record(Some(10.0), 1.0, "M", " Self"),
            record(None, 1.0, "f", "self "),
            record(Some(30.0), 1.0, "m", "Family Member"),
        ];
        let transform = TransformFitter::new(schema()).fit(&records).unwrap();

        let age = &transform.numeric_stats()[0];
        assert_eq!(age.field(), "age");
        assert!((age.fill_value() - 20.0).abs() < 1e-12);
        assert!((age.scaling().mean - 20.0).abs() < 1e-12);

        let score = &transform.numeric_stats()[1];
        assert!(score.scaling().floored);

        let role = transform.vocabulary("role").unwrap();
        assert_eq!(role.values(), &["family member".to_string(), "self".to_string()]);
        assert_eq!(role.fill_value(), "self");
    }

    #[test]
    fn test_fit_rejects_partial_record() {
        let bad = RawRecord::new().with_number("age", 1.0).with_text("sex", "m");
        let err = TransformFitter::new(schema()).fit(&[bad]).unwrap_err();
        assert!(matches!(err, AutisenseError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_fit_rejects_text_in_numeric_field() {
        let mut bad = record(Some(1.0), 1.0, "m", "self");
        bad.insert("score", FieldValue::Text("high".to_string()));
        let err = TransformFitter::new(schema()).fit(&[bad]).unwrap_err();
        assert!(matches!(err, AutisenseError::InvalidInput(_)));
    }

    #[test]
    fn test_tie_policy_is_applied() {
        let records = vec![
            record(Some(1.0), 1.0, "m", "self"),
            record(Some(2.0), 2.0, "f", "self"),
        ];
        let fitter = TransformFitter::new(schema())
            .with_config(FitterConfig::new().with_tie_policy(ModeTiePolicy::Reject));
        let err = fitter.fit(&records).unwrap_err();
        assert!(matches!(err, AutisenseError::ImputationAmbiguity { .. }));

        let transform = TransformFitter::new(schema()).fit(&records).unwrap();
        assert_eq!(transform.vocabulary("sex").unwrap().fill_value(), "f");
    }

    #[test]
    fn test_empty_training_set() {
        assert!(TransformFitter::new(schema()).fit(&[]).is_err());
    }

    #[test]
    fn test_round_trip_through_json_keeps_validity() {
        let records = vec![
            record(Some(10.0), 1.0, "m", "self"),
            record(Some(20.0), 3.0, "f", "others"),
        ];
        let transform = TransformFitter::new(schema()).fit(&records).unwrap();
        let json = serde_json::to_string(&transform).unwrap();
        let back: FittedTransform = serde_json::from_str(&json).unwrap();
        back.validate().unwrap();
        assert_eq!(back, transform);
    }
}
