//! Field schema and fitter configuration

use super::RawRecord;
use crate::error::{AutisenseError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Numeric questionnaire fields of the screening dataset
pub const SCREENING_NUMERIC_FIELDS: [&str; 11] = [
    "A1", "A2", "A3", "A4", "A5", "A6", "A7", "A8", "A9", "A10", "Age_Mons",
];

/// Categorical fields of the screening dataset
pub const SCREENING_CATEGORICAL_FIELDS: [&str; 5] = [
    "Sex",
    "Ethnicity",
    "Jaundice",
    "Family_mem_with_ASD",
    "Who completed the test",
];

/// Declares which columns are features, which is the label and which are ignored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Fields standardized with mean/std
    pub numeric_fields: Vec<String>,

    /// Fields coded through a sorted vocabulary
    pub categorical_fields: Vec<String>,

    /// Binary outcome column (training files only)
    pub label_field: String,

    /// Row identifier, dropped before fitting
    pub id_field: Option<String>,

    /// Other columns dropped before fitting
    pub excluded_fields: Vec<String>,
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::screening()
    }
}

impl FieldSchema {
    /// Create a schema with the given feature fields and no label/id metadata
    pub fn new<N, C>(numeric: N, categorical: C) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            numeric_fields: numeric.into_iter().map(Into::into).collect(),
            categorical_fields: categorical.into_iter().map(Into::into).collect(),
            label_field: "label".to_string(),
            id_field: None,
            excluded_fields: Vec::new(),
        }
    }

    /// The Q-CHAT-10 toddler screening layout
    pub fn screening() -> Self {
        Self {
            numeric_fields: SCREENING_NUMERIC_FIELDS.iter().map(|s| s.to_string()).collect(),
            categorical_fields: SCREENING_CATEGORICAL_FIELDS.iter().map(|s| s.to_string()).collect(),
            label_field: "Class/ASD Traits".to_string(),
            id_field: Some("Case_No".to_string()),
            excluded_fields: vec!["Qchat-10-Score".to_string()],
        }
    }

    /// Builder method to set the label column
    pub fn with_label_field(mut self, field: impl Into<String>) -> Self {
        self.label_field = field.into();
        self
    }

    /// Builder method to set the identifier column
    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = Some(field.into());
        self
    }

    /// Builder method to set the dropped columns
    pub fn with_excluded_fields<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.excluded_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Feature fields in encoded-vector order: numeric first, then categorical
    pub fn feature_fields(&self) -> impl Iterator<Item = &str> {
        self.numeric_fields
            .iter()
            .chain(self.categorical_fields.iter())
            .map(String::as_str)
    }

    pub fn n_features(&self) -> usize {
        self.numeric_fields.len() + self.categorical_fields.len()
    }

    /// The exact field set a record must carry
    pub fn expected_fields(&self) -> BTreeSet<String> {
        self.feature_fields().map(str::to_string).collect()
    }

    /// Check that the schema is usable
    pub fn validate(&self) -> Result<()> {
        if self.n_features() == 0 {
            return Err(AutisenseError::ConfigError(
                "schema declares no feature fields".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for field in self.feature_fields() {
            if !seen.insert(field) {
                return Err(AutisenseError::ConfigError(format!(
                    "field '{}' is declared more than once",
                    field
                )));
            }
        }

        let reserved = std::iter::once(self.label_field.as_str())
            .chain(self.id_field.as_deref())
            .chain(self.excluded_fields.iter().map(String::as_str));
        for field in reserved {
            if seen.contains(field) {
                return Err(AutisenseError::ConfigError(format!(
                    "field '{}' cannot be both a feature and a non-feature column",
                    field
                )));
            }
        }

        Ok(())
    }

    /// Compare a record's field set with the declared features.
    pub fn check_record(&self, record: &RawRecord) -> Result<()> {
        let expected = self.expected_fields();

        let missing: Vec<String> = expected
            .iter()
            .filter(|f| record.get(f).is_none())
            .cloned()
            .collect();
        let unexpected: Vec<String> = record
            .field_names()
            .filter(|f| !expected.contains(*f))
            .map(str::to_string)
            .collect();

        if missing.is_empty() && unexpected.is_empty() {
            Ok(())
        } else {
            Err(AutisenseError::SchemaMismatch { missing, unexpected })
        }
    }
}

/// How to resolve a categorical field whose mode is shared by several values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModeTiePolicy {
    /// Pick the lexicographically smallest of the tied values
    #[default]
    Lexicographic,
    /// Fail with `ImputationAmbiguity`
    Reject,
}

/// Configuration for fitting a transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitterConfig {
    /// Resolution of tied categorical modes
    pub tie_policy: ModeTiePolicy,

    /// Relative threshold below which a standard deviation counts as zero
    pub zero_variance_tolerance: f64,
}

impl Default for FitterConfig {
    fn default() -> Self {
        Self {
            tie_policy: ModeTiePolicy::Lexicographic,
            zero_variance_tolerance: 1e-12,
        }
    }
}

impl FitterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the mode tie policy
    pub fn with_tie_policy(mut self, policy: ModeTiePolicy) -> Self {
        self.tie_policy = policy;
        self
    }

    /// Builder method to set the zero-variance tolerance
    pub fn with_zero_variance_tolerance(mut self, tolerance: f64) -> Self {
        self.zero_variance_tolerance = tolerance;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screening_schema() {
        let schema = FieldSchema::screening();
        assert_eq!(schema.n_features(), 16);
        assert_eq!(schema.feature_fields().next(), Some("A1"));
        assert_eq!(schema.feature_fields().last(), Some("Who completed the test"));
        schema.validate().unwrap();
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let schema = FieldSchema::new(["x", "y"], ["x"]);
        assert!(matches!(schema.validate(), Err(AutisenseError::ConfigError(_))));
    }

    #[test]
    fn test_label_cannot_be_feature() {
        let schema = FieldSchema::new(["x"], ["c"]).with_label_field("x");
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_check_record_reports_both_sides() {
        let schema = FieldSchema::new(["x", "y"], ["c"]);
        let record = RawRecord::new()
            .with_number("x", 1.0)
            .with_text("c", "a")
            .with_number("z", 0.0);

        match schema.check_record(&record) {
            Err(AutisenseError::SchemaMismatch { missing, unexpected }) => {
                assert_eq!(missing, vec!["y".to_string()]);
                assert_eq!(unexpected, vec!["z".to_string()]);
            }
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_builder_pattern() {
        let config = FitterConfig::new()
            .with_tie_policy(ModeTiePolicy::Reject)
            .with_zero_variance_tolerance(1e-9);
        assert_eq!(config.tie_policy, ModeTiePolicy::Reject);
        assert_eq!(config.zero_variance_tolerance, 1e-9);
    }
}
