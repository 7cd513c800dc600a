//! Feature transform for screening records
//!
//! The transform turns a [`RawRecord`] into the numeric vector classifiers consume:
//! - Missing value imputation (mean for numeric fields, mode for categorical fields)
//! - Categorical normalization and sorted integer coding
//! - Standard scaling of numeric fields with a divisor floor for constant fields
//!
//! [`TransformFitter`] builds a [`FittedTransform`] from the training split only;
//! the fitted value is then applied unchanged to every later record.

mod applier;
mod config;
mod encoder;
mod fitter;
mod imputer;
pub mod labels;
mod scaler;

pub use config::{FieldSchema, FitterConfig, ModeTiePolicy};
pub use encoder::{normalize_category, CategoryVocabulary};
pub use fitter::{FittedTransform, NumericFieldStats, TransformFitter};
pub use imputer::Imputer;
pub use labels::{normalize_label, normalize_labels};
pub use scaler::ScalerParams;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single field value as it arrives from a file, a form or a JSON body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Missing,
}

impl FieldValue {
    /// True when the value should be imputed
    pub fn is_missing(&self) -> bool {
        match self {
            FieldValue::Missing => true,
            FieldValue::Number(v) => v.is_nan(),
            FieldValue::Text(s) => s.trim().is_empty(),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Missing)
    }
}

/// One unlabelled questionnaire row, keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to add a numeric field
    pub fn with_number(mut self, field: impl Into<String>, value: f64) -> Self {
        self.fields.insert(field.into(), FieldValue::Number(value));
        self
    }

    /// Builder method to add a text field
    pub fn with_text(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(field.into(), FieldValue::Text(value.into()));
        self
    }

    /// Builder method to add an explicitly missing field
    pub fn with_missing(mut self, field: impl Into<String>) -> Self {
        self.fields.insert(field.into(), FieldValue::Missing);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.fields.insert(field.into(), value)
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.fields.remove(field)
    }

    /// Field names in sorted order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_json_forms() {
        let values: Vec<FieldValue> = serde_json::from_str(r#"[1.5, "m", null]"#).unwrap();
        assert_eq!(values[0], FieldValue::Number(1.5));
        assert_eq!(values[1], FieldValue::Text("m".to_string()));
        assert_eq!(values[2], FieldValue::Missing);
    }

    #[test]
    fn test_missing_detection() {
        assert!(FieldValue::Missing.is_missing());
        assert!(FieldValue::Number(f64::NAN).is_missing());
        assert!(FieldValue::Text("   ".to_string()).is_missing());
        assert!(!FieldValue::Text("no".to_string()).is_missing());
    }

    #[test]
    fn test_record_is_a_flat_json_object() {
        let record = RawRecord::new().with_number("A1", 1.0).with_text("Sex", "m");
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"A1":1.0,"Sex":"m"}"#);

        let back: RawRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
