//! Categorical normalization and sorted-vocabulary coding

use super::FieldValue;
use crate::error::{AutisenseError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Trim surrounding whitespace and lowercase
pub fn normalize_category(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Render a number used as a category; integral values drop the fraction (`1.0` -> `"1"`)
pub(crate) fn render_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Normalized categorical value, or `None` when the field should be imputed
pub(crate) fn categorical_value(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Missing => None,
        FieldValue::Number(v) if v.is_nan() => None,
        FieldValue::Number(v) => Some(render_number(*v)),
        FieldValue::Text(s) => {
            let normalized = normalize_category(s);
            if normalized.is_empty() {
                None
            } else {
                Some(normalized)
            }
        }
    }
}

/// Sorted vocabulary of one categorical field; a value's code is its index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryVocabulary {
    field: String,
    fill_value: String,
    values: Vec<String>,
}

impl CategoryVocabulary {
    /// Build from the normalized values observed in training.
    ///
    /// The fill value always belongs to the vocabulary because it is one of the
    /// observed values.
    pub(crate) fn fit<'a, I>(field: &str, observed: I, fill_value: String) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut set: BTreeSet<String> = observed.into_iter().map(str::to_string).collect();
        set.insert(fill_value.clone());

        Self {
            field: field.to_string(),
            fill_value,
            values: set.into_iter().collect(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Value substituted for missing entries
    pub fn fill_value(&self) -> &str {
        &self.fill_value
    }

    /// Vocabulary in code order
    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Code of an already-normalized value
    pub fn encode(&self, normalized: &str) -> Result<usize> {
        self.values
            .binary_search_by(|v| v.as_str().cmp(normalized))
            .map_err(|_| AutisenseError::UnknownCategory {
                field: self.field.clone(),
                value: normalized.to_string(),
            })
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.values.get(code).map(String::as_str)
    }

    /// Check the invariants a deserialized vocabulary must satisfy
    pub(crate) fn validate(&self) -> Result<()> {
        let sorted = self.values.windows(2).all(|w| w[0] < w[1]);
        if !sorted || self.values.is_empty() {
            return Err(AutisenseError::SerializationError(format!(
                "vocabulary of '{}' is empty or not strictly sorted",
                self.field
            )));
        }
        self.encode(&self.fill_value).map(|_| ())
    }
}
