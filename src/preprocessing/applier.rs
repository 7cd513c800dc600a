//! Applying a fitted transform to records

use super::encoder::categorical_value;
use super::{FieldValue, FittedTransform, RawRecord};
use crate::error::{AutisenseError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Numeric reading of a field value; `None` means "impute".
///
/// Text that parses as a number is accepted so CSV and form input behave alike.
pub(crate) fn numeric_value(field: &str, value: &FieldValue) -> Result<Option<f64>> {
    match value {
        FieldValue::Missing => Ok(None),
        FieldValue::Number(v) if v.is_nan() => Ok(None),
        FieldValue::Number(v) if v.is_infinite() => Err(AutisenseError::InvalidInput(format!(
            "field '{}' must be finite, got {}",
            field, v
        ))),
        FieldValue::Number(v) => Ok(Some(*v)),
        FieldValue::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Some)
                .ok_or_else(|| {
                    AutisenseError::InvalidInput(format!(
                        "field '{}' expects a number, got '{}'",
                        field, s
                    ))
                })
        }
    }
}

impl FittedTransform {
    /// Encode one record: scaled numeric fields, then categorical codes.
    ///
    /// Reads nothing but the stored statistics, so the same record always yields
    /// the same vector.
    pub fn apply(&self, record: &RawRecord) -> Result<Array1<f64>> {
        self.schema.check_record(record)?;

        let mut encoded = Vec::with_capacity(self.n_features());

        for stats in &self.numeric {
            let value = match record.get(stats.field()) {
                Some(v) => numeric_value(stats.field(), v)?,
                None => None,
            };
            let raw = value.unwrap_or_else(|| stats.fill_value());
            encoded.push(stats.scaling().scale(raw));
        }

        for vocab in &self.categorical {
            let normalized = record
                .get(vocab.field())
                .and_then(categorical_value)
                .unwrap_or_else(|| vocab.fill_value().to_string());
            encoded.push(vocab.encode(&normalized)? as f64);
        }

        Ok(Array1::from_vec(encoded))
    }

    /// Encode a batch of records into a row matrix.
    ///
    /// All-or-nothing: if any record fails, the error of the first failing
    /// record (in input order) is returned and no matrix is produced.
    pub fn apply_batch(&self, records: &[RawRecord]) -> Result<Array2<f64>> {
        let n_features = self.n_features();

        let rows: Vec<Result<Array1<f64>>> = records.par_iter().map(|r| self.apply(r)).collect();

        let mut flat = Vec::with_capacity(records.len() * n_features);
        for (idx, row) in rows.into_iter().enumerate() {
            match row {
                Ok(row) => flat.extend(row.iter().copied()),
                Err(e) => {
                    tracing::debug!(record = idx, error = %e, "Batch encoding failed");
                    return Err(e);
                }
            }
        }

        Ok(Array2::from_shape_vec((records.len(), n_features), flat)?)
    }

    /// Map the categorical codes of an encoded row back through the vocabularies
    pub fn decode_categorical(&self, row: ArrayView1<'_, f64>) -> Result<BTreeMap<String, String>> {
        if row.len() != self.n_features() {
            return Err(AutisenseError::ShapeError {
                expected: format!("{} encoded features", self.n_features()),
                actual: format!("{} values", row.len()),
            });
        }

        let offset = self.numeric.len();
        self.categorical
            .iter()
            .enumerate()
            .map(|(j, vocab)| {
                let code = row[offset + j];
                let value = if code >= 0.0 && code.fract() == 0.0 {
                    vocab.decode(code as usize)
                } else {
                    None
                };
                value
                    .map(|v| (vocab.field().to_string(), v.to_string()))
                    .ok_or_else(|| {
                        AutisenseError::InvalidInput(format!(
                            "code {} is outside the vocabulary of '{}'",
                            code,
                            vocab.field()
                        ))
                    })
            })
            .collect()
    }

    /// Map scaled numeric entries of an encoded row back to raw units
    pub fn decode_numeric(&self, row: ArrayView1<'_, f64>) -> Result<BTreeMap<String, f64>> {
        if row.len() != self.n_features() {
            return Err(AutisenseError::ShapeError {
                expected: format!("{} encoded features", self.n_features()),
                actual: format!("{} values", row.len()),
            });
        }

        Ok(self
            .numeric
            .iter()
            .enumerate()
            .map(|(j, stats)| (stats.field().to_string(), stats.scaling().unscale(row[j])))
            .collect())
    }

    /// Code of a raw categorical value after normalization
    pub fn code_of(&self, field: &str, value: &str) -> Result<usize> {
        let vocab = self
            .vocabulary(field)
            .ok_or_else(|| AutisenseError::FeatureNotFound(field.to_string()))?;
        vocab.encode(&super::normalize_category(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::{FieldSchema, TransformFitter};

    fn fitted() -> FittedTransform {
        let schema = FieldSchema::new(["age"], ["sex"]);
        let records = vec![
            RawRecord::new().with_number("age", 12.0).with_text("sex", "m"),
            RawRecord::new().with_number("age", 24.0).with_text("sex", "f"),
            RawRecord::new().with_number("age", 36.0).with_text("sex", "M "),
        ];
        TransformFitter::new(schema).fit(&records).unwrap()
    }

    #[test]
    fn test_apply_layout() {
        let t = fitted();
        let row = t
            .apply(&RawRecord::new().with_number("age", 24.0).with_text("sex", " F"))
            .unwrap();
        assert_eq!(row.len(), 2);
        assert!(row[0].abs() < 1e-12);
        assert_eq!(row[1], 0.0);
    }

    #[test]
    fn test_missing_values_use_fill() {
        let t = fitted();
        let row = t
            .apply(&RawRecord::new().with_missing("age").with_missing("sex"))
            .unwrap();
        assert!(row[0].abs() < 1e-12);
        assert_eq!(row[1], 1.0);
    }

    #[test]
    fn test_numeric_text_is_parsed() {
        let t = fitted();
        let row = t
            .apply(&RawRecord::new().with_text("age", "36").with_text("sex", "m"))
            .unwrap();
        assert!(row[0] > 0.0);

        let err = t
            .apply(&RawRecord::new().with_text("age", "old").with_text("sex", "m"))
            .unwrap_err();
        assert!(matches!(err, AutisenseError::InvalidInput(_)));
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let t = fitted();
        let records = vec![
            RawRecord::new().with_number("age", 12.0).with_text("sex", "m"),
            RawRecord::new().with_number("age", 12.0).with_text("sex", "x"),
            RawRecord::new().with_number("age", 12.0).with_text("sex", "y"),
        ];
        match t.apply_batch(&records) {
            Err(AutisenseError::UnknownCategory { field, value }) => {
                assert_eq!(field, "sex");
                assert_eq!(value, "x");
            }
            other => panic!("expected unknown category, got {:?}", other),
        }
    }

    #[test]
    fn test_decode() {
        let t = fitted();
        let row = t
            .apply(&RawRecord::new().with_number("age", 30.0).with_text("sex", "m"))
            .unwrap();
        let cats = t.decode_categorical(row.view()).unwrap();
        assert_eq!(cats["sex"], "m");
        let nums = t.decode_numeric(row.view()).unwrap();
        assert!((nums["age"] - 30.0).abs() < 1e-9);
        assert_eq!(t.code_of("sex", "M").unwrap(), 1);
    }
}
