//! Binary label normalization
//!
//! Labels arrive either as `"Yes"`/`"No"` text or as `1`/`0` numbers. Everything
//! downstream sees `1.0` for the positive class and `0.0` for the negative one.

use super::FieldValue;
use crate::error::{AutisenseError, Result};
use ndarray::Array1;

/// Encoded value of the positive class ("Yes")
pub const POSITIVE: f64 = 1.0;
/// Encoded value of the negative class ("No")
pub const NEGATIVE: f64 = 0.0;

/// Display name of an encoded label
pub fn label_name(label: f64) -> &'static str {
    if label >= 0.5 {
        "Yes"
    } else {
        "No"
    }
}

/// Normalize one label value
pub fn normalize_label(value: &FieldValue) -> Result<f64> {
    let invalid = || AutisenseError::InvalidLabel {
        value: match value {
            FieldValue::Number(v) => v.to_string(),
            FieldValue::Text(s) => s.clone(),
            FieldValue::Missing => "<missing>".to_string(),
        },
    };

    match value {
        FieldValue::Number(v) if *v == 1.0 => Ok(POSITIVE),
        FieldValue::Number(v) if *v == 0.0 => Ok(NEGATIVE),
        FieldValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "1" | "1.0" | "true" => Ok(POSITIVE),
            "no" | "0" | "0.0" | "false" => Ok(NEGATIVE),
            _ => Err(invalid()),
        },
        _ => Err(invalid()),
    }
}

/// Normalize a label column
pub fn normalize_labels(values: &[FieldValue]) -> Result<Array1<f64>> {
    values.iter().map(normalize_label).collect::<Result<Vec<f64>>>().map(Array1::from_vec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_and_numeric_forms_agree() {
        let text = normalize_labels(&["Yes".into(), " no".into(), "YES".into()]).unwrap();
        let numeric = normalize_labels(&[1.0.into(), 0.0.into(), 1.0.into()]).unwrap();
        assert_eq!(text, numeric);
    }

    #[test]
    fn test_invalid_label() {
        assert!(matches!(
            normalize_label(&"maybe".into()),
            Err(AutisenseError::InvalidLabel { .. })
        ));
        assert!(normalize_label(&FieldValue::Number(2.0)).is_err());
        assert!(normalize_label(&FieldValue::Missing).is_err());
    }

    #[test]
    fn test_label_name() {
        assert_eq!(label_name(POSITIVE), "Yes");
        assert_eq!(label_name(NEGATIVE), "No");
    }
}
