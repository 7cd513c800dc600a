//! Missing value imputation statistics

use super::ModeTiePolicy;
use crate::error::{AutisenseError, Result};
use std::collections::BTreeMap;

/// Computes fill values for missing fields
#[derive(Debug, Clone, Copy, Default)]
pub struct Imputer {
    tie_policy: ModeTiePolicy,
}

impl Imputer {
    pub fn new(tie_policy: ModeTiePolicy) -> Self {
        Self { tie_policy }
    }

    /// Mean over the observed values of a numeric field
    pub fn numeric_fill(&self, field: &str, values: &[Option<f64>]) -> Result<f64> {
        let (sum, count) = values
            .iter()
            .flatten()
            .fold((0.0, 0usize), |(s, c), &v| (s + v, c + 1));

        if count == 0 {
            return Err(AutisenseError::DataError(format!(
                "numeric field '{}' has no observed values to impute from",
                field
            )));
        }
        Ok(sum / count as f64)
    }

    /// Most frequent observed value of a categorical field.
    ///
    /// Values are expected to be normalized already. Ties go to the
    /// lexicographically smallest value unless the policy rejects them.
    pub fn categorical_fill(&self, field: &str, values: &[Option<String>]) -> Result<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for v in values.iter().flatten() {
            *counts.entry(v.as_str()).or_insert(0) += 1;
        }

        let best = counts.values().copied().max().ok_or_else(|| {
            AutisenseError::DataError(format!(
                "categorical field '{}' has no observed values to impute from",
                field
            ))
        })?;

        // BTreeMap iterates in sorted order, so the first tied value is the smallest
        let tied: Vec<&str> = counts
            .iter()
            .filter(|(_, &c)| c == best)
            .map(|(&v, _)| v)
            .collect();

        if tied.len() > 1 {
            if self.tie_policy == ModeTiePolicy::Reject {
                return Err(AutisenseError::ImputationAmbiguity {
                    field: field.to_string(),
                    candidates: tied.iter().map(|s| s.to_string()).collect(),
                });
            }
            tracing::debug!(field = %field, candidates = ?tied, chosen = %tied[0], "Resolved tied mode");
        }

        Ok(tied[0].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cats(values: &[Option<&str>]) -> Vec<Option<String>> {
        values.iter().map(|v| v.map(str::to_string)).collect()
    }

    #[test]
    fn test_numeric_mean_ignores_missing() {
        let imputer = Imputer::default();
        let fill = imputer.numeric_fill("Age_Mons", &[Some(12.0), None, Some(24.0)]).unwrap();
        assert!((fill - 18.0).abs() < 1e-12);
    }

    #[test]
    fn test_numeric_all_missing_is_error() {
        let imputer = Imputer::default();
        assert!(imputer.numeric_fill("A1", &[None, None]).is_err());
    }

    #[test]
    fn test_mode() {
        let imputer = Imputer::default();
        let fill = imputer
            .categorical_fill("Sex", &cats(&[Some("m"), Some("f"), Some("m"), None]))
            .unwrap();
        assert_eq!(fill, "m");
    }

    #[test]
    fn test_mode_tie_takes_smallest() {
        let imputer = Imputer::default();
        let fill = imputer
            .categorical_fill("Jaundice", &cats(&[Some("yes"), Some("no"), Some("yes"), Some("no")]))
            .unwrap();
        assert_eq!(fill, "no");
    }

    #[test]
    fn test_mode_tie_rejected() {
        let imputer = Imputer::new(ModeTiePolicy::Reject);
        let err = imputer
            .categorical_fill("Jaundice", &cats(&[Some("yes"), Some("no")]))
            .unwrap_err();
        match err {
            AutisenseError::ImputationAmbiguity { field, candidates } => {
                assert_eq!(field, "Jaundice");
                assert_eq!(candidates, vec!["no".to_string(), "yes".to_string()]);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
