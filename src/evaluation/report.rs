//! Ranked evaluation results and their text rendering

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::harness::{CandidateOutcome, CandidateResult};
use crate::error::Result;

/// Ranked outcomes of one evaluation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    outcomes: Vec<CandidateOutcome>,
    feature_names: Vec<String>,
}

impl EvaluationReport {
    /// `outcomes` must already be in rank order
    pub(crate) fn new(outcomes: Vec<CandidateOutcome>, feature_names: Vec<String>) -> Self {
        Self {
            outcomes,
            feature_names,
        }
    }

    pub fn ranking(&self) -> &[CandidateOutcome] {
        &self.outcomes
    }

    /// Top-ranked successful candidate
    pub fn best(&self) -> Option<&CandidateResult> {
        self.outcomes.first().and_then(CandidateOutcome::result)
    }

    pub fn get(&self, name: &str) -> Option<&CandidateOutcome> {
        self.outcomes.iter().find(|o| o.name() == name)
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Test accuracy of every successful candidate
    pub fn accuracy_by_model(&self) -> BTreeMap<String, f64> {
        self.outcomes
            .iter()
            .filter_map(CandidateOutcome::result)
            .map(|r| (r.name.clone(), r.accuracy()))
            .collect()
    }

    /// Feature importances keyed by model, then by feature name
    pub fn feature_importances(&self) -> BTreeMap<String, BTreeMap<String, f64>> {
        self.outcomes
            .iter()
            .filter_map(CandidateOutcome::result)
            .filter_map(|r| {
                let importances = r.feature_importances.as_ref()?;
                Some((r.name.clone(), name_values(&self.feature_names, importances)))
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Pair values with feature names by position
pub fn name_values(names: &[String], values: &[f64]) -> BTreeMap<String, f64> {
    names.iter().cloned().zip(values.iter().copied()).collect()
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.outcomes {
            match outcome {
                CandidateOutcome::Succeeded(r) => {
                    writeln!(f, "=== {} ===", r.name)?;
                    writeln!(f, "Accuracy: {:.4}", r.accuracy())?;
                    writeln!(f, "Classification Report:")?;
                    writeln!(f, "{}", r.metrics.report)?;
                    match r.metrics.roc_auc {
                        Some(auc) => writeln!(f, "ROC-AUC: {:.4}", auc)?,
                        None => writeln!(f, "ROC-AUC: undefined (single class in test split)")?,
                    }
                    writeln!(
                        f,
                        "Precision-Recall: mean precision {:.4}, average precision {:.4}",
                        r.metrics.precision_recall.mean_precision, r.metrics.precision_recall.average_precision
                    )?;
                    writeln!(f, "Confusion Matrix:")?;
                    writeln!(f, "{}", r.metrics.confusion)?;
                    writeln!(f, "CV Accuracy: {}", r.cv)?;
                    writeln!(f)?;
                }
                CandidateOutcome::Failed { name, error, .. } => {
                    writeln!(f, "=== {} ===", name)?;
                    writeln!(f, "FAILED: {}", error)?;
                    writeln!(f)?;
                }
            }
        }

        writeln!(f, "Ranking:")?;
        for (rank, outcome) in self.outcomes.iter().enumerate() {
            match outcome.result() {
                Some(r) => writeln!(
                    f,
                    "{:>3}. {:<22} accuracy {:.4}  cv {}",
                    rank + 1,
                    r.name,
                    r.accuracy(),
                    r.cv
                )?,
                None => writeln!(f, "{:>3}. {:<22} failed", rank + 1, outcome.name())?,
            }
        }
        Ok(())
    }
}

/// Horizontal text bar chart, longest bar `width` characters; entries keep the map's order
pub fn render_bar_chart(values: &BTreeMap<String, f64>, width: usize) -> String {
    let max = values.values().copied().fold(0.0_f64, f64::max);
    let label_width = values.keys().map(|k| k.chars().count()).max().unwrap_or(0);

    let mut out = String::new();
    for (label, &value) in values {
        let bar_len = if max > 0.0 {
            ((value / max) * width as f64).round() as usize
        } else {
            0
        };
        out.push_str(&format!(
            "{:<lw$} | {:<bw$} {:.4}\n",
            label,
            "#".repeat(bar_len),
            value,
            lw = label_width,
            bw = width
        ));
    }
    out
}
