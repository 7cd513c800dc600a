//! Questionnaire form: display labels to stored category values and back

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::artifact::DeployableArtifact;
use super::service::Prediction;
use crate::preprocessing::RawRecord;

/// (field, display label, stored value)
const UI_LABELS: [(&str, &str, &str); 10] = [
    ("Sex", "Male", "m"),
    ("Sex", "Female", "f"),
    ("Jaundice", "Yes", "yes"),
    ("Jaundice", "No", "no"),
    ("Family_mem_with_ASD", "Yes", "yes"),
    ("Family_mem_with_ASD", "No", "no"),
    ("Who completed the test", "Family Member", "family member"),
    ("Who completed the test", "Health Care Professional", "health care professional"),
    ("Who completed the test", "Others", "others"),
    ("Who completed the test", "Self", "self"),
];

/// Stored value for a display label; unknown labels pass through unchanged
pub fn map_ui_label(field: &str, label: &str) -> String {
    UI_LABELS
        .iter()
        .find(|(f, l, _)| *f == field && *l == label)
        .map(|(_, _, v)| v.to_string())
        .unwrap_or_else(|| label.to_string())
}

/// Display label for a stored value; values without a label are shown as stored
pub fn display_label(field: &str, value: &str) -> String {
    UI_LABELS
        .iter()
        .find(|(f, _, v)| *f == field && *v == value)
        .map(|(_, l, _)| l.to_string())
        .unwrap_or_else(|| value.to_string())
}

/// A form submission using display labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSubmission {
    /// Answers to items A1..A10, each 0 or 1
    pub answers: [f64; 10],
    pub age_mons: f64,
    pub sex: String,
    pub ethnicity: String,
    pub jaundice: String,
    pub family_mem_with_asd: String,
    pub who_completed_the_test: String,
}

impl FormSubmission {
    /// Raw record in stored-value form
    pub fn to_record(&self) -> RawRecord {
        let mut record = RawRecord::new();
        for (i, &answer) in self.answers.iter().enumerate() {
            record = record.with_number(format!("A{}", i + 1), answer);
        }
        let categorical = [
            ("Sex", &self.sex),
            ("Ethnicity", &self.ethnicity),
            ("Jaundice", &self.jaundice),
            ("Family_mem_with_ASD", &self.family_mem_with_asd),
            ("Who completed the test", &self.who_completed_the_test),
        ];
        for (field, label) in categorical {
            record = record.with_text(field, map_ui_label(field, label));
        }
        record.with_number("Age_Mons", self.age_mons)
    }
}

/// Human-readable result of a form prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub text: String,
    /// Probability of traits, in percent
    pub positive_pct: f64,
    pub negative_pct: f64,
}

impl Verdict {
    pub fn from_prediction(prediction: &Prediction) -> Self {
        let text = if prediction.is_positive() {
            "Autistic Traits Detected"
        } else {
            "No Autistic Traits Detected"
        };
        Self {
            text: text.to_string(),
            positive_pct: prediction.probabilities.positive * 100.0,
            negative_pct: prediction.probabilities.negative * 100.0,
        }
    }

    /// Three-line summary shown by the form and the CLI
    pub fn summary(&self) -> String {
        format!(
            "Prediction: {}\nProbability of No Autistic Traits: {:.2}%\nProbability of Autistic Traits: {:.2}%",
            self.text, self.negative_pct, self.positive_pct
        )
    }
}

/// Dropdown choices per categorical field, as display labels
pub fn form_options(artifact: &DeployableArtifact) -> BTreeMap<String, Vec<String>> {
    artifact
        .transform()
        .vocabularies()
        .iter()
        .map(|vocab| {
            let labels = vocab
                .values()
                .iter()
                .map(|value| display_label(vocab.field(), value))
                .collect();
            (vocab.field().to_string(), labels)
        })
        .collect()
}
