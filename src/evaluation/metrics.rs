//! Binary classification metrics

use crate::error::{AutisenseError, Result};
use crate::preprocessing::labels::label_name;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Counts of a 2x2 confusion matrix; rows are true labels, columns predictions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    pub fn from_labels(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let mut cm = Self::default();
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            match (t > 0.5, p > 0.5) {
                (true, true) => cm.tp += 1,
                (false, true) => cm.fp += 1,
                (false, false) => cm.tn += 1,
                (true, false) => cm.fn_ += 1,
            }
        }
        cm
    }

    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_ + self.tp
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    /// `[[tn, fp], [fn, tp]]`
    pub fn to_array(&self) -> [[usize; 2]; 2] {
        [[self.tn, self.fp], [self.fn_, self.tp]]
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>12}{:>8}{:>8}", "", "pred No", "pred Yes")?;
        writeln!(f, "{:>12}{:>8}{:>8}", "true No", self.tn, self.fp)?;
        write!(f, "{:>12}{:>8}{:>8}", "true Yes", self.fn_, self.tp)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Precision, recall and F1 of one class (or an average of classes)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

impl ClassMetrics {
    fn from_counts(tp: usize, fp: usize, fn_: usize) -> Self {
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            f1,
            support: tp + fn_,
        }
    }
}

/// Per-class report with macro and support-weighted averages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Keyed by class name ("No", "Yes")
    pub classes: BTreeMap<String, ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    pub fn from_confusion(cm: &ConfusionMatrix) -> Self {
        let negative = ClassMetrics::from_counts(cm.tn, cm.fn_, cm.fp);
        let positive = ClassMetrics::from_counts(cm.tp, cm.fp, cm.fn_);
        let total = cm.total();

        let average = |weight: &dyn Fn(&ClassMetrics) -> f64| {
            let (wn, wp) = (weight(&negative), weight(&positive));
            let norm = (wn + wp).max(f64::EPSILON);
            ClassMetrics {
                precision: (negative.precision * wn + positive.precision * wp) / norm,
                recall: (negative.recall * wn + positive.recall * wp) / norm,
                f1: (negative.f1 * wn + positive.f1 * wp) / norm,
                support: total,
            }
        };
        let macro_avg = average(&|_| 1.0);
        let weighted_avg = average(&|m| m.support as f64);

        let mut classes = BTreeMap::new();
        classes.insert(label_name(0.0).to_string(), negative);
        classes.insert(label_name(1.0).to_string(), positive);

        Self {
            classes,
            accuracy: cm.accuracy(),
            macro_avg,
            weighted_avg,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>14}{:>11}{:>11}{:>11}{:>11}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for (name, m) in &self.classes {
            report_row(f, name, m)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>14}{:>11}{:>11}{:>11.2}{:>11}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        report_row(f, "macro avg", &self.macro_avg)?;
        report_row(f, "weighted avg", &self.weighted_avg)
    }
}

fn report_row(f: &mut fmt::Formatter<'_>, name: &str, m: &ClassMetrics) -> fmt::Result {
    writeln!(
        f,
        "{:>14}{:>11.2}{:>11.2}{:>11.2}{:>11}",
        name, m.precision, m.recall, m.f1, m.support
    )
}

/// Cumulative (fps, tps) at each distinct score, scanning from the highest score
fn binary_clf_curve(scores: &[f64], y_true: &[f64]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));

    let mut fps = Vec::new();
    let mut tps = Vec::new();
    let mut thresholds = Vec::new();
    let (mut fp, mut tp) = (0.0, 0.0);
    for (pos, &i) in order.iter().enumerate() {
        if y_true[i] > 0.5 {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        // Tied scores form one threshold
        let last_of_group = order
            .get(pos + 1)
            .map_or(true, |&next| scores[next] != scores[i]);
        if last_of_group {
            fps.push(fp);
            tps.push(tp);
            thresholds.push(scores[i]);
        }
    }
    (fps, tps, thresholds)
}

/// Receiver operating characteristic curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub thresholds: Vec<f64>,
}

impl RocCurve {
    /// `None` when `y_true` holds a single class
    pub fn compute(scores: &[f64], y_true: &[f64]) -> Option<Self> {
        let (fps, tps, thresholds) = binary_clf_curve(scores, y_true);
        let n_pos = *tps.last()?;
        let n_neg = *fps.last()?;
        if n_pos == 0.0 || n_neg == 0.0 {
            return None;
        }

        let mut fpr = vec![0.0];
        let mut tpr = vec![0.0];
        fpr.extend(fps.iter().map(|v| v / n_neg));
        tpr.extend(tps.iter().map(|v| v / n_pos));
        // Starting point sits above every score so nothing is predicted positive
        let mut all_thresholds = vec![thresholds[0] + 1.0];
        all_thresholds.extend(thresholds);

        Some(Self {
            fpr,
            tpr,
            thresholds: all_thresholds,
        })
    }

    /// Area under the curve by the trapezoid rule
    pub fn auc(&self) -> f64 {
        self.fpr
            .windows(2)
            .zip(self.tpr.windows(2))
            .map(|(x, y)| (x[1] - x[0]) * (y[1] + y[0]) / 2.0)
            .sum()
    }
}

/// ROC-AUC of positive-class scores; `None` for a single-class `y_true`
pub fn roc_auc(scores: &[f64], y_true: &[f64]) -> Option<f64> {
    RocCurve::compute(scores, y_true).map(|c| c.auc())
}

/// Precision-recall curve with recall decreasing and a final (precision 1, recall 0) point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionRecallCurve {
    pub precision: Vec<f64>,
    pub recall: Vec<f64>,
    pub thresholds: Vec<f64>,
}

impl PrecisionRecallCurve {
    pub fn compute(scores: &[f64], y_true: &[f64]) -> Self {
        let (fps, tps, thresholds) = binary_clf_curve(scores, y_true);
        let total_pos = tps.last().copied().unwrap_or(0.0);

        let mut precision: Vec<f64> = fps
            .iter()
            .zip(&tps)
            .map(|(fp, tp)| if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 })
            .rev()
            .collect();
        let mut recall: Vec<f64> = tps
            .iter()
            .map(|tp| if total_pos > 0.0 { tp / total_pos } else { 1.0 })
            .rev()
            .collect();
        precision.push(1.0);
        recall.push(0.0);

        Self {
            precision,
            recall,
            thresholds: thresholds.into_iter().rev().collect(),
        }
    }

    /// Mean of the precision points, final point included
    pub fn mean_precision(&self) -> f64 {
        self.precision.iter().sum::<f64>() / self.precision.len().max(1) as f64
    }

    /// Step-wise average precision: sum of (R_n - R_n+1) * P_n
    pub fn average_precision(&self) -> f64 {
        self.recall
            .windows(2)
            .zip(&self.precision)
            .map(|(r, p)| (r[0] - r[1]) * p)
            .sum()
    }

    pub fn summary(&self) -> PrecisionRecallSummary {
        PrecisionRecallSummary {
            mean_precision: self.mean_precision(),
            average_precision: self.average_precision(),
            n_points: self.precision.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrecisionRecallSummary {
    pub mean_precision: f64,
    pub average_precision: f64,
    pub n_points: usize,
}

/// Hold-out metrics of one fitted candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestMetrics {
    pub accuracy: f64,
    pub report: ClassificationReport,
    pub roc_auc: Option<f64>,
    pub precision_recall: PrecisionRecallSummary,
    pub confusion: ConfusionMatrix,
}

impl TestMetrics {
    /// Metrics from true labels, predicted labels and P(1)
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>, positive_proba: &Array1<f64>) -> Result<Self> {
        if y_true.len() != y_pred.len() || y_true.len() != positive_proba.len() {
            return Err(AutisenseError::ShapeError {
                expected: format!("{} predictions and probabilities", y_true.len()),
                actual: format!("{} predictions, {} probabilities", y_pred.len(), positive_proba.len()),
            });
        }
        if let Some(bad) = y_true.iter().find(|&&v| v != 0.0 && v != 1.0) {
            return Err(AutisenseError::InvalidLabel {
                value: bad.to_string(),
            });
        }

        let truth = y_true.to_vec();
        let scores = positive_proba.to_vec();
        let confusion = ConfusionMatrix::from_labels(y_true, y_pred);

        Ok(Self {
            accuracy: confusion.accuracy(),
            report: ClassificationReport::from_confusion(&confusion),
            roc_auc: roc_auc(&scores, &truth),
            precision_recall: PrecisionRecallCurve::compute(&scores, &truth).summary(),
            confusion,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_confusion_and_report() {
        let y_true = array![1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let y_pred = array![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];

        let cm = ConfusionMatrix::from_labels(&y_true, &y_pred);
        assert_eq!(cm.to_array(), [[3, 1], [1, 3]]);
        assert_eq!(cm.accuracy(), 0.75);

        let report = ClassificationReport::from_confusion(&cm);
        let yes = report.classes["Yes"];
        assert_eq!(yes.precision, 0.75);
        assert_eq!(yes.recall, 0.75);
        assert_eq!(yes.support, 4);
        assert!((report.macro_avg.f1 - 0.75).abs() < 1e-12);
        assert_eq!(report.weighted_avg.support, 8);
    }

    #[test]
    fn test_roc_auc_perfect_and_inverted() {
        let y = [0.0, 0.0, 1.0, 1.0];
        assert_eq!(roc_auc(&[0.1, 0.2, 0.8, 0.9], &y), Some(1.0));
        assert_eq!(roc_auc(&[0.9, 0.8, 0.2, 0.1], &y), Some(0.0));
    }

    #[test]
    fn test_roc_auc_ties() {
        // Every score tied: the curve is the diagonal
        let auc = roc_auc(&[0.5, 0.5, 0.5, 0.5], &[0.0, 1.0, 0.0, 1.0]).unwrap();
        assert!((auc - 0.5).abs() < 1e-12);

        let auc = roc_auc(&[0.1, 0.4, 0.35, 0.8], &[0.0, 0.0, 1.0, 1.0]).unwrap();
        assert!((auc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_single_class() {
        assert_eq!(roc_auc(&[0.1, 0.9], &[1.0, 1.0]), None);
    }

    #[test]
    fn test_precision_recall_curve() {
        let curve = PrecisionRecallCurve::compute(&[0.1, 0.4, 0.35, 0.8], &[0.0, 0.0, 1.0, 1.0]);
        assert_eq!(curve.recall, vec![1.0, 1.0, 0.5, 0.5, 0.0]);
        let expected_precision = [0.5, 2.0 / 3.0, 0.5, 1.0, 1.0];
        for (p, e) in curve.precision.iter().zip(expected_precision) {
            assert!((p - e).abs() < 1e-12);
        }
        assert!((curve.average_precision() - 0.8333333333333333).abs() < 1e-12);
        assert!((curve.mean_precision() - (0.5 + 2.0 / 3.0 + 0.5 + 1.0 + 1.0) / 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_test_metrics_rejects_bad_labels() {
        let err = TestMetrics::compute(&array![0.0, 2.0], &array![0.0, 1.0], &array![0.1, 0.9]).unwrap_err();
        assert!(matches!(err, AutisenseError::InvalidLabel { .. }));
    }
}
