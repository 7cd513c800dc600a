//! Model evaluation
//!
//! Every candidate is fitted on the training split, scored on the hold-out split
//! and cross-validated on the training split alone; the results are ranked by
//! test accuracy.

mod harness;
pub mod metrics;
mod report;

pub use harness::{
    score_fitted, CandidateOutcome, CandidateResult, EncodedSplit, EvaluationConfig, EvaluationHarness,
};
pub use metrics::{
    roc_auc, ClassMetrics, ClassificationReport, ConfusionMatrix, PrecisionRecallCurve,
    PrecisionRecallSummary, RocCurve, TestMetrics,
};
pub use report::{name_values, render_bar_chart, EvaluationReport};
