//! Hyperparameter tuning
//!
//! Exhaustive grid search over the AdaBoost family, scored by stratified
//! cross-validated accuracy on the training split.

mod config;
mod grid_search;

pub use config::{AdaBoostGrid, AdaBoostParams, TuningConfig};
pub use grid_search::{GridSearchTuner, TrialResult, TuningOutcome};
