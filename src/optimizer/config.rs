//! Tuning configuration and the AdaBoost search grid

use serde::{Deserialize, Serialize};

use crate::error::{AutisenseError, Result};
use crate::training::{AdaBoostClassifier, CVStrategy, CrossValidator};

/// Settings of a grid search run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Folds used to score each configuration
    pub cv_strategy: CVStrategy,
    pub cv_random_state: u64,
    /// Worker threads; `None` uses the global rayon pool
    pub n_jobs: Option<usize>,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            cv_strategy: CVStrategy::default(),
            cv_random_state: 42,
            n_jobs: None,
        }
    }
}

impl TuningConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = Some(n_jobs);
        self
    }

    pub fn with_cv_strategy(mut self, strategy: CVStrategy) -> Self {
        self.cv_strategy = strategy;
        self
    }

    pub fn cross_validator(&self) -> CrossValidator {
        CrossValidator::new(self.cv_strategy).with_random_state(self.cv_random_state)
    }
}

/// One AdaBoost configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaBoostParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    /// Depth of each weak learner
    pub max_depth: usize,
}

impl Default for AdaBoostParams {
    fn default() -> Self {
        Self {
            n_estimators: 50,
            learning_rate: 1.0,
            max_depth: 1,
        }
    }
}

impl AdaBoostParams {
    /// An unfitted classifier with these settings
    pub fn build(&self) -> AdaBoostClassifier {
        AdaBoostClassifier::new(self.n_estimators, self.learning_rate).with_max_depth(self.max_depth)
    }
}

/// Candidate values for each AdaBoost parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaBoostGrid {
    pub n_estimators: Vec<usize>,
    pub learning_rate: Vec<f64>,
    pub max_depth: Vec<usize>,
}

impl Default for AdaBoostGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![50, 100, 200],
            learning_rate: vec![0.01, 0.1, 1.0],
            max_depth: vec![1, 2, 3],
        }
    }
}

impl AdaBoostGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_n_estimators(mut self, values: Vec<usize>) -> Self {
        self.n_estimators = values;
        self
    }

    pub fn with_learning_rate(mut self, values: Vec<f64>) -> Self {
        self.learning_rate = values;
        self
    }

    pub fn with_max_depth(mut self, values: Vec<usize>) -> Self {
        self.max_depth = values;
        self
    }

    pub fn len(&self) -> usize {
        self.n_estimators.len() * self.learning_rate.len() * self.max_depth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn validate(&self) -> Result<()> {
        let axes = [
            ("n_estimators", self.n_estimators.is_empty()),
            ("learning_rate", self.learning_rate.is_empty()),
            ("max_depth", self.max_depth.is_empty()),
        ];
        if let Some((name, _)) = axes.iter().find(|(_, empty)| *empty) {
            return Err(AutisenseError::InvalidParameter {
                name: name.to_string(),
                value: "[]".to_string(),
                reason: "grid axis has no values".to_string(),
            });
        }
        Ok(())
    }

    /// All combinations; depth varies slowest, estimators fastest
    pub fn configurations(&self) -> Vec<AdaBoostParams> {
        let mut out = Vec::with_capacity(self.len());
        for &max_depth in &self.max_depth {
            for &learning_rate in &self.learning_rate {
                for &n_estimators in &self.n_estimators {
                    out.push(AdaBoostParams {
                        n_estimators,
                        learning_rate,
                        max_depth,
                    });
                }
            }
        }
        out
    }
}
