//! Gradient boosting for binary classification
//!
//! Log-loss boosting: each round fits a regression tree to the residuals
//! `y - sigmoid(log_odds)`, replaces every leaf with the Newton step
//! `sum(residual) / sum(p * (1 - p))` over its rows, and adds
//! `learning_rate * tree(x)` to the log-odds.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use super::{binary_proba, check_features, check_training_data, Classifier};
use crate::error::{AutisenseError, Result};

/// Gradient Boosting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
        }
    }
}

impl GradientBoostingConfig {
    fn validate(&self) -> Result<()> {
        let checks = [
            ("n_estimators", self.n_estimators > 0, self.n_estimators.to_string()),
            (
                "learning_rate",
                self.learning_rate > 0.0 && self.learning_rate.is_finite(),
                self.learning_rate.to_string(),
            ),
            ("max_depth", self.max_depth > 0, self.max_depth.to_string()),
        ];
        match checks.into_iter().find(|(_, ok, _)| !ok) {
            Some((name, _, value)) => Err(AutisenseError::InvalidParameter {
                name: name.to_string(),
                value,
                reason: "out of range".to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Gradient Boosting Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    initial_log_odds: f64,
    feature_importances: Vec<f64>,
    n_features: usize,
}

impl Default for GradientBoostingClassifier {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_log_odds: 0.0,
            feature_importances: Vec::new(),
            n_features: 0,
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    fn sigmoid(v: f64) -> f64 {
        1.0 / (1.0 + (-v).exp())
    }

    /// Raw log-odds of class 1
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(AutisenseError::ModelNotFitted);
        }
        check_features(x, self.n_features)?;

        let mut log_odds = Array1::from_elem(x.nrows(), self.initial_log_odds);
        for tree in &self.trees {
            log_odds.scaled_add(self.config.learning_rate, &tree.predict_value(x)?);
        }
        Ok(log_odds)
    }

    fn newton_step(residuals: &Array1<f64>, hessians: &Array1<f64>, rows: &[usize]) -> f64 {
        let numerator: f64 = rows.iter().map(|&i| residuals[i]).sum();
        let denominator: f64 = rows.iter().map(|&i| hessians[i]).sum();
        if denominator.abs() < 1e-150 {
            0.0
        } else {
            numerator / denominator
        }
    }
}

impl Classifier for GradientBoostingClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.config.validate()?;
        check_training_data(x, y)?;

        let n_samples = x.nrows();
        let n_features = x.ncols();

        let p = y.mean().unwrap_or(0.5).clamp(1e-10, 1.0 - 1e-10);
        self.initial_log_odds = (p / (1.0 - p)).ln();

        let mut log_odds = Array1::from_elem(n_samples, self.initial_log_odds);

        self.trees.clear();
        self.feature_importances = vec![0.0; n_features];
        self.n_features = n_features;

        for _ in 0..self.config.n_estimators {
            let proba = log_odds.mapv(Self::sigmoid);
            let residuals = y - &proba;
            let hessians = proba.mapv(|p| p * (1.0 - p));

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf);
            tree.fit_weighted(x, &residuals, None)?;
            tree.refit_leaves(x, |rows| Self::newton_step(&residuals, &hessians, rows))?;

            log_odds.scaled_add(self.config.learning_rate, &tree.predict_value(x)?);

            if let Some(tree_importance) = tree.feature_importances() {
                for (total, imp) in self.feature_importances.iter_mut().zip(tree_importance.iter()) {
                    *total += imp;
                }
            }

            self.trees.push(tree);
        }

        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= total;
            }
        }

        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(|lo| if lo > 0.0 { 1.0 } else { 0.0 }))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(binary_proba(&self.decision_function(x)?.mapv(Self::sigmoid)))
    }

    fn supports_feature_importance(&self) -> bool {
        true
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.trees.is_empty() {
            None
        } else {
            Some(Array1::from_vec(self.feature_importances.clone()))
        }
    }
}
