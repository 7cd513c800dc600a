//! AdaBoost (Adaptive Boosting), SAMME variant for binary labels
//!
//! Each round fits a shallow weighted decision tree, then multiplies the weight
//! of every misclassified sample by `exp(alpha)` with
//! `alpha = learning_rate * ln((1 - err) / err)`.

use super::decision_tree::DecisionTree;
use super::{binary_proba, check_features, check_training_data, Classifier};
use crate::error::{AutisenseError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// AdaBoost classifier over weighted CART trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostClassifier {
    pub n_estimators: usize,
    pub learning_rate: f64,
    /// Depth of each weak learner; 1 gives decision stumps
    pub max_depth: usize,
    estimators: Vec<DecisionTree>,
    alphas: Vec<f64>,
    n_features: usize,
    pub is_fitted: bool,
}

impl Default for AdaBoostClassifier {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostClassifier {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            max_depth: 1,
            estimators: Vec::new(),
            alphas: Vec::new(),
            n_features: 0,
            is_fitted: false,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Set the depth of the weak learners
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    fn validate_params(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(AutisenseError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "at least one boosting round is required".to_string(),
            });
        }
        if !(self.learning_rate > 0.0) || !self.learning_rate.is_finite() {
            return Err(AutisenseError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: self.learning_rate.to_string(),
                reason: "must be a positive finite number".to_string(),
            });
        }
        if self.max_depth == 0 {
            return Err(AutisenseError::InvalidParameter {
                name: "max_depth".to_string(),
                value: "0".to_string(),
                reason: "weak learners need at least one split level".to_string(),
            });
        }
        Ok(())
    }

    /// Number of weak learners kept after early stopping
    pub fn n_fitted_estimators(&self) -> usize {
        self.estimators.len()
    }

    pub fn estimator_weights(&self) -> &[f64] {
        &self.alphas
    }

    /// Normalized weighted vote in `[-1, 1]`; positive favours class 1
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(AutisenseError::ModelNotFitted);
        }
        check_features(x, self.n_features)?;

        let mut score: Array1<f64> = Array1::zeros(x.nrows());
        for (tree, &alpha) in self.estimators.iter().zip(&self.alphas) {
            let pred = tree.predict(x)?;
            score.zip_mut_with(&pred, |s, &p| *s += if p >= 0.5 { alpha } else { -alpha });
        }

        let total: f64 = self.alphas.iter().sum();
        if total > 0.0 {
            score /= total;
        }
        Ok(score)
    }

    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let preds = self.predict(x)?;
        let correct = preds.iter().zip(y.iter()).filter(|(p, a)| (*p - *a).abs() < 0.5).count();
        Ok(correct as f64 / y.len() as f64)
    }
}

impl Classifier for AdaBoostClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.validate_params()?;
        check_training_data(x, y)?;

        let n_samples = x.nrows();
        let mut weights = Array1::from_elem(n_samples, 1.0 / n_samples as f64);

        self.estimators.clear();
        self.alphas.clear();
        self.n_features = x.ncols();

        for round in 0..self.n_estimators {
            let mut tree = DecisionTree::new_classifier().with_max_depth(self.max_depth);
            tree.fit_weighted(x, y, Some(&weights))?;
            let predictions = tree.predict(x)?;

            let misclassified: Vec<bool> = predictions
                .iter()
                .zip(y.iter())
                .map(|(p, t)| (p - t).abs() > 0.5)
                .collect();
            let total_weight = weights.sum();
            let error = weights
                .iter()
                .zip(&misclassified)
                .filter(|(_, &m)| m)
                .map(|(w, _)| w)
                .sum::<f64>()
                / total_weight;

            if error <= 0.0 {
                debug!(round, "Weak learner fits the training set exactly; stopping");
                self.estimators.push(tree);
                self.alphas.push(1.0);
                break;
            }

            if error >= 0.5 {
                if self.estimators.is_empty() {
                    warn!(round, error, "First weak learner is no better than chance");
                    self.estimators.push(tree);
                    self.alphas.push(1.0);
                }
                break;
            }

            let alpha = self.learning_rate * ((1.0 - error) / error).ln();

            for (w, &m) in weights.iter_mut().zip(&misclassified) {
                if m {
                    *w *= alpha.exp();
                }
            }
            let w_sum = weights.sum();
            if w_sum > 0.0 {
                weights /= w_sum;
            }

            self.estimators.push(tree);
            self.alphas.push(alpha);
        }

        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(|s| if s > 0.0 { 1.0 } else { 0.0 }))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let scores = self.decision_function(x)?;
        Ok(binary_proba(&scores.mapv(|s| 1.0 / (1.0 + (-s).exp()))))
    }

    fn supports_feature_importance(&self) -> bool {
        true
    }

    /// Alpha-weighted average of the weak learners' importances
    fn feature_importances(&self) -> Option<Array1<f64>> {
        if !self.is_fitted || self.n_features == 0 {
            return None;
        }
        let mut importances: Array1<f64> = Array1::zeros(self.n_features);
        for (tree, &alpha) in self.estimators.iter().zip(&self.alphas) {
            if let Some(imp) = tree.feature_importances() {
                importances.scaled_add(alpha, &imp);
            }
        }
        let total = importances.sum();
        if total > 0.0 {
            importances /= total;
        }
        Some(importances)
    }
}
