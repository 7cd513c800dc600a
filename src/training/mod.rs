//! Model training module
//!
//! Provides the binary classifiers of the model catalog:
//! - Logistic regression
//! - Support vector machine with Platt-scaled probabilities
//! - Random forest
//! - K-nearest neighbors
//! - Gradient boosting
//! - AdaBoost over shallow decision trees
//!
//! plus stratified cross-validation and the [`ModelKind`] / [`TrainedModel`] registry.

pub mod adaboost;
pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod knn;
pub mod linear_models;
pub mod random_forest;
mod registry;
pub mod svm;

pub use adaboost::AdaBoostClassifier;
pub use cross_validation::{cross_val_score, CVResults, CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use knn::{KNNClassifier, KNNConfig};
pub use linear_models::LogisticRegression;
pub use random_forest::{MaxFeatures, RandomForest};
pub use registry::{ModelKind, TrainedModel};
pub use svm::{Gamma, SVMClassifier, SVMConfig};

use crate::error::{AutisenseError, Result};
use ndarray::{Array1, Array2};

/// A binary classifier over encoded records.
///
/// Labels are `0.0`/`1.0`. `predict_proba` returns an `n x 2` matrix with
/// columns `[P(0), P(1)]`.
pub trait Classifier: Send + Sync {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Whether [`Classifier::feature_importances`] can return a value once fitted
    fn supports_feature_importance(&self) -> bool {
        false
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }
}

/// Reject empty data, mismatched lengths and labels outside {0, 1}
pub(crate) fn check_training_data(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(AutisenseError::ShapeError {
            expected: format!("{} labels", x.nrows()),
            actual: format!("{} labels", y.len()),
        });
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(AutisenseError::ShapeError {
            expected: "non-empty training matrix".to_string(),
            actual: format!("{}x{}", x.nrows(), x.ncols()),
        });
    }
    if let Some(bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
        return Err(AutisenseError::InvalidInput(format!(
            "labels must be 0 or 1, found {}",
            bad
        )));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(AutisenseError::InvalidInput(
            "training matrix contains non-finite values".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn check_features(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(AutisenseError::ShapeError {
            expected: format!("{} features", n_features),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

/// `[1 - p, p]` rows from the positive-class probabilities
pub(crate) fn binary_proba(p1: &Array1<f64>) -> Array2<f64> {
    Array2::from_shape_fn((p1.len(), 2), |(i, j)| {
        let p = p1[i].clamp(0.0, 1.0);
        if j == 0 {
            1.0 - p
        } else {
            p
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_label_check() {
        let x = array![[1.0], [2.0]];
        assert!(check_training_data(&x, &array![0.0, 1.0]).is_ok());
        assert!(check_training_data(&x, &array![1.0, 1.0]).is_ok());
        assert!(matches!(
            check_training_data(&x, &array![0.0, 2.0]),
            Err(AutisenseError::InvalidInput(_))
        ));
        assert!(matches!(
            check_training_data(&x, &array![0.0]),
            Err(AutisenseError::ShapeError { .. })
        ));
    }

    #[test]
    fn test_binary_proba_rows() {
        let proba = binary_proba(&array![0.25, 1.0]);
        assert_eq!(proba, array![[0.75, 0.25], [0.0, 1.0]]);
    }
}
