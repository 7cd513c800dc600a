//! Linear models

use super::{binary_proba, check_features, check_training_data, Classifier};
use crate::error::{AutisenseError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// L2-regularized logistic regression fitted by batch gradient descent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: Option<f64>,
    /// Regularization strength (L2)
    pub alpha: f64,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    /// Learning rate
    pub learning_rate: f64,
    /// Iterations run by the last fit
    pub n_iter: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            alpha: 0.01,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
            n_iter: 0,
        }
    }

    /// Set regularization strength
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set learning rate
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    /// Probability of class 1
    fn positive_probability(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(AutisenseError::ModelNotFitted)?;
        check_features(x, coefficients.len())?;
        let intercept = self.intercept.unwrap_or(0.0);
        Ok(Self::sigmoid(&(x.dot(coefficients) + intercept)))
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;

        let n_samples = x.nrows() as f64;
        let mut weights: Array1<f64> = Array1::zeros(x.ncols());
        let mut bias = 0.0;

        let lr = self.learning_rate;
        let alpha = self.alpha;

        let mut iterations = 0;
        for iter in 0..self.max_iter {
            iterations = iter + 1;

            let predictions = Self::sigmoid(&(x.dot(&weights) + bias));
            let errors = &predictions - y;
            let dw = (x.t().dot(&errors) / n_samples) + (alpha * &weights);
            let db = errors.mean().unwrap_or(0.0);

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if !grad_norm.is_finite() {
                return Err(AutisenseError::ConvergenceError { iterations });
            }
            if grad_norm < self.tol {
                break;
            }

            weights = weights - lr * dw;
            bias -= lr * db;
        }

        if weights.iter().any(|w: &f64| !w.is_finite()) || !bias.is_finite() {
            return Err(AutisenseError::ConvergenceError { iterations });
        }

        debug!(iterations, "Logistic regression fitted");
        self.coefficients = Some(weights);
        self.intercept = Some(bias);
        self.n_iter = iterations;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.positive_probability(x)?.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(binary_proba(&self.positive_probability(x)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_logistic_regression() {
        let x = array![[-2.0, 1.0], [-1.5, 0.5], [-1.0, 1.5], [1.0, -1.0], [1.5, 0.0], [2.0, -0.5]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();

        assert_eq!(model.predict(&x).unwrap(), y);
        assert!(model.coefficients.as_ref().unwrap()[0] > 0.0);
    }

    #[test]
    fn test_probabilities() {
        let x = array![[-1.0], [-0.5], [0.5], [1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut model = LogisticRegression::new().with_max_iter(500);
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
        assert!(proba[[0, 1]] < proba[[3, 1]]);
    }

    #[test]
    fn test_feature_count_checked() {
        let x = array![[0.0], [1.0]];
        let y = array![0.0, 1.0];
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();
        assert!(matches!(
            model.predict(&array![[0.0, 1.0]]),
            Err(AutisenseError::ShapeError { .. })
        ));
        assert!(!model.supports_feature_importance());
        assert!(model.feature_importances().is_none());
    }
}
