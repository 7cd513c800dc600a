//! Support Vector Machine classifier
//!
//! Binary C-SVC trained with SMO (Sequential Minimal Optimization). Class
//! probabilities come from a Platt sigmoid fitted on the training decision
//! values; labels come from the sign of the decision value.

use super::{binary_proba, check_features, check_training_data, Classifier};
use crate::error::{AutisenseError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Beyond this many samples the eager kernel matrix is refused
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// RBF kernel width
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Gamma {
    /// `1 / (n_features * X.var())`, resolved at fit time
    Scale,
    Value(f64),
}

/// SVM configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Width of the RBF kernel `exp(-gamma * ||x - y||^2)`
    pub gamma: Gamma,
    /// Tolerance for the KKT check
    pub tol: f64,
    /// Maximum number of SMO sweeps
    pub max_iter: usize,
    /// Seed for the second-multiplier choice
    pub random_state: u64,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            gamma: Gamma::Scale,
            tol: 1e-3,
            max_iter: 1000,
            random_state: 42,
        }
    }
}

/// RBF kernel with gamma already resolved
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct RbfKernel {
    gamma: f64,
}

impl RbfKernel {
    fn eval(&self, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
        let sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
        (-self.gamma * sq).exp()
    }
}

/// Platt sigmoid `P(1 | f) = 1 / (1 + exp(a * f + b))`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlattScaling {
    pub a: f64,
    pub b: f64,
}

impl PlattScaling {
    /// Newton fit with backtracking line search on regularized targets
    pub fn fit(decision: &[f64], labels: &[f64]) -> Self {
        let n_pos = labels.iter().filter(|&&l| l > 0.5).count() as f64;
        let n_neg = labels.len() as f64 - n_pos;
        let hi = (n_pos + 1.0) / (n_pos + 2.0);
        let lo = 1.0 / (n_neg + 2.0);
        let targets: Vec<f64> = labels.iter().map(|&l| if l > 0.5 { hi } else { lo }).collect();

        let objective = |a: f64, b: f64| -> f64 {
            decision
                .iter()
                .zip(&targets)
                .map(|(&f, &t)| {
                    let z = f * a + b;
                    if z >= 0.0 {
                        t * z + (1.0 + (-z).exp()).ln()
                    } else {
                        (t - 1.0) * z + (1.0 + z.exp()).ln()
                    }
                })
                .sum()
        };

        let mut a = 0.0;
        let mut b = ((n_neg + 1.0) / (n_pos + 1.0)).ln();
        let mut fval = objective(a, b);

        for _ in 0..100 {
            let (mut h11, mut h22, mut h21, mut g1, mut g2) = (1e-12, 1e-12, 0.0, 0.0, 0.0);
            for (&f, &t) in decision.iter().zip(&targets) {
                let z = f * a + b;
                let (p, q) = if z >= 0.0 {
                    let e = (-z).exp();
                    (e / (1.0 + e), 1.0 / (1.0 + e))
                } else {
                    let e = z.exp();
                    (1.0 / (1.0 + e), e / (1.0 + e))
                };
                let d2 = p * q;
                h11 += f * f * d2;
                h22 += d2;
                h21 += f * d2;
                let d1 = t - p;
                g1 += f * d1;
                g2 += d1;
            }

            if g1.abs() < 1e-5 && g2.abs() < 1e-5 {
                break;
            }

            let det = h11 * h22 - h21 * h21;
            let da = -(h22 * g1 - h21 * g2) / det;
            let db = -(-h21 * g1 + h11 * g2) / det;
            let gd = g1 * da + g2 * db;

            let mut step = 1.0;
            while step >= 1e-10 {
                let (na, nb) = (a + step * da, b + step * db);
                let nf = objective(na, nb);
                if nf < fval + 1e-4 * step * gd {
                    a = na;
                    b = nb;
                    fval = nf;
                    break;
                }
                step /= 2.0;
            }
            if step < 1e-10 {
                break;
            }
        }

        Self { a, b }
    }

    pub fn probability(&self, decision: f64) -> f64 {
        let z = decision * self.a + self.b;
        if z >= 0.0 {
            let e = (-z).exp();
            e / (1.0 + e)
        } else {
            1.0 / (1.0 + z.exp())
        }
    }
}

/// Support Vector Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMClassifier {
    config: SVMConfig,
    kernel: Option<RbfKernel>,
    support_vectors: Option<Array2<f64>>,
    /// alpha_i * y_i of each support vector
    dual_coef: Option<Array1<f64>>,
    bias: f64,
    platt: Option<PlattScaling>,
}

impl Default for SVMClassifier {
    fn default() -> Self {
        Self::new(SVMConfig::default())
    }
}

impl SVMClassifier {
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            kernel: None,
            support_vectors: None,
            dual_coef: None,
            bias: 0.0,
            platt: None,
        }
    }

    fn resolve_kernel(&self, x: &Array2<f64>) -> Result<RbfKernel> {
        match self.config.gamma {
            Gamma::Value(g) if g > 0.0 && g.is_finite() => Ok(RbfKernel { gamma: g }),
            Gamma::Value(g) => Err(AutisenseError::InvalidParameter {
                name: "gamma".to_string(),
                value: g.to_string(),
                reason: "must be a positive finite number".to_string(),
            }),
            Gamma::Scale => {
                let var = x.var(0.0);
                let gamma = if var > 0.0 { 1.0 / (x.ncols() as f64 * var) } else { 1.0 };
                Ok(RbfKernel { gamma })
            }
        }
    }

    fn kernel_matrix(kernel: RbfKernel, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| (0..n).map(|j| kernel.eval(x.row(i), x.row(j))).collect())
            .collect();
        let mut k = Array2::zeros((n, n));
        for (i, row) in rows.into_iter().enumerate() {
            for (j, v) in row.into_iter().enumerate() {
                k[[i, j]] = v;
            }
        }
        k
    }

    /// Simplified SMO over a precomputed kernel matrix; `y` is in {-1, +1}
    fn smo_train(&self, k: &Array2<f64>, y: &Array1<f64>) -> (Array1<f64>, f64) {
        let n = y.len();
        let c = self.config.c;
        let tol = self.config.tol;

        let mut alphas: Array1<f64> = Array1::zeros(n);
        let mut bias = 0.0;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);

        let output = |alphas: &Array1<f64>, bias: f64, idx: usize| -> f64 {
            let mut sum = bias;
            for i in 0..n {
                if alphas[i] != 0.0 {
                    sum += alphas[i] * y[i] * k[[i, idx]];
                }
            }
            sum
        };

        let mut passes = 0;
        let max_passes = 5;
        let mut total_iter = 0;

        while passes < max_passes && total_iter < self.config.max_iter && n > 1 {
            let mut num_changed = 0;

            for i in 0..n {
                let e_i = output(&alphas, bias, i) - y[i];

                if (y[i] * e_i < -tol && alphas[i] < c) || (y[i] * e_i > tol && alphas[i] > 0.0) {
                    let j = loop {
                        let j = rng.gen_range(0..n);
                        if j != i {
                            break j;
                        }
                    };
                    let e_j = output(&alphas, bias, j) - y[j];

                    let alpha_i_old = alphas[i];
                    let alpha_j_old = alphas[j];

                    let (l, h) = if y[i] != y[j] {
                        ((alpha_j_old - alpha_i_old).max(0.0), (c + alpha_j_old - alpha_i_old).min(c))
                    } else {
                        ((alpha_i_old + alpha_j_old - c).max(0.0), (alpha_i_old + alpha_j_old).min(c))
                    };
                    if (l - h).abs() < 1e-10 {
                        continue;
                    }

                    let eta = 2.0 * k[[i, j]] - k[[i, i]] - k[[j, j]];
                    if eta >= 0.0 {
                        continue;
                    }

                    alphas[j] = (alpha_j_old - y[j] * (e_i - e_j) / eta).clamp(l, h);
                    if (alphas[j] - alpha_j_old).abs() < 1e-5 {
                        continue;
                    }
                    alphas[i] = alpha_i_old + y[i] * y[j] * (alpha_j_old - alphas[j]);

                    let b1 = bias
                        - e_i
                        - y[i] * (alphas[i] - alpha_i_old) * k[[i, i]]
                        - y[j] * (alphas[j] - alpha_j_old) * k[[i, j]];
                    let b2 = bias
                        - e_j
                        - y[i] * (alphas[i] - alpha_i_old) * k[[i, j]]
                        - y[j] * (alphas[j] - alpha_j_old) * k[[j, j]];

                    bias = if alphas[i] > 0.0 && alphas[i] < c {
                        b1
                    } else if alphas[j] > 0.0 && alphas[j] < c {
                        b2
                    } else {
                        (b1 + b2) / 2.0
                    };

                    num_changed += 1;
                }
            }

            total_iter += 1;
            if num_changed == 0 {
                passes += 1;
            } else {
                passes = 0;
            }
        }

        debug!(sweeps = total_iter, "SMO finished");
        (alphas, bias)
    }

    /// Signed distance to the separating surface; positive favours class 1
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (kernel, sv, coef) = match (&self.kernel, &self.support_vectors, &self.dual_coef) {
            (Some(k), Some(sv), Some(c)) => (*k, sv, c),
            _ => return Err(AutisenseError::ModelNotFitted),
        };
        check_features(x, sv.ncols())?;

        let scores: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i);
                sv.rows()
                    .into_iter()
                    .zip(coef.iter())
                    .map(|(s, &c)| c * kernel.eval(row, s))
                    .sum::<f64>()
                    + self.bias
            })
            .collect();
        Ok(Array1::from_vec(scores))
    }

    /// Get number of support vectors
    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.as_ref().map_or(0, |sv| sv.nrows())
    }

    pub fn platt(&self) -> Option<PlattScaling> {
        self.platt
    }
}

impl Classifier for SVMClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;

        let n = x.nrows();
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(AutisenseError::InvalidInput(format!(
                "{} samples exceed the SVM kernel matrix limit of {}",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }
        if y.iter().all(|&v| v == y[0]) {
            return Err(AutisenseError::InvalidInput(
                "SVM requires samples of both classes".to_string(),
            ));
        }
        if !(self.config.c > 0.0) {
            return Err(AutisenseError::InvalidParameter {
                name: "c".to_string(),
                value: self.config.c.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let kernel = self.resolve_kernel(x)?;
        let k = Self::kernel_matrix(kernel, x);
        let y_signed = y.mapv(|v| if v > 0.5 { 1.0 } else { -1.0 });

        let (alphas, bias) = self.smo_train(&k, &y_signed);

        let support: Vec<usize> = (0..n).filter(|&i| alphas[i] > 1e-8).collect();
        let support_vectors = x.select(ndarray::Axis(0), &support);
        let dual_coef: Array1<f64> = support.iter().map(|&i| alphas[i] * y_signed[i]).collect();

        // Training decision values straight from the kernel matrix
        let decision: Vec<f64> = (0..n)
            .map(|j| support.iter().zip(dual_coef.iter()).map(|(&i, &c)| c * k[[i, j]]).sum::<f64>() + bias)
            .collect();
        let platt = PlattScaling::fit(&decision, &y.to_vec());

        debug!(support_vectors = support.len(), a = platt.a, b = platt.b, "SVM fitted");

        self.kernel = Some(kernel);
        self.support_vectors = Some(support_vectors);
        self.dual_coef = Some(dual_coef);
        self.bias = bias;
        self.platt = Some(platt);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(|s| if s > 0.0 { 1.0 } else { 0.0 }))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let platt = self.platt.ok_or(AutisenseError::ModelNotFitted)?;
        let decision = self.decision_function(x)?;
        Ok(binary_proba(&decision.mapv(|f| platt.probability(f))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_clusters() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [0.0, 0.0],
            [0.2, 0.1],
            [0.1, 0.3],
            [0.3, 0.2],
            [3.0, 3.0],
            [3.2, 2.9],
            [2.8, 3.1],
            [3.1, 3.3],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_svm_separates_clusters() {
        let (x, y) = two_clusters();
        let mut svm = SVMClassifier::default();
        svm.fit(&x, &y).unwrap();

        assert_eq!(svm.predict(&x).unwrap(), y);
        assert!(svm.n_support_vectors() > 0);
    }

    #[test]
    fn test_platt_probabilities_order_with_decision() {
        let (x, y) = two_clusters();
        let mut svm = SVMClassifier::default();
        svm.fit(&x, &y).unwrap();

        let proba = svm.predict_proba(&x).unwrap();
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
        let platt = svm.platt().unwrap();
        assert!(platt.a < 0.0, "larger decision values should mean higher P(1)");
        assert!(proba[[0, 1]] < proba[[4, 1]]);
    }

    #[test]
    fn test_platt_fit_on_separated_scores() {
        let decision = [-2.0, -1.5, -1.0, 1.0, 1.5, 2.0];
        let labels = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let platt = PlattScaling::fit(&decision, &labels);
        assert!(platt.probability(2.0) > 0.5);
        assert!(platt.probability(-2.0) < 0.5);
    }

    #[test]
    fn test_single_class_rejected() {
        let x = array![[0.0], [1.0]];
        let y = array![1.0, 1.0];
        assert!(matches!(
            SVMClassifier::default().fit(&x, &y),
            Err(AutisenseError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_non_positive_gamma_rejected() {
        let (x, y) = two_clusters();
        let mut svm = SVMClassifier::new(SVMConfig {
            gamma: Gamma::Value(0.0),
            ..Default::default()
        });
        assert!(matches!(
            svm.fit(&x, &y),
            Err(AutisenseError::InvalidParameter { .. })
        ));
    }
}
