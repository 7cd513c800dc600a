//! Cross-validation strategies

use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::Classifier;
use crate::error::{AutisenseError, Result};

/// Cross-validation strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// Contiguous folds over the sample order (or a seeded permutation)
    KFold { n_splits: usize, shuffle: bool },
    /// Folds that keep the class proportions of `y`
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::StratifiedKFold {
            n_splits: 5,
            shuffle: false,
        }
    }
}

impl CVStrategy {
    pub fn n_splits(&self) -> usize {
        match *self {
            CVStrategy::KFold { n_splits, .. } | CVStrategy::StratifiedKFold { n_splits, .. } => n_splits,
        }
    }
}

/// A single train/test split
#[derive(Debug, Clone, PartialEq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validator
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: Option<u64>,
}

impl Default for CrossValidator {
    fn default() -> Self {
        Self::new(CVStrategy::default())
    }
}

impl CrossValidator {
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: None,
        }
    }

    /// Seed used when the strategy shuffles
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn strategy(&self) -> CVStrategy {
        self.strategy
    }

    /// Generate the splits; `y` is required for stratification
    pub fn split(&self, n_samples: usize, y: Option<&Array1<f64>>) -> Result<Vec<CVSplit>> {
        let n_splits = self.strategy.n_splits();
        if n_splits < 2 {
            return Err(AutisenseError::InvalidParameter {
                name: "n_splits".to_string(),
                value: n_splits.to_string(),
                reason: "cross-validation needs at least 2 folds".to_string(),
            });
        }
        if n_samples < n_splits {
            return Err(AutisenseError::InvalidInput(format!(
                "cannot split {} samples into {} folds",
                n_samples, n_splits
            )));
        }

        match self.strategy {
            CVStrategy::KFold { shuffle, .. } => Ok(self.k_fold_split(n_samples, n_splits, shuffle)),
            CVStrategy::StratifiedKFold { shuffle, .. } => {
                let y = y.ok_or_else(|| {
                    AutisenseError::InvalidInput("stratified folds need the labels".to_string())
                })?;
                if y.len() != n_samples {
                    return Err(AutisenseError::ShapeError {
                        expected: format!("{} labels", n_samples),
                        actual: format!("{} labels", y.len()),
                    });
                }
                Ok(self.stratified_k_fold_split(y, n_splits, shuffle))
            }
        }
    }

    fn rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(42))
    }

    fn k_fold_split(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Vec<CVSplit> {
        let mut indices: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            indices.shuffle(&mut self.rng());
        }

        // The first n_samples % n_splits folds take one extra sample
        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;

        let mut splits = Vec::with_capacity(n_splits);
        let mut start = 0;
        for fold_idx in 0..n_splits {
            let size = base + usize::from(fold_idx < remainder);
            let end = start + size;

            let test_indices = indices[start..end].to_vec();
            let train_indices = indices[..start]
                .iter()
                .chain(indices[end..].iter())
                .copied()
                .collect();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });
            start = end;
        }
        splits
    }

    fn stratified_k_fold_split(&self, y: &Array1<f64>, n_splits: usize, shuffle: bool) -> Vec<CVSplit> {
        // Labels are 0/1 after normalization; keyed by integer so the map is ordered
        let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (i, &label) in y.iter().enumerate() {
            by_class.entry(label.round() as i64).or_default().push(i);
        }

        let mut rng = self.rng();
        let mut fold_of = vec![0usize; y.len()];
        // Continue the round-robin across classes so fold sizes stay balanced
        let mut next_fold = 0;
        for members in by_class.values_mut() {
            if shuffle {
                members.shuffle(&mut rng);
            }
            for &idx in members.iter() {
                fold_of[idx] = next_fold;
                next_fold = (next_fold + 1) % n_splits;
            }
        }

        (0..n_splits)
            .map(|fold_idx| {
                let (test_indices, train_indices): (Vec<usize>, Vec<usize>) =
                    (0..y.len()).partition(|&i| fold_of[i] == fold_idx);
                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect()
    }
}

/// Cross-validation results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CVResults {
    /// Accuracy of each fold
    pub scores: Vec<f64>,
    pub mean_score: f64,
    /// Population standard deviation of the fold scores
    pub std_score: f64,
    pub n_folds: usize,
}

impl CVResults {
    /// Create CV results from fold scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        let denom = n_folds.max(1) as f64;
        let mean_score = scores.iter().sum::<f64>() / denom;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / denom;

        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
            n_folds,
        }
    }

    /// Half-width of the reported interval (two standard deviations)
    pub fn interval(&self) -> f64 {
        2.0 * self.std_score
    }
}

impl fmt::Display for CVResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4} (+/- {:.4})", self.mean_score, self.interval())
    }
}

/// Share of predictions equal to the labels
pub(crate) fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (*t - *p).abs() < 0.5)
        .count();
    correct as f64 / y_true.len() as f64
}

/// Fold accuracies of a freshly built model per fold.
///
/// `make_model` is called once per fold so no fitted state leaks between folds.
pub fn cross_val_score<M, F>(
    make_model: F,
    x: &Array2<f64>,
    y: &Array1<f64>,
    cv: &CrossValidator,
) -> Result<CVResults>
where
    M: Classifier,
    F: Fn() -> M,
{
    if x.nrows() != y.len() {
        return Err(AutisenseError::ShapeError {
            expected: format!("{} labels", x.nrows()),
            actual: format!("{} labels", y.len()),
        });
    }

    let splits = cv.split(x.nrows(), Some(y))?;
    let mut scores = Vec::with_capacity(splits.len());
    for split in &splits {
        let x_train = x.select(Axis(0), &split.train_indices);
        let y_train = y.select(Axis(0), &split.train_indices);
        let x_test = x.select(Axis(0), &split.test_indices);
        let y_test = y.select(Axis(0), &split.test_indices);

        let mut model = make_model();
        model.fit(&x_train, &y_train)?;
        let predictions = model.predict(&x_test)?;
        scores.push(accuracy(&y_test, &predictions));
    }

    Ok(CVResults::from_scores(scores))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::LogisticRegression;
    use ndarray::array;

    #[test]
    fn test_k_fold() {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 5, shuffle: false });
        let splits = cv.split(100, None).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 20);
            assert_eq!(split.train_indices.len(), 80);
        }

        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort();
        assert_eq!(all_test, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_k_fold_uneven() {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 3, shuffle: false });
        let sizes: Vec<usize> = cv.split(10, None).unwrap().iter().map(|s| s.test_indices.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
    }

    #[test]
    fn test_stratified_k_fold() {
        let y = array![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0];

        let cv = CrossValidator::default();
        let splits = cv.split(10, Some(&y)).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 2);
            let positives = split.test_indices.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(positives, 1);
        }
    }

    #[test]
    fn test_unshuffled_folds_ignore_seed() {
        let y = array![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0];
        let a = CrossValidator::default().with_random_state(1).split(8, Some(&y)).unwrap();
        let b = CrossValidator::default().with_random_state(2).split(8, Some(&y)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_too_few_samples() {
        let cv = CrossValidator::default();
        let y = array![0.0, 1.0, 0.0];
        assert!(matches!(cv.split(3, Some(&y)), Err(AutisenseError::InvalidInput(_))));

        let single = CrossValidator::new(CVStrategy::KFold { n_splits: 1, shuffle: false });
        assert!(matches!(
            single.split(10, None),
            Err(AutisenseError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_cv_results_population_std() {
        let results = CVResults::from_scores(vec![0.8, 1.0]);
        assert!((results.mean_score - 0.9).abs() < 1e-12);
        assert!((results.std_score - 0.1).abs() < 1e-12);
        assert_eq!(results.to_string(), "0.9000 (+/- 0.2000)");
    }

    #[test]
    fn test_cross_val_score() {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64 - 10.0);
        let y = x.column(0).mapv(|v| if v >= 0.0 { 1.0 } else { 0.0 });

        let results = cross_val_score(LogisticRegression::new, &x, &y, &CrossValidator::default()).unwrap();
        assert_eq!(results.n_folds, 5);
        assert!(results.mean_score > 0.7);
    }
}
