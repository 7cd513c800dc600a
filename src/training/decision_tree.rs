//! CART decision tree with sample weights
//!
//! Used directly as the weak learner of AdaBoost, as the base tree of the
//! random forest and as the residual regressor of gradient boosting.

use super::{check_features, check_training_data, Classifier};
use crate::error::{AutisenseError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf holding the weighted mean target of its samples
    Leaf { value: f64, n_samples: usize },
    /// Internal node; samples with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Binary Gini impurity, `2p(1 - p)`
    Gini,
    /// Weighted variance (regression)
    MSE,
}

/// Running weighted sums of one side of a split
#[derive(Debug, Clone, Copy, Default)]
struct SideStats {
    count: usize,
    weight: f64,
    weighted_y: f64,
    weighted_y2: f64,
}

impl SideStats {
    fn push(&mut self, w: f64, y: f64) {
        self.count += 1;
        self.weight += w;
        self.weighted_y += w * y;
        self.weighted_y2 += w * y * y;
    }

    fn minus(&self, other: &SideStats) -> SideStats {
        SideStats {
            count: self.count - other.count,
            weight: self.weight - other.weight,
            weighted_y: self.weighted_y - other.weighted_y,
            weighted_y2: self.weighted_y2 - other.weighted_y2,
        }
    }

    fn mean(&self) -> f64 {
        if self.weight > 0.0 {
            self.weighted_y / self.weight
        } else {
            0.0
        }
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.weight <= 0.0 {
            return 0.0;
        }
        let mean = self.mean();
        match criterion {
            Criterion::Gini => {
                let p = mean.clamp(0.0, 1.0);
                2.0 * p * (1.0 - p)
            }
            Criterion::MSE => (self.weighted_y2 / self.weight - mean * mean).max(0.0),
        }
    }
}

/// Best split found for one feature
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth; `None` grows until leaves are pure
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features examined per node; `None` examines all of them
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    /// Seed for per-node feature sampling
    pub random_state: Option<u64>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            ..Self::new_classifier()
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set the number of features examined per node
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    fn is_classifier(&self) -> bool {
        self.criterion == Criterion::Gini
    }

    /// Fit with optional per-sample weights (uniform when `None`)
    pub fn fit_weighted(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        sample_weight: Option<&Array1<f64>>,
    ) -> Result<()> {
        let n_samples = x.nrows();
        if self.is_classifier() {
            check_training_data(x, y)?;
        } else if n_samples != y.len() || n_samples == 0 {
            return Err(AutisenseError::ShapeError {
                expected: format!("y length = {} (non-empty)", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }

        let weights = match sample_weight {
            Some(w) if w.len() != n_samples => {
                return Err(AutisenseError::ShapeError {
                    expected: format!("sample_weight length = {}", n_samples),
                    actual: format!("sample_weight length = {}", w.len()),
                })
            }
            Some(w) if w.iter().any(|v| !v.is_finite() || *v < 0.0) => {
                return Err(AutisenseError::InvalidInput(
                    "sample weights must be finite and non-negative".to_string(),
                ))
            }
            Some(w) => w.to_vec(),
            None => vec![1.0; n_samples],
        };

        self.n_features = x.ncols();
        let mut importances = vec![0.0; self.n_features];
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(42));

        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_tree(x, y, &weights, &indices, 0, &mut importances, &mut rng);
        self.root = Some(root);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(())
    }

    fn node_stats(y: &Array1<f64>, weights: &[f64], indices: &[usize]) -> SideStats {
        let mut stats = SideStats::default();
        for &i in indices {
            stats.push(weights[i], y[i]);
        }
        stats
    }

    #[allow(clippy::too_many_arguments)]
    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        weights: &[f64],
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let stats = Self::node_stats(y, weights, indices);
        let impurity = stats.impurity(self.criterion);

        let leaf = TreeNode::Leaf {
            value: stats.mean(),
            n_samples,
        };

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 1e-12
            || stats.weight <= 0.0;
        if should_stop {
            return leaf;
        }

        let features = self.candidate_features(rng);
        let best = match self.find_best_split(x, y, weights, indices, &features, &stats) {
            Some(best) => best,
            None => return leaf,
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best.feature_idx]] <= best.threshold);

        importances[best.feature_idx] += stats.weight * best.gain;

        let left = Box::new(self.build_tree(x, y, weights, &left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, y, weights, &right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < self.n_features => {
                let mut features = rand::seq::index::sample(rng, self.n_features, k.max(1)).into_vec();
                features.sort_unstable();
                features
            }
            _ => (0..self.n_features).collect(),
        }
    }

    /// Sorted sweep over each candidate feature; the earliest feature wins ties
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        weights: &[f64],
        indices: &[usize],
        features: &[usize],
        parent: &SideStats,
    ) -> Option<SplitCandidate> {
        let parent_impurity = parent.impurity(self.criterion);

        let per_feature: Vec<Option<SplitCandidate>> = features
            .par_iter()
            .map(|&feature_idx| {
                let mut order: Vec<usize> = indices.to_vec();
                order.sort_by(|&a, &b| x[[a, feature_idx]].total_cmp(&x[[b, feature_idx]]));

                let mut left = SideStats::default();
                let mut best: Option<SplitCandidate> = None;

                for pos in 0..order.len().saturating_sub(1) {
                    let i = order[pos];
                    left.push(weights[i], y[i]);

                    let current = x[[i, feature_idx]];
                    let next = x[[order[pos + 1], feature_idx]];
                    if next <= current {
                        continue;
                    }

                    let right = parent.minus(&left);
                    if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                        continue;
                    }

                    let child = (left.weight * left.impurity(self.criterion)
                        + right.weight * right.impurity(self.criterion))
                        / parent.weight;
                    let gain = parent_impurity - child;

                    if gain > 1e-12 && best.map_or(true, |b| gain > b.gain) {
                        best = Some(SplitCandidate {
                            feature_idx,
                            threshold: (current + next) / 2.0,
                            gain,
                        });
                    }
                }
                best
            })
            .collect();

        per_feature.into_iter().flatten().fold(None, |acc: Option<SplitCandidate>, c| match acc {
            Some(a) if a.gain >= c.gain => Some(a),
            _ => Some(c),
        })
    }

    fn leaf_value(node: &TreeNode, sample: ArrayView1<'_, f64>) -> f64 {
        let mut node = node;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if sample[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    /// Raw leaf values: P(1) for a classifier, the regression estimate otherwise
    pub fn predict_value(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(AutisenseError::ModelNotFitted)?;
        check_features(x, self.n_features)?;
        Ok(x.rows().into_iter().map(|row| Self::leaf_value(root, row)).collect())
    }

    /// Overwrite each leaf with `value_of` the rows of `x` that land in it.
    /// Leaves no row reaches keep their value.
    pub fn refit_leaves<F>(&mut self, x: &Array2<f64>, value_of: F) -> Result<()>
    where
        F: Fn(&[usize]) -> f64,
    {
        check_features(x, self.n_features)?;
        let root = self.root.as_mut().ok_or(AutisenseError::ModelNotFitted)?;
        let indices: Vec<usize> = (0..x.nrows()).collect();
        Self::refit_node(root, x, &indices, &value_of);
        Ok(())
    }

    fn refit_node<F>(node: &mut TreeNode, x: &Array2<f64>, indices: &[usize], value_of: &F)
    where
        F: Fn(&[usize]) -> f64,
    {
        match node {
            TreeNode::Leaf { value, .. } => {
                if !indices.is_empty() {
                    *value = value_of(indices);
                }
            }
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                ..
            } => {
                let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
                    indices.iter().partition(|&&i| x[[i, *feature_idx]] <= *threshold);
                Self::refit_node(left, x, &left_rows, value_of);
                Self::refit_node(right, x, &right_rows, value_of);
            }
        }
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        fn leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => leaves(left) + leaves(right),
            }
        }
        self.root.as_ref().map_or(0, leaves)
    }
}

impl Classifier for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fit_weighted(x, y, None)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let values = self.predict_value(x)?;
        if self.is_classifier() {
            Ok(values.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
        } else {
            Ok(values)
        }
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_classifier() {
            return Err(AutisenseError::InvalidInput(
                "predict_proba is only available for classification trees".to_string(),
            ));
        }
        Ok(super::binary_proba(&self.predict_value(x)?))
    }

    fn supports_feature_importance(&self) -> bool {
        true
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }
}
