//! K-Nearest Neighbors classifier

use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::{binary_proba, check_features, check_training_data, Classifier};
use crate::error::{AutisenseError, Result};

/// KNN configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KNNConfig {
    /// Number of neighbors, each casting one vote
    pub n_neighbors: usize,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self { n_neighbors: 5 }
    }
}

/// K-Nearest Neighbors Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNClassifier {
    config: KNNConfig,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl Default for KNNClassifier {
    fn default() -> Self {
        Self::new(KNNConfig::default())
    }
}

impl KNNClassifier {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            x_train: None,
            y_train: None,
        }
    }

    pub fn with_k(k: usize) -> Self {
        Self::new(KNNConfig { n_neighbors: k })
    }

    /// Probability of class 1: the share of positive labels among the k nearest
    fn positive_probability(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (x_train, y_train) = match (&self.x_train, &self.y_train) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(AutisenseError::ModelNotFitted),
        };
        check_features(x, x_train.ncols())?;

        let k = self.config.n_neighbors.min(x_train.nrows());

        let probs: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let point: Vec<f64> = x.row(i).to_vec();
                let labels = find_k_nearest(&point, x_train, y_train, k);
                let positive = labels.iter().filter(|&&label| label > 0.5).count();
                positive as f64 / labels.len().max(1) as f64
            })
            .collect();

        Ok(Array1::from_vec(probs))
    }
}

impl Classifier for KNNClassifier {
    /// Stores the training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if self.config.n_neighbors == 0 {
            return Err(AutisenseError::InvalidParameter {
                name: "n_neighbors".to_string(),
                value: "0".to_string(),
                reason: "at least one neighbor is required".to_string(),
            });
        }
        check_training_data(x, y)?;
        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.positive_probability(x)?.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(binary_proba(&self.positive_probability(x)?))
    }
}

/// Max-heap entry keeping the k smallest distances; ties keep the earlier sample
#[derive(PartialEq)]
struct Neighbor {
    dist: f64,
    index: usize,
    label: f64,
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist.total_cmp(&other.dist).then(self.index.cmp(&other.index))
    }
}

/// Find k nearest neighbors using a max-heap, O(n log k)
fn find_k_nearest(
    point: &[f64],
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    k: usize,
) -> Vec<f64> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (index, row) in x_train.rows().into_iter().enumerate() {
        let dist = euclidean(point, row.iter());
        let candidate = Neighbor {
            dist,
            index,
            label: y_train[index],
        };
        if heap.len() < k {
            heap.push(candidate);
        } else if let Some(top) = heap.peek() {
            if candidate < *top {
                heap.pop();
                heap.push(candidate);
            }
        }
    }

    heap.into_iter().map(|n| n.label).collect()
}

fn euclidean<'a>(a: &[f64], b: impl Iterator<Item = &'a f64>) -> f64 {
    a.iter()
        .zip(b)
        .map(|(ai, bi)| {
            let d = ai - bi;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}
