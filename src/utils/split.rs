//! Train/test splitting

use crate::error::{AutisenseError, Result};
use crate::utils::Dataset;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Hold-out split configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of rows held out for testing
    pub test_size: f64,
    pub random_state: u64,
    /// Keep class proportions on both sides
    pub stratify: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            random_state: 42,
            stratify: true,
        }
    }
}

impl SplitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_stratify(mut self, stratify: bool) -> Self {
        self.stratify = stratify;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(AutisenseError::InvalidParameter {
                name: "test_size".to_string(),
                value: self.test_size.to_string(),
                reason: "must be strictly between 0 and 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Row indices of the two sides of a split, each in ascending order
#[derive(Debug, Clone, PartialEq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Test rows for a group of `n` rows; both sides keep one row when `n >= 2`
fn test_count(n: usize, test_size: f64) -> usize {
    let wanted = (n as f64 * test_size).round() as usize;
    if n >= 2 {
        wanted.clamp(1, n - 1)
    } else {
        wanted.min(n)
    }
}

/// Shuffle each class with one seeded generator and hold out `test_size` of it
pub fn split_indices(labels: &[f64], config: &SplitConfig) -> Result<SplitIndices> {
    config.validate()?;
    if labels.len() < 2 {
        return Err(AutisenseError::InvalidInput(format!(
            "cannot split {} rows into train and test",
            labels.len()
        )));
    }

    let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    if config.stratify {
        for (i, &label) in labels.iter().enumerate() {
            groups.entry(label.round() as i64).or_default().push(i);
        }
    } else {
        groups.insert(0, (0..labels.len()).collect());
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.random_state);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();
    for members in groups.values_mut() {
        members.shuffle(&mut rng);
        let n_test = test_count(members.len(), config.test_size);
        test.extend_from_slice(&members[..n_test]);
        train.extend_from_slice(&members[n_test..]);
    }
    train.sort_unstable();
    test.sort_unstable();

    debug!(train = train.len(), test = test.len(), "Split rows");
    Ok(SplitIndices { train, test })
}

/// Split a dataset into (train, test)
pub fn train_test_split(dataset: &Dataset, config: &SplitConfig) -> Result<(Dataset, Dataset)> {
    let labels = dataset.labels().to_vec();
    let indices = split_indices(&labels, config)?;
    Ok((dataset.select(&indices.train)?, dataset.select(&indices.test)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(neg: usize, pos: usize) -> Vec<f64> {
        std::iter::repeat(0.0)
            .take(neg)
            .chain(std::iter::repeat(1.0).take(pos))
            .collect()
    }

    #[test]
    fn test_stratified_proportions() {
        let y = labels(70, 30);
        let split = split_indices(&y, &SplitConfig::default()).unwrap();

        assert_eq!(split.test.len(), 20);
        assert_eq!(split.train.len(), 80);
        let test_pos = split.test.iter().filter(|&&i| y[i] == 1.0).count();
        assert_eq!(test_pos, 6);
    }

    #[test]
    fn test_split_is_seeded() {
        let y = labels(40, 20);
        let a = split_indices(&y, &SplitConfig::default()).unwrap();
        let b = split_indices(&y, &SplitConfig::default()).unwrap();
        let c = split_indices(&y, &SplitConfig::default().with_random_state(7)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.test, c.test);
    }

    #[test]
    fn test_small_class_kept_on_both_sides() {
        let y = labels(20, 2);
        let split = split_indices(&y, &SplitConfig::default()).unwrap();
        assert_eq!(split.test.iter().filter(|&&i| y[i] == 1.0).count(), 1);
        assert_eq!(split.train.iter().filter(|&&i| y[i] == 1.0).count(), 1);
    }

    #[test]
    fn test_sides_are_disjoint_and_complete() {
        let y = labels(13, 8);
        let split = split_indices(&y, &SplitConfig::default().with_stratify(false)).unwrap();
        let mut all: Vec<usize> = split.train.iter().chain(split.test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..21).collect::<Vec<_>>());
    }

    #[test]
    fn test_invalid_test_size() {
        let y = labels(5, 5);
        let config = SplitConfig::default().with_test_size(1.0);
        assert!(matches!(
            split_indices(&y, &config),
            Err(AutisenseError::InvalidParameter { .. })
        ));
    }
}
