//! Exhaustive grid search over AdaBoost configurations

use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::config::{AdaBoostGrid, AdaBoostParams, TuningConfig};
use crate::error::{AutisenseError, Result};
use crate::training::{cross_val_score, AdaBoostClassifier, CVResults, Classifier};

/// Score of one grid configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    /// Position in grid order
    pub trial_id: usize,
    pub params: AdaBoostParams,
    pub cv: Option<CVResults>,
    pub error: Option<String>,
}

impl TrialResult {
    pub fn mean_score(&self) -> Option<f64> {
        self.cv.as_ref().map(|cv| cv.mean_score)
    }
}

/// Best configuration, refitted on the full training split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningOutcome {
    #[serde(skip)]
    pub best_model: AdaBoostClassifier,
    pub best_params: AdaBoostParams,
    /// Mean CV accuracy of the winner
    pub best_score: f64,
    pub best_std: f64,
    pub trials: Vec<TrialResult>,
    pub elapsed_secs: f64,
}

/// Grid search with cross-validated accuracy
#[derive(Debug, Clone, Default)]
pub struct GridSearchTuner {
    grid: AdaBoostGrid,
    config: TuningConfig,
}

impl GridSearchTuner {
    pub fn new(grid: AdaBoostGrid, config: TuningConfig) -> Self {
        Self { grid, config }
    }

    pub fn grid(&self) -> &AdaBoostGrid {
        &self.grid
    }

    /// Score every configuration and refit the best one
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<TuningOutcome> {
        self.grid.validate()?;
        let start = Instant::now();
        let configs = self.grid.configurations();
        info!(configurations = configs.len(), n_jobs = ?self.config.n_jobs, "Starting grid search");

        let trials = match self.config.n_jobs {
            Some(n_jobs) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n_jobs)
                    .build()
                    .map_err(|e| AutisenseError::ThreadPoolError(e.to_string()))?;
                pool.install(|| self.run_trials(&configs, x, y))
            }
            None => self.run_trials(&configs, x, y),
        };

        let (best_idx, best_cv) = select_best(&trials).ok_or_else(|| {
            AutisenseError::OptimizationError(format!("all {} grid configurations failed", trials.len()))
        })?;
        let best_params = trials[best_idx].params;

        let mut best_model = best_params.build();
        best_model.fit(x, y)?;

        let elapsed_secs = start.elapsed().as_secs_f64();
        info!(
            n_estimators = best_params.n_estimators,
            learning_rate = best_params.learning_rate,
            max_depth = best_params.max_depth,
            score = best_cv.mean_score,
            elapsed_secs,
            "Grid search finished"
        );

        Ok(TuningOutcome {
            best_model,
            best_params,
            best_score: best_cv.mean_score,
            best_std: best_cv.std_score,
            trials,
            elapsed_secs,
        })
    }

    fn run_trials(&self, configs: &[AdaBoostParams], x: &Array2<f64>, y: &Array1<f64>) -> Vec<TrialResult> {
        let cv = self.config.cross_validator();
        configs
            .par_iter()
            .enumerate()
            .map(|(trial_id, params)| match cross_val_score(|| params.build(), x, y, &cv) {
                Ok(results) => {
                    debug!(trial_id, ?params, score = results.mean_score, "Trial scored");
                    TrialResult {
                        trial_id,
                        params: *params,
                        cv: Some(results),
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(trial_id, ?params, error = %e, "Trial failed");
                    TrialResult {
                        trial_id,
                        params: *params,
                        cv: None,
                        error: Some(e.to_string()),
                    }
                }
            })
            .collect()
    }
}

/// Highest mean wins; the earliest trial keeps a tie
fn select_best(trials: &[TrialResult]) -> Option<(usize, CVResults)> {
    let mut best: Option<(usize, &CVResults)> = None;
    for (idx, trial) in trials.iter().enumerate() {
        if let Some(cv) = &trial.cv {
            match best {
                Some((_, current)) if cv.mean_score <= current.mean_score => {}
                _ => best = Some((idx, cv)),
            }
        }
    }
    best.map(|(idx, cv)| (idx, cv.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (Array2<f64>, Array1<f64>) {
        // Classes separated by a gap so every fold's stump lands between them
        let x = Array2::from_shape_fn((40, 2), |(i, j)| match j {
            0 if i < 20 => i as f64,
            0 => i as f64 + 10.0,
            _ => (i % 3) as f64,
        });
        let y = x.column(0).mapv(|v| if v >= 30.0 { 1.0 } else { 0.0 });
        (x, y)
    }

    fn small_grid() -> AdaBoostGrid {
        AdaBoostGrid::default()
            .with_n_estimators(vec![5, 10])
            .with_learning_rate(vec![0.1, 1.0])
            .with_max_depth(vec![1])
    }

    #[test]
    fn test_grid_search_finds_a_perfect_configuration() {
        let (x, y) = data();
        let outcome = GridSearchTuner::new(small_grid(), TuningConfig::default()).fit(&x, &y).unwrap();

        assert_eq!(outcome.trials.len(), 4);
        assert_eq!(outcome.best_score, 1.0);
        // Every configuration separates a single threshold, so the first one wins the tie
        assert_eq!(outcome.best_params, small_grid().configurations()[0]);
        assert_eq!(outcome.best_model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_bounded_pool_gives_same_result() {
        let (x, y) = data();
        let a = GridSearchTuner::new(small_grid(), TuningConfig::default()).fit(&x, &y).unwrap();
        let b = GridSearchTuner::new(small_grid(), TuningConfig::default().with_n_jobs(2))
            .fit(&x, &y)
            .unwrap();
        assert_eq!(a.best_params, b.best_params);
        assert_eq!(a.trials, b.trials);
    }

    #[test]
    fn test_all_trials_failing() {
        let (x, y) = data();
        let grid = small_grid().with_n_estimators(vec![0]);
        let err = GridSearchTuner::new(grid, TuningConfig::default()).fit(&x, &y).unwrap_err();
        assert!(matches!(err, AutisenseError::OptimizationError(_)));
    }

    #[test]
    fn test_select_best_prefers_earliest_tie() {
        let trial = |id: usize, score: f64| TrialResult {
            trial_id: id,
            params: AdaBoostParams::default(),
            cv: Some(CVResults::from_scores(vec![score])),
            error: None,
        };
        let trials = vec![trial(0, 0.8), trial(1, 0.9), trial(2, 0.9)];
        assert_eq!(select_best(&trials).map(|(i, _)| i), Some(1));
    }
}
