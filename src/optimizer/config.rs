//! Search configuration

use super::params::ParamGrid;
use crate::error::{CvError, Result};
use crate::preprocessing::PreprocessingConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Search strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchStrategy {
    /// Exhaustive search over a parameter grid
    Grid,
    /// Budgeted random trials over a search space
    Trials,
}

/// Configuration for hyperparameter search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub strategy: SearchStrategy,

    /// Trial budget per search (trial strategy only)
    pub n_trials: usize,

    /// Parallel workers for candidate evaluation; 1 evaluates sequentially
    pub n_jobs: usize,

    /// Seed of the trial sampler
    pub seed: u64,

    /// Directory of the per-model parameter cache
    pub param_dir: PathBuf,

    /// Grid replacing a model's static grid, keyed by model name
    #[serde(default)]
    pub grid_overrides: BTreeMap<String, ParamGrid>,

    /// Refit preprocessing on every fold-train partition during search
    #[serde(default)]
    pub fold_preprocessing: Option<PreprocessingConfig>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            strategy: SearchStrategy::Grid,
            n_trials: 100,
            n_jobs: 1,
            seed: 42,
            param_dir: PathBuf::from("hyperparameters"),
            grid_overrides: BTreeMap::new(),
            fold_preprocessing: None,
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy: SearchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_n_trials(mut self, n: usize) -> Self {
        self.n_trials = n;
        self
    }

    pub fn with_n_jobs(mut self, n: usize) -> Self {
        self.n_jobs = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_param_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.param_dir = dir.into();
        self
    }

    pub fn with_grid_override(mut self, model: impl Into<String>, grid: ParamGrid) -> Self {
        self.grid_overrides.insert(model.into(), grid);
        self
    }

    pub fn with_fold_preprocessing(mut self, config: PreprocessingConfig) -> Self {
        self.fold_preprocessing = Some(config);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_jobs == 0 {
            return Err(CvError::InvalidConfig("n_jobs must be at least 1".to_string()));
        }
        if self.strategy == SearchStrategy::Trials && self.n_trials == 0 {
            return Err(CvError::InvalidConfig("n_trials must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SearchConfig::default();
        assert_eq!(config.strategy, SearchStrategy::Grid);
        assert_eq!(config.n_jobs, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SearchConfig::new()
            .with_strategy(SearchStrategy::Trials)
            .with_n_trials(0)
            .with_param_dir("/tmp/params");
        assert_eq!(config.param_dir, PathBuf::from("/tmp/params"));
        assert!(config.validate().is_err());
    }
}
