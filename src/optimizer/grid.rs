//! Exhaustive grid search

use super::optimizer::{HyperparamSearch, SearchOutcome};
use super::params::ParamGrid;
use super::trials::{finish, run_study};
use crate::dataset::TrainingData;
use crate::error::Result;
use crate::preprocessing::PreprocessingConfig;
use crate::training::ModelAdapter;
use std::collections::BTreeMap;
use tracing::info;

/// Grid search over the model family's grid, or an override per model name.
///
/// Candidates are evaluated in grid order. Failed candidates are kept in the
/// trial list and skipped when picking the best.
#[derive(Debug, Clone, Default)]
pub struct GridSearch {
    n_jobs: usize,
    overrides: BTreeMap<String, ParamGrid>,
    fold_preprocessing: Option<PreprocessingConfig>,
}

impl GridSearch {
    pub fn new() -> Self {
        Self {
            n_jobs: 1,
            ..Default::default()
        }
    }

    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = n_jobs.max(1);
        self
    }

    pub fn with_grid(mut self, model: impl Into<String>, grid: ParamGrid) -> Self {
        self.overrides.insert(model.into(), grid);
        self
    }

    pub fn with_overrides(mut self, overrides: BTreeMap<String, ParamGrid>) -> Self {
        self.overrides.extend(overrides);
        self
    }

    pub fn with_fold_preprocessing(mut self, config: PreprocessingConfig) -> Self {
        self.fold_preprocessing = Some(config);
        self
    }

    pub fn grid_for(&self, model: &dyn ModelAdapter) -> Result<ParamGrid> {
        match self.overrides.get(model.name()) {
            Some(grid) => Ok(grid.clone()),
            None => model.param_grid(),
        }
    }
}

impl HyperparamSearch for GridSearch {
    fn search(&self, model: &dyn ModelAdapter, data: &TrainingData) -> Result<SearchOutcome> {
        let grid = self.grid_for(model)?;
        let candidates = grid.candidates();
        info!(
            model = %model.name(),
            n_candidates = candidates.len(),
            n_jobs = self.n_jobs,
            "Starting grid search"
        );

        let study = run_study(model, candidates, data, self.n_jobs, self.fold_preprocessing.as_ref())?;
        finish(model, study, data, self.fold_preprocessing.as_ref())
    }
}
