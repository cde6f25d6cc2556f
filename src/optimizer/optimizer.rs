//! Search strategy seam and the cached `load_or_tune` entry point

use super::cache::{CacheLookup, ParamCache};
use super::config::{SearchConfig, SearchStrategy};
use super::grid::GridSearch;
use super::params::ParamSet;
use super::trials::{Trial, TrialSearch};
use crate::dataset::TrainingData;
use crate::error::Result;
use crate::training::{FittedModel, ModelAdapter};
use std::fmt;
use std::time::Instant;
use tracing::{info, warn};

/// Result of one search
#[derive(Debug)]
pub struct SearchOutcome {
    pub best_params: ParamSet,
    /// Mean validation AUC of the best parameters
    pub best_score: f64,
    /// Best configuration refitted on the full training partition
    pub model: Option<FittedModel>,
    pub trials: Vec<Trial>,
}

/// A hyperparameter search strategy
pub trait HyperparamSearch: Send + Sync {
    fn search(&self, model: &dyn ModelAdapter, data: &TrainingData) -> Result<SearchOutcome>;
}

/// Where `load_or_tune` got its parameters from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamSource {
    Cache,
    Search { best_score: f64 },
}

impl fmt::Display for ParamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamSource::Cache => write!(f, "cached"),
            ParamSource::Search { best_score } => write!(f, "searched, AUC {:.4}", best_score),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TunedParams {
    pub params: ParamSet,
    pub source: ParamSource,
}

/// Parameter cache in front of a search strategy
pub struct HyperparamOptimizer {
    cache: ParamCache,
    strategy: Box<dyn HyperparamSearch>,
}

impl HyperparamOptimizer {
    pub fn new(cache: ParamCache, strategy: Box<dyn HyperparamSearch>) -> Self {
        Self { cache, strategy }
    }

    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        config.validate()?;
        let strategy: Box<dyn HyperparamSearch> = match config.strategy {
            SearchStrategy::Grid => {
                let mut grid = GridSearch::new()
                    .with_n_jobs(config.n_jobs)
                    .with_overrides(config.grid_overrides.clone());
                if let Some(pre) = &config.fold_preprocessing {
                    grid = grid.with_fold_preprocessing(pre.clone());
                }
                Box::new(grid)
            }
            SearchStrategy::Trials => {
                let mut trials = TrialSearch::new(config.n_trials)
                    .with_seed(config.seed)
                    .with_n_jobs(config.n_jobs);
                if let Some(pre) = &config.fold_preprocessing {
                    trials = trials.with_fold_preprocessing(pre.clone());
                }
                Box::new(trials)
            }
        };
        Ok(Self::new(ParamCache::new(&config.param_dir), strategy))
    }

    pub fn cache(&self) -> &ParamCache {
        &self.cache
    }

    /// Apply cached parameters to `model`, or search, apply and cache them.
    ///
    /// A cache record the model rejects is treated like a corrupted one.
    pub fn load_or_tune(&self, model: &mut dyn ModelAdapter, data: &TrainingData) -> Result<TunedParams> {
        self.load_or_tune_fitted(model, data).map(|(tuned, _)| tuned)
    }

    /// Like `load_or_tune`, also returning the search's model refitted on the
    /// full training partition. A cache hit has no fitted model.
    pub fn load_or_tune_fitted(
        &self,
        model: &mut dyn ModelAdapter,
        data: &TrainingData,
    ) -> Result<(TunedParams, Option<FittedModel>)> {
        let name = model.name().to_string();
        match self.cache.load_params(&name) {
            CacheLookup::Hit(params) => match model.set_params(&params) {
                Ok(()) => {
                    info!(model = %name, %params, "Loaded cached parameters");
                    let tuned = TunedParams {
                        params,
                        source: ParamSource::Cache,
                    };
                    return Ok((tuned, None));
                }
                Err(e) => warn!(model = %name, error = %e, "Cached parameters rejected, tuning"),
            },
            CacheLookup::Missing => {
                warn!(model = %name, path = %self.cache.path_for(&name).display(), "No cached parameters, tuning")
            }
            CacheLookup::Corrupted(reason) => warn!(model = %name, %reason, "Corrupted parameter cache, tuning"),
        }

        let start = Instant::now();
        let outcome = self.strategy.search(&*model, data)?;
        model.set_params(&outcome.best_params)?;
        self.cache.save_params(&name, &outcome.best_params)?;
        info!(
            model = %name,
            score = outcome.best_score,
            n_trials = outcome.trials.len(),
            duration_secs = start.elapsed().as_secs_f64(),
            "Tuned parameters cached"
        );
        let tuned = TunedParams {
            params: outcome.best_params,
            source: ParamSource::Search {
                best_score: outcome.best_score,
            },
        };
        Ok((tuned, outcome.model))
    }
}
