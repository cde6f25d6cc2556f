//! Hyperparameter search
//!
//! Provides:
//! - Parameter values, sets and grids
//! - Trial search spaces with seeded sampling
//! - Exhaustive grid search and budgeted trial search, optionally parallel
//! - Joint studies over several models and preprocessing variants
//! - A per-model parameter cache behind `load_or_tune`

mod config;
mod objective;
mod optimizer;
pub mod cache;
pub mod grid;
pub mod params;
pub mod search_space;
pub mod trials;

pub use cache::{CacheLookup, ParamCache};
pub use config::{SearchConfig, SearchStrategy};
pub use grid::GridSearch;
pub use objective::cross_validate;
pub use optimizer::{HyperparamOptimizer, HyperparamSearch, ParamSource, SearchOutcome, TunedParams};
pub use params::{GridAxis, ParamGrid, ParamSet, ParamValue};
pub use search_space::{Parameter, ParameterType, SearchSpace};
pub use trials::{model_params, sampled_model, Study, Trial, TrialSearch, TrialStatus, MODEL_KEY, PREPROCESSING_KEY};
