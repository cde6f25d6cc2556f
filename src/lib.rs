//! tabular-cv - Cross-validation harness for tabular classifiers
//!
//! This crate provides:
//! - Reproducible, stratified train/test and k-fold splits persisted as JSON
//! - Leak-free preprocessing fitted on the training partition only
//! - Grid and trial hyperparameter search with a per-model parameter cache
//! - A trainer that writes out-of-fold and test predictions per row
//!
//! # Modules
//!
//! - [`splits`] - Split building, validation and persistence
//! - [`dataset`] - Source tables, partitions and fold iteration
//! - [`preprocessing`] - Scaling and feature selection
//! - [`optimizer`] - Hyperparameter search and parameter cache
//! - [`training`] - Model adapters, metrics, result table and trainer
//! - [`config`] - Experiment configuration files
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Core modules
pub mod splits;
pub mod dataset;
pub mod preprocessing;
pub mod optimizer;
pub mod training;

// Configuration and I/O
pub mod config;
pub mod utils;

// Services
pub mod cli;

pub use error::{CvError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{CvError, Result};

    // Splits
    pub use crate::splits::{CaseId, SplitAssignment, SplitConfig, SplitStore};

    // Data
    pub use crate::dataset::{ColumnConfig, Dataset, Partition, PartitionRole, TrainingData};

    // Preprocessing
    pub use crate::preprocessing::{PreprocessingConfig, Preprocessor, ScalerType, SelectionMethod};

    // Optimization
    pub use crate::optimizer::{
        GridSearch, HyperparamOptimizer, HyperparamSearch, ParamCache, ParamGrid, ParamSet, ParamValue,
        SearchConfig, SearchStrategy, TrialSearch,
    };

    // Training
    pub use crate::training::{
        LogisticRegressionModel, ModelAdapter, ModelFamily, RandomForestModel, ResultTable, Trainer,
        TrainerConfig,
    };

    // Configuration and I/O
    pub use crate::config::ExperimentConfig;
    pub use crate::utils::DataLoader;
}
