//! Model training module
//!
//! Provides:
//! - The `ModelAdapter` contract and the model family tables
//! - Reference adapters: logistic regression and a random forest
//! - AUC-ROC scoring
//! - The per-row result table
//! - The `Trainer` run state machine

mod config;
mod decision_tree;
mod trainer;
pub mod logistic;
pub mod metrics;
pub mod model;
pub mod random_forest;
pub mod results;

pub use config::{builtin_model, TestSelector, TrainerConfig};
pub use logistic::{LogisticRegressionModel, Penalty};
pub use metrics::{accuracy, roc_auc};
pub use model::{BinaryClasses, FittedModel, ModelAdapter, ModelFamily};
pub use random_forest::{MaxFeatures, RandomForestModel};
pub use results::{ResultTable, UNPREDICTED};
pub use trainer::{OptimizeReport, RunReport, RunState, Trainer};
