//! Data preprocessing module
//!
//! Scaling and feature selection, fitted on the training partition only and
//! applied unchanged to every other partition. Optional oversampling adds
//! synthetic rows to training partitions only.

mod config;
mod oversampling;
mod pipeline;
mod scaler;
pub mod feature_selection;

pub use config::PreprocessingConfig;
pub use feature_selection::{FeatureSelector, SelectionMethod};
pub use oversampling::{OversamplingMethod, SyntheticRows};
pub use pipeline::Preprocessor;
pub use scaler::{Scaler, ScalerType};
