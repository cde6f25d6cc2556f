//! Run configuration for the trainer

use super::logistic::LogisticRegressionModel;
use super::model::{ModelAdapter, ModelFamily};
use super::random_forest::RandomForestModel;
use crate::error::{CvError, Result};
use crate::optimizer::SearchConfig;
use crate::preprocessing::PreprocessingConfig;
use crate::splits::SplitConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Test set predefined by a metadata column value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSelector {
    pub column: String,
    pub value: String,
}

/// Configuration of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Names the prediction file `predictions_<task_name>.csv`
    pub task_name: String,

    pub result_dir: PathBuf,

    /// Split document; loaded when present, created otherwise
    pub split_path: PathBuf,

    /// Built-in models to train, in result column order
    pub models: Vec<String>,

    /// Use a predefined test set instead of a stratified one
    pub test_selector: Option<TestSelector>,

    pub split: SplitConfig,

    pub preprocessing: PreprocessingConfig,

    /// Variants sampled by the joint study; `preprocessing` alone when empty
    pub preprocessing_variants: Vec<PreprocessingConfig>,

    pub search: SearchConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            task_name: "task".to_string(),
            result_dir: PathBuf::from("results"),
            split_path: PathBuf::from("splits.json"),
            models: vec!["LogisticRegression".to_string(), "RandomForest".to_string()],
            test_selector: None,
            split: SplitConfig::default(),
            preprocessing: PreprocessingConfig::default(),
            preprocessing_variants: Vec::new(),
            search: SearchConfig::default(),
        }
    }
}

impl TrainerConfig {
    pub fn new(task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            ..Default::default()
        }
    }

    pub fn with_result_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.result_dir = dir.into();
        self
    }

    pub fn with_split_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.split_path = path.into();
        self
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    pub fn with_test_selector(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.test_selector = Some(TestSelector {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_split(mut self, split: SplitConfig) -> Self {
        self.split = split;
        self
    }

    pub fn with_preprocessing(mut self, preprocessing: PreprocessingConfig) -> Self {
        self.preprocessing = preprocessing;
        self
    }

    pub fn with_preprocessing_variants(mut self, variants: Vec<PreprocessingConfig>) -> Self {
        self.preprocessing_variants = variants;
        self
    }

    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.task_name.trim().is_empty() {
            return Err(CvError::InvalidConfig("task_name must not be empty".to_string()));
        }
        self.split.validate()?;
        self.search.validate()
    }

    /// Instantiate the configured built-in models
    pub fn build_models(&self) -> Result<Vec<Box<dyn ModelAdapter>>> {
        self.models.iter().map(|name| builtin_model(name)).collect()
    }
}

/// Built-in adapter for a model family name
pub fn builtin_model(name: &str) -> Result<Box<dyn ModelAdapter>> {
    match name.parse::<ModelFamily>()? {
        ModelFamily::LogisticRegression => Ok(Box::new(LogisticRegressionModel::new())),
        ModelFamily::RandomForest => Ok(Box::new(RandomForestModel::new())),
        other => Err(CvError::InvalidConfig(format!(
            "no built-in adapter for {}; supply a ModelAdapter implementation",
            other
        ))),
    }
}
