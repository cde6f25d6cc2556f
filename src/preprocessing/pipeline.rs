//! Fit-once preprocessing pipeline

use super::{FeatureSelector, PreprocessingConfig, Scaler};
use crate::dataset::{Partition, PartitionRole};
use crate::error::{CvError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FittedState {
    scaler: Scaler,
    selector: Option<FeatureSelector>,
    input_features: Vec<String>,
    selected_features: Vec<String>,
    fitted_on: PartitionRole,
}

/// Scaler + feature selection state.
///
/// Created unfitted from a config, fitted exactly once on a training
/// partition (which consumes the unfitted value), then used read-only to
/// transform any number of partitions. A configured oversampler adds
/// synthetic rows when a training partition is transformed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preprocessor {
    config: PreprocessingConfig,
    state: Option<FittedState>,
}

impl Preprocessor {
    pub fn new(config: PreprocessingConfig) -> Self {
        Self { config, state: None }
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    /// Partition role the state was fitted on
    pub fn fitted_on(&self) -> Option<PartitionRole> {
        self.state.as_ref().map(|s| s.fitted_on)
    }

    /// Feature names kept after selection
    pub fn selected_features(&self) -> Option<&[String]> {
        self.state.as_ref().map(|s| s.selected_features.as_slice())
    }

    /// Fit on a training partition. Any other partition role is rejected.
    pub fn fit(self, train: &Partition) -> Result<Self> {
        if self.state.is_some() {
            return Err(CvError::PreprocessorAlreadyFitted);
        }
        if !train.role().is_training() {
            return Err(CvError::PreprocessorFitRejected(train.role().to_string()));
        }
        if let Some(method) = &self.config.oversampling {
            method.validate()?;
        }

        let mut scaler = Scaler::new(self.config.scaler);
        scaler.fit(train.x())?;
        let scaled = scaler.transform(train.x())?;

        let (selector, selected_features) = match &self.config.feature_selection {
            Some(method) => {
                let mut selector = FeatureSelector::new(method.clone());
                selector.fit(&scaled, train.y())?;
                let names = selector
                    .selected_indices()
                    .unwrap_or_default()
                    .iter()
                    .map(|&i| train.feature_names()[i].clone())
                    .collect();
                (Some(selector), names)
            }
            None => (None, train.feature_names().to_vec()),
        };

        debug!(
            role = %train.role(),
            n_features_in = train.n_features(),
            n_selected = selected_features.len(),
            "Fitted preprocessor"
        );

        Ok(Self {
            config: self.config,
            state: Some(FittedState {
                scaler,
                selector,
                input_features: train.feature_names().to_vec(),
                selected_features,
                fitted_on: train.role(),
            }),
        })
    }

    /// Apply the fitted state to a partition, returning a new partition.
    ///
    /// Training partitions are oversampled when configured; validation and
    /// test partitions keep their rows.
    pub fn transform(&self, partition: &Partition) -> Result<Partition> {
        let state = self.state.as_ref().ok_or(CvError::UnfittedPreprocessor)?;
        if partition.feature_names() != state.input_features.as_slice() {
            return Err(CvError::ShapeError {
                expected: format!("features {:?}", state.input_features),
                actual: format!("features {:?}", partition.feature_names()),
            });
        }

        let scaled = state.scaler.transform(partition.x())?;
        let x = match &state.selector {
            Some(selector) => selector.transform(&scaled)?,
            None => scaled,
        };
        let transformed = partition.with_features(x, state.selected_features.clone())?;

        match &self.config.oversampling {
            Some(method) if partition.role().is_training() => {
                let synthetic = method.resample(transformed.x(), transformed.y())?;
                debug!(
                    role = %partition.role(),
                    method = method.name(),
                    n_synthetic = synthetic.len(),
                    "Oversampled partition"
                );
                transformed.with_synthetic_rows(synthetic)
            }
            _ => Ok(transformed),
        }
    }
}
