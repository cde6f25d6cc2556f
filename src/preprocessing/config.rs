//! Preprocessing configuration

use super::{OversamplingMethod, ScalerType, SelectionMethod};
use serde::{Deserialize, Serialize};

/// Configuration for the scaler + feature selection + oversampling pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    /// Scaling applied to every feature
    pub scaler: ScalerType,
    /// Optional feature selection run after scaling
    pub feature_selection: Option<SelectionMethod>,
    /// Optional oversampling of training partitions; validation and test
    /// rows are never resampled
    pub oversampling: Option<OversamplingMethod>,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            scaler: ScalerType::MinMax,
            feature_selection: None,
            oversampling: None,
        }
    }
}

impl PreprocessingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scaler(mut self, scaler: ScalerType) -> Self {
        self.scaler = scaler;
        self
    }

    pub fn with_feature_selection(mut self, method: SelectionMethod) -> Self {
        self.feature_selection = Some(method);
        self
    }

    pub fn with_oversampling(mut self, method: OversamplingMethod) -> Self {
        self.oversampling = Some(method);
        self
    }

    /// Every combination of the given selection and oversampling choices on
    /// top of this config's scaler, selection varying slowest
    pub fn combinations(
        &self,
        selections: &[Option<SelectionMethod>],
        oversamplers: &[Option<OversamplingMethod>],
    ) -> Vec<PreprocessingConfig> {
        selections
            .iter()
            .flat_map(|selection| {
                oversamplers.iter().map(move |oversampling| PreprocessingConfig {
                    scaler: self.scaler,
                    feature_selection: selection.clone(),
                    oversampling: oversampling.clone(),
                })
            })
            .collect()
    }

    /// Label used when several preprocessing variants compete in a search
    pub fn label(&self) -> String {
        let scaler = match self.scaler {
            ScalerType::Standard => "standard",
            ScalerType::MinMax => "minmax",
            ScalerType::None => "none",
        };
        let mut label = scaler.to_string();
        if let Some(method) = &self.feature_selection {
            label.push('+');
            label.push_str(method.name());
        }
        if let Some(method) = &self.oversampling {
            label.push('+');
            label.push_str(method.name());
        }
        label
    }
}
