//! Split configuration

use crate::error::{CvError, Result};
use serde::{Deserialize, Serialize};

/// Parameters of a train/test + k-fold partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of ids held out as test set
    pub test_fraction: f64,
    /// Number of cross-validation folds on the training ids
    pub n_splits: usize,
    /// Seed for the shuffles
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            n_splits: 5,
            seed: 42,
        }
    }
}

impl SplitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    pub fn with_n_splits(mut self, n_splits: usize) -> Self {
        self.n_splits = n_splits;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(CvError::InvalidConfig(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.n_splits < 2 {
            return Err(CvError::InvalidConfig(
                "n_splits must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SplitConfig::default();
        assert_eq!(config.n_splits, 5);
        assert!((config.test_fraction - 0.2).abs() < 1e-12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        assert!(SplitConfig::new().with_test_fraction(0.0).validate().is_err());
        assert!(SplitConfig::new().with_test_fraction(1.0).validate().is_err());
        assert!(SplitConfig::new().with_n_splits(1).validate().is_err());
    }
}
