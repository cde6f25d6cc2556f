//! Experiment configuration loaded from a JSON file

use crate::dataset::ColumnConfig;
use crate::error::Result;
use crate::training::TrainerConfig;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Everything one experiment needs: where the table is, which columns play
/// which role, and the run settings.
///
/// ```json
/// {
///   "data": "features.csv",
///   "columns": { "target": "label", "id_column": "patient_id" },
///   "task_name": "liver",
///   "split": { "test_fraction": 0.2, "n_splits": 5, "seed": 42 },
///   "search": { "strategy": "Trials", "n_trials": 50 }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Feature table (CSV or TSV)
    pub data: Option<PathBuf>,

    pub columns: ColumnConfig,

    #[serde(flatten)]
    pub trainer: TrainerConfig,
}

impl ExperimentConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.trainer.validate()
    }
}
