//! On-disk cache of tuned parameters, one JSON file per model

use super::params::ParamSet;
use crate::error::{CvError, Result};
use crate::utils::sanitize_file_name;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Result of looking up a model's cached parameters
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(ParamSet),
    Missing,
    /// The file exists but could not be read or parsed
    Corrupted(String),
}

#[derive(Debug, Clone)]
pub struct ParamCache {
    dir: PathBuf,
}

impl ParamCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, model: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_file_name(model)))
    }

    /// Write `params` for `model`, replacing any earlier record
    pub fn save_params(&self, model: &str, params: &ParamSet) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(model);
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, params)?;
        writer.flush()?;
        debug!(model, path = %path.display(), "Saved parameters");
        Ok(path)
    }

    pub fn load_params(&self, model: &str) -> CacheLookup {
        let path = self.path_for(model);
        if !path.exists() {
            return CacheLookup::Missing;
        }
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) => return CacheLookup::Corrupted(format!("{}: {}", path.display(), e)),
        };
        match serde_json::from_reader::<_, ParamSet>(BufReader::new(file)) {
            Ok(params) => CacheLookup::Hit(params),
            Err(e) => CacheLookup::Corrupted(format!("{}: {}", path.display(), e)),
        }
    }

    /// Cached parameters, or `CorruptedOrMissingCache`
    pub fn require(&self, model: &str) -> Result<ParamSet> {
        match self.load_params(model) {
            CacheLookup::Hit(params) => Ok(params),
            CacheLookup::Missing => Err(CvError::CorruptedOrMissingCache {
                model: model.to_string(),
                reason: format!("no file at {}", self.path_for(model).display()),
            }),
            CacheLookup::Corrupted(reason) => Err(CvError::CorruptedOrMissingCache {
                model: model.to_string(),
                reason,
            }),
        }
    }
}
