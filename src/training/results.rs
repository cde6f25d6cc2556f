//! Per-row prediction table

use crate::dataset::{MetaTable, TrainingData};
use crate::error::{CvError, Result};
use crate::utils::{sanitize_file_name, write_csv};
use ndarray::Array1;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::info;

/// Value of prediction cells never written, and of `cv_split` for test rows
pub const UNPREDICTED: f64 = -1.0;

#[derive(Debug, Clone)]
struct ModelColumns {
    name: String,
    pred: Vec<f64>,
    proba: Vec<f64>,
}

/// One row per source row: metadata, `test`, `cv_split` and per model
/// `<name>_pred` / `<name>_pred_proba`
#[derive(Debug, Clone)]
pub struct ResultTable {
    meta: MetaTable,
    test: Vec<i64>,
    cv_split: Vec<i64>,
    models: Vec<ModelColumns>,
}

impl ResultTable {
    pub fn new(meta: MetaTable) -> Self {
        let n = meta.n_rows();
        Self {
            meta,
            test: vec![0; n],
            cv_split: vec![-1; n],
            models: Vec::new(),
        }
    }

    /// Table with `test` and `cv_split` filled from materialised partitions
    pub fn for_training_data(meta: MetaTable, data: &TrainingData) -> Result<Self> {
        let mut table = Self::new(meta);
        table.mark_test(data.test().row_keys())?;
        for fold in data.folds() {
            table.mark_fold(fold.index, fold.val.row_keys())?;
        }
        Ok(table)
    }

    pub fn n_rows(&self) -> usize {
        self.test.len()
    }

    pub fn test(&self) -> &[i64] {
        &self.test
    }

    pub fn cv_split(&self) -> &[i64] {
        &self.cv_split
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|m| m.name.as_str())
    }

    /// (labels, probabilities) written for a model
    pub fn predictions(&self, model: &str) -> Option<(&[f64], &[f64])> {
        self.models
            .iter()
            .find(|m| m.name == model)
            .map(|m| (m.pred.as_slice(), m.proba.as_slice()))
    }

    pub fn mark_test(&mut self, rows: &[usize]) -> Result<()> {
        self.check_rows(rows)?;
        for &row in rows {
            self.test[row] = 1;
        }
        Ok(())
    }

    pub fn mark_fold(&mut self, fold: usize, rows: &[usize]) -> Result<()> {
        self.check_rows(rows)?;
        for &row in rows {
            self.cv_split[row] = fold as i64;
        }
        Ok(())
    }

    /// Add sentinel-filled prediction columns for a model.
    ///
    /// Names that only differ in characters the parameter cache replaces in
    /// file names are rejected as duplicates.
    pub fn add_model(&mut self, name: &str) -> Result<()> {
        let file_name = sanitize_file_name(name);
        if let Some(existing) = self.models.iter().find(|m| sanitize_file_name(&m.name) == file_name) {
            return Err(CvError::InvalidConfig(if existing.name == name {
                format!("duplicate model name {}", name)
            } else {
                format!(
                    "model names {} and {} share the cache file {}.json",
                    existing.name, name, file_name
                )
            }));
        }
        self.models.push(ModelColumns {
            name: name.to_string(),
            pred: vec![UNPREDICTED; self.n_rows()],
            proba: vec![UNPREDICTED; self.n_rows()],
        });
        Ok(())
    }

    /// Write predictions into the rows with the given row keys
    pub fn write_predictions(
        &mut self,
        model: &str,
        rows: &[usize],
        labels: &Array1<f64>,
        proba: &Array1<f64>,
    ) -> Result<()> {
        self.check_rows(rows)?;
        if labels.len() != rows.len() || proba.len() != rows.len() {
            return Err(CvError::ShapeError {
                expected: format!("{} predictions", rows.len()),
                actual: format!("{} labels, {} probabilities", labels.len(), proba.len()),
            });
        }
        let columns = self
            .models
            .iter_mut()
            .find(|m| m.name == model)
            .ok_or_else(|| CvError::InvalidConfig(format!("model {} has no result columns", model)))?;
        for ((&row, &label), &p) in rows.iter().zip(labels).zip(proba) {
            columns.pred[row] = label;
            columns.proba[row] = p;
        }
        Ok(())
    }

    fn check_rows(&self, rows: &[usize]) -> Result<()> {
        match rows.iter().find(|&&r| r >= self.n_rows()) {
            Some(row) => Err(CvError::ShapeError {
                expected: format!("row keys below {}", self.n_rows()),
                actual: format!("row key {}", row),
            }),
            None => Ok(()),
        }
    }

    /// Columns in order: metadata, test, cv_split, then per model pred and pred_proba
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns: Vec<Column> = self
            .meta
            .columns()
            .iter()
            .map(|(name, values)| Series::new(name.as_str().into(), values.clone()).into())
            .collect();
        columns.push(Series::new("test".into(), self.test.clone()).into());
        columns.push(Series::new("cv_split".into(), self.cv_split.clone()).into());
        for model in &self.models {
            columns.push(Series::new(format!("{}_pred", model.name).into(), model.pred.clone()).into());
            columns.push(
                Series::new(format!("{}_pred_proba", model.name).into(), model.proba.clone()).into(),
            );
        }
        Ok(DataFrame::new(columns)?)
    }

    /// Persist as `predictions_<task_name>.csv` in `dir`
    pub fn save(&self, dir: impl AsRef<Path>, task_name: &str) -> Result<PathBuf> {
        let path = dir.as_ref().join(format!("predictions_{}.csv", task_name));
        let mut df = self.to_dataframe()?;
        write_csv(&mut df, &path)?;
        info!(path = %path.display(), rows = self.n_rows(), "Saved predictions");
        Ok(path)
    }
}
