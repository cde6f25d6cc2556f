//! Materialised partitions of a dataset

use super::cv::CvIterator;
use super::table::MetaTable;
use crate::error::{CvError, Result};
use crate::preprocessing::{PreprocessingConfig, Preprocessor, SyntheticRows};
use crate::splits::CaseId;
use ndarray::{concatenate, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Which part of the split a partition holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionRole {
    Train,
    Test,
    FoldTrain(usize),
    FoldValidation(usize),
}

impl PartitionRole {
    /// Only training partitions may be used to fit preprocessing state
    pub fn is_training(&self) -> bool {
        matches!(self, PartitionRole::Train | PartitionRole::FoldTrain(_))
    }
}

impl fmt::Display for PartitionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionRole::Train => write!(f, "train"),
            PartitionRole::Test => write!(f, "test"),
            PartitionRole::FoldTrain(i) => write!(f, "fold_{} train", i),
            PartitionRole::FoldValidation(i) => write!(f, "fold_{} validation", i),
        }
    }
}

/// Features, labels and metadata of one partition.
///
/// Owns its data: transforming one partition never touches another or the
/// source table.
#[derive(Debug, Clone)]
pub struct Partition {
    role: PartitionRole,
    ids: Vec<CaseId>,
    row_keys: Vec<usize>,
    x: Array2<f64>,
    y: Array1<f64>,
    feature_names: Vec<String>,
    meta: MetaTable,
}

impl Partition {
    pub fn new(
        role: PartitionRole,
        ids: Vec<CaseId>,
        row_keys: Vec<usize>,
        x: Array2<f64>,
        y: Array1<f64>,
        feature_names: Vec<String>,
    ) -> Result<Self> {
        let n = x.nrows();
        if ids.len() != n || row_keys.len() != n || y.len() != n {
            return Err(CvError::ShapeError {
                expected: format!("{} rows in ids, row keys and labels", n),
                actual: format!(
                    "{} ids, {} row keys, {} labels",
                    ids.len(),
                    row_keys.len(),
                    y.len()
                ),
            });
        }
        if feature_names.len() != x.ncols() {
            return Err(CvError::ShapeError {
                expected: format!("{} feature names", x.ncols()),
                actual: format!("{} feature names", feature_names.len()),
            });
        }

        Ok(Self {
            role,
            ids,
            row_keys,
            x,
            y,
            feature_names,
            meta: MetaTable::empty(n),
        })
    }

    pub fn with_meta(mut self, meta: MetaTable) -> Result<Self> {
        if meta.n_rows() != self.n_samples() {
            return Err(CvError::ShapeError {
                expected: format!("{} metadata rows", self.n_samples()),
                actual: format!("{} metadata rows", meta.n_rows()),
            });
        }
        self.meta = meta;
        Ok(self)
    }

    /// Same rows with a replaced feature matrix
    pub(crate) fn with_features(&self, x: Array2<f64>, feature_names: Vec<String>) -> Result<Self> {
        if x.nrows() != self.n_samples() {
            return Err(CvError::ShapeError {
                expected: format!("{} rows", self.n_samples()),
                actual: format!("{} rows", x.nrows()),
            });
        }
        if x.ncols() != feature_names.len() {
            return Err(CvError::ShapeError {
                expected: format!("{} feature names", x.ncols()),
                actual: format!("{} feature names", feature_names.len()),
            });
        }
        Ok(Self {
            role: self.role,
            ids: self.ids.clone(),
            row_keys: self.row_keys.clone(),
            x,
            y: self.y.clone(),
            feature_names,
            meta: self.meta.clone(),
        })
    }

    /// Append oversampled rows. Each synthetic row carries the id, row key
    /// and metadata of the row it was interpolated from.
    pub(crate) fn with_synthetic_rows(self, synthetic: SyntheticRows) -> Result<Self> {
        if synthetic.is_empty() {
            return Ok(self);
        }
        if let Some(&source) = synthetic.sources.iter().find(|&&s| s >= self.n_samples()) {
            return Err(CvError::ShapeError {
                expected: format!("source rows below {}", self.n_samples()),
                actual: format!("source row {}", source),
            });
        }
        let x = concatenate(Axis(0), &[self.x.view(), synthetic.x.view()])?;
        let y = concatenate(Axis(0), &[self.y.view(), synthetic.y.view()])?;
        let rows: Vec<usize> = (0..self.n_samples()).chain(synthetic.sources.iter().copied()).collect();

        Ok(Self {
            role: self.role,
            ids: rows.iter().map(|&r| self.ids[r].clone()).collect(),
            row_keys: rows.iter().map(|&r| self.row_keys[r]).collect(),
            x,
            y,
            feature_names: self.feature_names,
            meta: self.meta.select_rows(&rows),
        })
    }

    pub fn role(&self) -> PartitionRole {
        self.role
    }

    pub fn ids(&self) -> &[CaseId] {
        &self.ids
    }

    /// Stable key of each row in the source table
    pub fn row_keys(&self) -> &[usize] {
        &self.row_keys
    }

    pub fn x(&self) -> &Array2<f64> {
        &self.x
    }

    pub fn y(&self) -> &Array1<f64> {
        &self.y
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn meta(&self) -> &MetaTable {
        &self.meta
    }

    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.n_samples() == 0
    }
}

/// Training and validation partitions of one fold
#[derive(Debug, Clone)]
pub struct FoldPair {
    pub index: usize,
    pub train: Partition,
    pub val: Partition,
}

/// Train, test and per-fold partitions produced by `Dataset::apply_split`
#[derive(Debug, Clone)]
pub struct TrainingData {
    train: Partition,
    test: Partition,
    folds: Vec<FoldPair>,
    preprocessor: Option<Preprocessor>,
}

impl TrainingData {
    pub(crate) fn new(train: Partition, test: Partition, folds: Vec<FoldPair>) -> Self {
        Self {
            train,
            test,
            folds,
            preprocessor: None,
        }
    }

    pub fn train(&self) -> &Partition {
        &self.train
    }

    pub fn test(&self) -> &Partition {
        &self.test
    }

    pub fn folds(&self) -> &[FoldPair] {
        &self.folds
    }

    pub fn n_folds(&self) -> usize {
        self.folds.len()
    }

    /// Fold pairs in fold order. Each call starts a fresh pass.
    pub fn cv_folds(&self) -> CvIterator<'_> {
        CvIterator::new(&self.folds)
    }

    /// The preprocessor applied to these partitions, if any
    pub fn preprocessor(&self) -> Option<&Preprocessor> {
        self.preprocessor.as_ref()
    }

    pub fn is_preprocessed(&self) -> bool {
        self.preprocessor.is_some()
    }

    /// Feature names left after preprocessing
    pub fn selected_features(&self) -> Result<&[String]> {
        self.preprocessor
            .as_ref()
            .and_then(|p| p.selected_features())
            .ok_or(CvError::UnfittedPreprocessor)
    }

    /// Fit preprocessing on the training partition only
    pub fn fit_preprocess(&self, config: &PreprocessingConfig) -> Result<Preprocessor> {
        if self.preprocessor.is_some() {
            return Err(CvError::PreprocessorAlreadyFitted);
        }
        Preprocessor::new(config.clone()).fit(&self.train)
    }

    /// Apply a fitted preprocessor to every partition
    pub fn transform_with(&self, preprocessor: &Preprocessor) -> Result<TrainingData> {
        if self.preprocessor.is_some() {
            return Err(CvError::PreprocessorAlreadyFitted);
        }
        let folds = self
            .folds
            .iter()
            .map(|fold| {
                Ok(FoldPair {
                    index: fold.index,
                    train: preprocessor.transform(&fold.train)?,
                    val: preprocessor.transform(&fold.val)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TrainingData {
            train: preprocessor.transform(&self.train)?,
            test: preprocessor.transform(&self.test)?,
            folds,
            preprocessor: Some(preprocessor.clone()),
        })
    }

    /// Fit once on train, then transform train, test and all folds
    pub fn preprocess(&self, config: &PreprocessingConfig) -> Result<TrainingData> {
        let preprocessor = self.fit_preprocess(config)?;
        let data = self.transform_with(&preprocessor)?;
        info!(
            preprocessing = %config.label(),
            n_features = data.train.n_features(),
            "Preprocessed all partitions"
        );
        Ok(data)
    }
}

impl fmt::Display for TrainingData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TrainingData with {} training observations, {} test observations, {} features, {} folds and {} meta columns.",
            self.train.n_samples(),
            self.test.n_samples(),
            self.train.n_features(),
            self.folds.len(),
            self.train.meta().n_columns()
        )
    }
}
