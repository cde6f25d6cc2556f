//! Source table: features, labels, ids and metadata per row

use super::config::ColumnConfig;
use super::partition::{FoldPair, Partition, PartitionRole, TrainingData};
use crate::error::{CvError, Result};
use crate::preprocessing::{PreprocessingConfig, Preprocessor};
use crate::splits::{CaseId, SplitAssignment, SplitConfig, SplitStore};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Metadata columns kept as text and carried into the result table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaTable {
    n_rows: usize,
    columns: Vec<(String, Vec<String>)>,
}

impl MetaTable {
    /// A table with rows but no columns
    pub fn empty(n_rows: usize) -> Self {
        Self {
            n_rows,
            columns: Vec::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, values: Vec<String>) -> Result<Self> {
        let name = name.into();
        if values.len() != self.n_rows {
            return Err(CvError::ShapeError {
                expected: format!("{} values in column {}", self.n_rows, name),
                actual: format!("{} values", values.len()),
            });
        }
        if self.column(&name).is_some() {
            return Err(CvError::DataError(format!("duplicate metadata column {}", name)));
        }
        self.columns.push((name, values));
        Ok(self)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&[String]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn columns(&self) -> &[(String, Vec<String>)] {
        &self.columns
    }

    pub(crate) fn select_rows(&self, rows: &[usize]) -> MetaTable {
        MetaTable {
            n_rows: rows.len(),
            columns: self
                .columns
                .iter()
                .map(|(name, values)| {
                    (name.clone(), rows.iter().map(|&r| values[r].clone()).collect())
                })
                .collect(),
        }
    }
}

/// Immutable source table of case records
#[derive(Debug, Clone)]
pub struct Dataset {
    ids: Vec<CaseId>,
    x: Array2<f64>,
    labels: Vec<i64>,
    feature_names: Vec<String>,
    meta: MetaTable,
}

impl Dataset {
    /// Build from in-memory data. `ids` are the grouping ids used for
    /// splitting, one per row.
    pub fn new(
        ids: Vec<CaseId>,
        x: Array2<f64>,
        feature_names: Vec<String>,
        labels: Vec<i64>,
        meta: MetaTable,
    ) -> Result<Self> {
        let n = x.nrows();
        if ids.len() != n || labels.len() != n || meta.n_rows() != n {
            return Err(CvError::ShapeError {
                expected: format!("{} rows", n),
                actual: format!(
                    "{} ids, {} labels, {} metadata rows",
                    ids.len(),
                    labels.len(),
                    meta.n_rows()
                ),
            });
        }
        if feature_names.len() != x.ncols() {
            return Err(CvError::ShapeError {
                expected: format!("{} feature names", x.ncols()),
                actual: format!("{} feature names", feature_names.len()),
            });
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(CvError::DataError("features contain NaN or infinite values".to_string()));
        }

        Ok(Self {
            ids,
            x,
            labels,
            feature_names,
            meta,
        })
    }

    /// Build from a polars frame.
    ///
    /// The id column is always the first metadata column. Without an explicit
    /// feature list every numeric column that is not the target, id, grouping
    /// or a metadata column becomes a feature.
    pub fn from_dataframe(df: &DataFrame, columns: &ColumnConfig) -> Result<Self> {
        let feature_names: Vec<String> = match &columns.features {
            Some(features) => features.clone(),
            None => df
                .get_columns()
                .iter()
                .filter(|c| c.dtype().is_primitive_numeric() && !columns.is_reserved(c.name().as_str()))
                .map(|c| c.name().to_string())
                .collect(),
        };
        if feature_names.is_empty() {
            return Err(CvError::DataError("no feature columns found".to_string()));
        }

        let labels = column_as_labels(df, &columns.target)?;
        let ids = column_as_text(df, columns.grouping_column())?
            .into_iter()
            .map(CaseId::new)
            .collect();

        let mut meta = MetaTable::empty(df.height())
            .with_column(columns.id_column.clone(), column_as_text(df, &columns.id_column)?)?;
        for name in columns.meta_columns.iter().filter(|c| **c != columns.id_column) {
            meta = meta.with_column(name.clone(), column_as_text(df, name)?)?;
        }

        let x = columns_to_array2(df, &feature_names)?;
        debug!(
            n_rows = df.height(),
            n_features = feature_names.len(),
            "Loaded dataset from frame"
        );
        Self::new(ids, x, feature_names, labels, meta)
    }

    pub fn n_rows(&self) -> usize {
        self.x.nrows()
    }

    pub fn ids(&self) -> &[CaseId] {
        &self.ids
    }

    pub fn labels(&self) -> &[i64] {
        &self.labels
    }

    pub fn x(&self) -> &Array2<f64> {
        &self.x
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn meta(&self) -> &MetaTable {
        &self.meta
    }

    /// Stratified test set and k folds over every id
    pub fn full_split(&self, config: &SplitConfig) -> Result<SplitAssignment> {
        let assignment = SplitStore::new(config.clone()).build(&self.ids, &self.labels)?;
        Ok(assignment.with_split_type("stratified test and stratified cross validation on training"))
    }

    /// Test set given by `column == test_value`, stratified k folds on the rest
    pub fn split_with_test_from_column(
        &self,
        column: &str,
        test_value: &str,
        config: &SplitConfig,
    ) -> Result<SplitAssignment> {
        let values = self
            .meta
            .column(column)
            .ok_or_else(|| CvError::ColumnNotFound(column.to_string()))?;
        let is_test: Vec<bool> = values.iter().map(|v| v == test_value).collect();

        let assignment = SplitStore::new(config.clone())
            .build_with_test_from_column(&self.ids, &self.labels, &is_test)?;
        Ok(assignment.with_split_type(format!(
            "predefined test as {} = {} and stratified cross validation on training",
            column, test_value
        )))
    }

    /// Materialise train, test and fold partitions from an assignment
    pub fn apply_split(&self, assignment: &SplitAssignment) -> Result<TrainingData> {
        let test_ids = assignment.test_ids();
        let (test_rows, train_rows): (Vec<usize>, Vec<usize>) =
            (0..self.n_rows()).partition(|&row| test_ids.contains(&self.ids[row]));

        let known = assignment.all_ids();
        let unassigned: BTreeSet<&CaseId> =
            self.ids.iter().filter(|id| !known.contains(*id)).collect();
        if !unassigned.is_empty() {
            warn!(
                n_ids = unassigned.len(),
                "Ids missing from the split are used for training but never validated"
            );
        }
        if test_rows.is_empty() {
            warn!("Split assigns no rows of this dataset to the test set");
        }

        let folds = assignment
            .folds()
            .iter()
            .enumerate()
            .map(|(index, fold)| {
                let train = self.rows_where(|id| fold.train.contains(id));
                let val = self.rows_where(|id| fold.val.contains(id));
                if train.is_empty() || val.is_empty() {
                    return Err(CvError::InvalidSplit(format!(
                        "fold_{} has no matching rows in this dataset",
                        index
                    )));
                }
                Ok(FoldPair {
                    index,
                    train: self.partition(PartitionRole::FoldTrain(index), &train)?,
                    val: self.partition(PartitionRole::FoldValidation(index), &val)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let data = TrainingData::new(
            self.partition(PartitionRole::Train, &train_rows)?,
            self.partition(PartitionRole::Test, &test_rows)?,
            folds,
        );
        info!("{}", data);
        Ok(data)
    }

    /// Fit preprocessing on a training partition of this dataset
    pub fn fit_preprocess(&self, train: &Partition, config: &PreprocessingConfig) -> Result<Preprocessor> {
        self.check_features(train)?;
        Preprocessor::new(config.clone()).fit(train)
    }

    /// Transform a partition, returning a new one
    pub fn transform(&self, partition: &Partition, preprocessor: &Preprocessor) -> Result<Partition> {
        self.check_features(partition)?;
        preprocessor.transform(partition)
    }

    fn check_features(&self, partition: &Partition) -> Result<()> {
        if partition.feature_names() != self.feature_names.as_slice() {
            return Err(CvError::ShapeError {
                expected: format!("{} source features", self.feature_names.len()),
                actual: format!("{} features", partition.n_features()),
            });
        }
        Ok(())
    }

    fn rows_where(&self, keep: impl Fn(&CaseId) -> bool) -> Vec<usize> {
        self.ids
            .iter()
            .enumerate()
            .filter(|(_, id)| keep(id))
            .map(|(row, _)| row)
            .collect()
    }

    fn partition(&self, role: PartitionRole, rows: &[usize]) -> Result<Partition> {
        let x = self.x.select(Axis(0), rows);
        let y: Array1<f64> = rows.iter().map(|&r| self.labels[r] as f64).collect();
        let ids = rows.iter().map(|&r| self.ids[r].clone()).collect();
        Partition::new(role, ids, rows.to_vec(), x, y, self.feature_names.clone())?
            .with_meta(self.meta.select_rows(rows))
    }
}

fn column_as_text(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let column = df
        .column(name)
        .map_err(|_| CvError::ColumnNotFound(name.to_string()))?;
    let text = column.cast(&DataType::String)?;
    text.str()?
        .into_iter()
        .map(|v| {
            v.map(str::to_string)
                .ok_or_else(|| CvError::DataError(format!("column {} has missing values", name)))
        })
        .collect()
}

fn column_as_labels(df: &DataFrame, name: &str) -> Result<Vec<i64>> {
    let column = df
        .column(name)
        .map_err(|_| CvError::ColumnNotFound(name.to_string()))?;
    let values = column.cast(&DataType::Float64)?;
    values
        .f64()?
        .into_iter()
        .map(|v| match v {
            Some(v) if v.fract() == 0.0 => Ok(v as i64),
            Some(v) => Err(CvError::DataError(format!(
                "label column {} holds non-integer value {}",
                name, v
            ))),
            None => Err(CvError::DataError(format!("label column {} has missing values", name))),
        })
        .collect()
}

/// Extract named columns into a row-major matrix
fn columns_to_array2(df: &DataFrame, names: &[String]) -> Result<Array2<f64>> {
    let col_data: Vec<Vec<f64>> = names
        .iter()
        .map(|name| {
            let column = df
                .column(name)
                .map_err(|_| CvError::ColumnNotFound(name.clone()))?;
            let values = column.cast(&DataType::Float64)?;
            values
                .f64()?
                .into_iter()
                .map(|v| {
                    v.ok_or_else(|| CvError::DataError(format!("feature {} has missing values", name)))
                })
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<_>>()?;

    Ok(Array2::from_shape_fn((df.height(), names.len()), |(r, c)| col_data[c][r]))
}
