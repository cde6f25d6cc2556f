//! Column roles of a source table

use serde::{Deserialize, Serialize};

/// Which columns of a table hold the target, ids, features and metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    /// Binary class label column
    pub target: String,
    /// Case identifier column
    pub id_column: String,
    /// Feature columns; every remaining numeric column when unset
    #[serde(default)]
    pub features: Option<Vec<String>>,
    /// Columns carried into the result table
    #[serde(default)]
    pub meta_columns: Vec<String>,
    /// Grouping column for splitting; the id column when unset
    #[serde(default)]
    pub split_on: Option<String>,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            target: "label".to_string(),
            id_column: "id".to_string(),
            features: None,
            meta_columns: Vec::new(),
            split_on: None,
        }
    }
}

impl ColumnConfig {
    pub fn new(target: impl Into<String>, id_column: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            id_column: id_column.into(),
            ..Default::default()
        }
    }

    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.features = Some(features);
        self
    }

    pub fn with_meta_columns(mut self, columns: Vec<String>) -> Self {
        self.meta_columns = columns;
        self
    }

    pub fn with_split_on(mut self, column: impl Into<String>) -> Self {
        self.split_on = Some(column.into());
        self
    }

    /// Column whose values group rows for splitting
    pub fn grouping_column(&self) -> &str {
        self.split_on.as_deref().unwrap_or(&self.id_column)
    }

    /// Columns that can never be features
    pub(crate) fn is_reserved(&self, column: &str) -> bool {
        column == self.target
            || column == self.id_column
            || self.split_on.as_deref() == Some(column)
            || self.meta_columns.iter().any(|c| c == column)
    }
}
