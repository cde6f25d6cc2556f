//! Partition assignment and its persisted document form

use crate::error::{CvError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Identifier of a case. Several table rows may share one id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CaseId(String);

impl CaseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CaseId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CaseId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<i64> for CaseId {
    fn from(v: i64) -> Self {
        Self(v.to_string())
    }
}

impl From<usize> for CaseId {
    fn from(v: usize) -> Self {
        Self(v.to_string())
    }
}

/// Split documents written by other tools may carry numeric ids.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
    UInt(u64),
}

impl<'de> Deserialize<'de> for CaseId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => CaseId(s),
            RawId::Int(v) => CaseId(v.to_string()),
            RawId::UInt(v) => CaseId(v.to_string()),
        })
    }
}

/// One cross-validation fold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: BTreeSet<CaseId>,
    pub val: BTreeSet<CaseId>,
}

/// Where a single id ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub is_test: bool,
    /// Fold whose validation set holds the id; `None` for test ids
    pub fold_index: Option<usize>,
}

/// Test ids plus per-fold train/validation ids.
///
/// Sets are ordered, so two assignments with the same ids compare equal
/// regardless of the row order they were built or loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitAssignment {
    test: BTreeSet<CaseId>,
    folds: Vec<Fold>,
    split_type: Option<String>,
}

impl SplitAssignment {
    /// Create an assignment, checking every partition invariant
    pub fn new(test: BTreeSet<CaseId>, folds: Vec<Fold>) -> Result<Self> {
        let assignment = Self {
            test,
            folds,
            split_type: None,
        };
        assignment.validate()?;
        Ok(assignment)
    }

    /// Attach a human readable description of how the split was made
    pub fn with_split_type(mut self, split_type: impl Into<String>) -> Self {
        self.split_type = Some(split_type.into());
        self
    }

    pub fn split_type(&self) -> Option<&str> {
        self.split_type.as_deref()
    }

    pub fn test_ids(&self) -> &BTreeSet<CaseId> {
        &self.test
    }

    pub fn folds(&self) -> &[Fold] {
        &self.folds
    }

    pub fn n_folds(&self) -> usize {
        self.folds.len()
    }

    /// Every id covered by the assignment
    pub fn all_ids(&self) -> BTreeSet<CaseId> {
        let mut ids = self.test.clone();
        for fold in &self.folds {
            ids.extend(fold.val.iter().cloned());
        }
        ids
    }

    /// Look up the assignment of a single id
    pub fn assignment(&self, id: &CaseId) -> Option<Assignment> {
        if self.test.contains(id) {
            return Some(Assignment {
                is_test: true,
                fold_index: None,
            });
        }
        self.folds
            .iter()
            .position(|f| f.val.contains(id))
            .map(|idx| Assignment {
                is_test: false,
                fold_index: Some(idx),
            })
    }

    /// Check the partition invariants.
    pub fn validate(&self) -> Result<()> {
        if self.folds.is_empty() {
            return Err(CvError::InvalidSplit("assignment has no folds".to_string()));
        }

        let mut seen_val: BTreeSet<&CaseId> = BTreeSet::new();
        for (idx, fold) in self.folds.iter().enumerate() {
            if let Some(id) = fold.val.iter().find(|id| self.test.contains(*id)) {
                return Err(CvError::InvalidSplit(format!(
                    "id {} is in the test set and in validation of fold {}",
                    id, idx
                )));
            }
            if let Some(id) = fold.train.iter().find(|id| self.test.contains(*id)) {
                return Err(CvError::InvalidSplit(format!(
                    "id {} is in the test set and in training of fold {}",
                    id, idx
                )));
            }
            if let Some(id) = fold.train.iter().find(|id| fold.val.contains(*id)) {
                return Err(CvError::InvalidSplit(format!(
                    "id {} is in both training and validation of fold {}",
                    id, idx
                )));
            }
            for id in &fold.val {
                if !seen_val.insert(id) {
                    return Err(CvError::InvalidSplit(format!(
                        "id {} appears in more than one validation fold",
                        id
                    )));
                }
            }
        }

        // Each fold must cover exactly the ids validated somewhere
        for (idx, fold) in self.folds.iter().enumerate() {
            let covered = fold.train.len() + fold.val.len();
            let all_known = fold
                .train
                .iter()
                .chain(fold.val.iter())
                .all(|id| seen_val.contains(id));
            if covered != seen_val.len() || !all_known {
                return Err(CvError::InvalidSplit(format!(
                    "fold {} does not cover the training ids exactly",
                    idx
                )));
            }
        }

        Ok(())
    }

    pub(crate) fn to_document(&self) -> SplitDocument {
        let train = self
            .folds
            .iter()
            .enumerate()
            .map(|(idx, fold)| {
                (
                    format!("fold_{}", idx),
                    (
                        fold.train.iter().cloned().collect(),
                        fold.val.iter().cloned().collect(),
                    ),
                )
            })
            .collect();

        SplitDocument {
            split_type: self.split_type.clone(),
            test: self.test.iter().cloned().collect(),
            train,
        }
    }

    pub(crate) fn from_document(doc: SplitDocument) -> Result<Self> {
        let mut indexed: Vec<(usize, Fold)> = Vec::with_capacity(doc.train.len());
        for (key, (train, val)) in doc.train {
            let idx = key
                .strip_prefix("fold_")
                .and_then(|s| s.parse::<usize>().ok())
                .ok_or_else(|| CvError::InvalidSplit(format!("unexpected fold key '{}'", key)))?;
            indexed.push((
                idx,
                Fold {
                    train: train.into_iter().collect(),
                    val: val.into_iter().collect(),
                },
            ));
        }

        // "fold_10" sorts before "fold_2" as a string
        indexed.sort_by_key(|(idx, _)| *idx);
        for (expected, (idx, _)) in indexed.iter().enumerate() {
            if *idx != expected {
                return Err(CvError::InvalidSplit(format!(
                    "fold indices are not contiguous: missing fold_{}",
                    expected
                )));
            }
        }

        let mut assignment = Self::new(
            doc.test.into_iter().collect(),
            indexed.into_iter().map(|(_, f)| f).collect(),
        )?;
        assignment.split_type = doc.split_type;
        Ok(assignment)
    }
}

/// On-disk form: `{"test": [...], "train": {"fold_<i>": [[train], [val]]}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SplitDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_type: Option<String>,
    pub test: Vec<CaseId>,
    pub train: BTreeMap<String, (Vec<CaseId>, Vec<CaseId>)>,
}
