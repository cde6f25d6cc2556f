//! Fold iteration

use super::partition::FoldPair;
use crate::error::Result;
use crate::preprocessing::{PreprocessingConfig, Preprocessor};
use std::borrow::Cow;

/// Iterator over cross-validation folds in fold order.
///
/// Yields borrowed fold pairs unless per-fold preprocessing is enabled, in
/// which case each fold gets its own preprocessor fitted on the fold's
/// training partition.
#[derive(Debug, Clone)]
pub struct CvIterator<'a> {
    folds: &'a [FoldPair],
    next: usize,
    per_fold: Option<PreprocessingConfig>,
}

impl<'a> CvIterator<'a> {
    pub(crate) fn new(folds: &'a [FoldPair]) -> Self {
        Self {
            folds,
            next: 0,
            per_fold: None,
        }
    }

    pub fn with_fold_preprocessing(mut self, config: PreprocessingConfig) -> Self {
        self.per_fold = Some(config);
        self
    }

    fn preprocess_fold(fold: &FoldPair, config: &PreprocessingConfig) -> Result<FoldPair> {
        let preprocessor = Preprocessor::new(config.clone()).fit(&fold.train)?;
        Ok(FoldPair {
            index: fold.index,
            train: preprocessor.transform(&fold.train)?,
            val: preprocessor.transform(&fold.val)?,
        })
    }
}

impl<'a> Iterator for CvIterator<'a> {
    type Item = Result<Cow<'a, FoldPair>>;

    fn next(&mut self) -> Option<Self::Item> {
        let fold = self.folds.get(self.next)?;
        self.next += 1;
        Some(match &self.per_fold {
            Some(config) => Self::preprocess_fold(fold, config).map(Cow::Owned),
            None => Ok(Cow::Borrowed(fold)),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.folds.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CvIterator<'_> {}
