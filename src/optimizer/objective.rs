//! Cross-validated objective shared by the search strategies

use super::params::ParamSet;
use crate::dataset::{CvIterator, TrainingData};
use crate::error::{CvError, Result};
use crate::preprocessing::PreprocessingConfig;
use crate::training::{metrics::roc_auc, ModelAdapter};
use rayon::prelude::*;
use tracing::debug;

/// Mean validation AUC of `model` refitted on each fold
pub fn cross_validate(model: &dyn ModelAdapter, folds: CvIterator<'_>) -> Result<f64> {
    let mut scores = Vec::with_capacity(folds.len());
    for fold in folds {
        let fold = fold?;
        let mut fold_model = model.clone_box();
        fold_model.fit(fold.train.x(), fold.train.y())?;
        let proba = fold_model.predict_proba(fold.val.x())?;
        scores.push(roc_auc(fold.val.y(), &proba)?);
    }
    if scores.is_empty() {
        return Err(CvError::InvalidSplit("no folds to cross-validate on".to_string()));
    }
    Ok(scores.iter().sum::<f64>() / scores.len() as f64)
}

/// Fold iterator for a search, honouring the per-fold preprocessing mode
pub(crate) fn folds<'a>(data: &'a TrainingData, fold_preprocessing: Option<&PreprocessingConfig>) -> CvIterator<'a> {
    match fold_preprocessing {
        Some(config) => data.cv_folds().with_fold_preprocessing(config.clone()),
        None => data.cv_folds(),
    }
}

/// Score one parameter set; a non-finite score counts as a failure
pub(crate) fn evaluate(
    model: &dyn ModelAdapter,
    params: &ParamSet,
    data: &TrainingData,
    fold_preprocessing: Option<&PreprocessingConfig>,
) -> Result<f64> {
    let mut candidate = model.clone_box();
    candidate.set_params(params)?;
    let score = cross_validate(&*candidate, folds(data, fold_preprocessing))?;
    if !score.is_finite() {
        return Err(CvError::MetricUndefined(format!("score {} for {}", score, params)));
    }
    debug!(model = %model.name(), %params, score, "Evaluated candidate");
    Ok(score)
}

/// Evaluate every job, sequentially or on a pool of `n_jobs` workers.
/// Results keep the input order.
pub(crate) fn run_jobs<T, F>(jobs: &[T], n_jobs: usize, eval: F) -> Result<Vec<Result<f64>>>
where
    T: Sync,
    F: Fn(&T) -> Result<f64> + Sync + Send,
{
    if n_jobs <= 1 || jobs.len() <= 1 {
        return Ok(jobs.iter().map(&eval).collect());
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n_jobs)
        .build()
        .map_err(|e| CvError::InvalidConfig(format!("Thread pool error: {}", e)))?;
    Ok(pool.install(|| jobs.par_iter().map(&eval).collect()))
}

/// Index of the highest score; the earliest index wins ties
pub(crate) fn best_index(scores: &[Option<f64>]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, score) in scores.iter().enumerate() {
        if let Some(s) = score {
            if best.map_or(true, |(_, b)| *s > b) {
                best = Some((i, *s));
            }
        }
    }
    best.map(|(i, _)| i)
}
