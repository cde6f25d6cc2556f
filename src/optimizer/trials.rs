//! Trial records, studies and the budgeted trial search

use super::objective::{best_index, evaluate, run_jobs};
use super::optimizer::{HyperparamSearch, SearchOutcome};
use super::params::{ParamSet, ParamValue};
use super::search_space::SearchSpace;
use crate::dataset::TrainingData;
use crate::error::{CvError, Result};
use crate::preprocessing::PreprocessingConfig;
use crate::training::{FittedModel, ModelAdapter};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Parameter key holding the sampled model name in a joint study
pub const MODEL_KEY: &str = "model";
/// Parameter key holding the sampled preprocessing variant in a joint study
pub const PREPROCESSING_KEY: &str = "preprocessing";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialStatus {
    Complete,
    Failed,
}

/// One evaluated parameter set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub number: usize,
    pub params: ParamSet,
    /// Mean validation AUC; absent for failed trials
    pub score: Option<f64>,
    pub status: TrialStatus,
    /// Failure reason
    pub error: Option<String>,
}

impl Trial {
    fn from_result(number: usize, params: ParamSet, result: Result<f64>) -> Self {
        match result {
            Ok(score) => Self {
                number,
                params,
                score: Some(score),
                status: TrialStatus::Complete,
                error: None,
            },
            Err(e) => Self {
                number,
                params,
                score: None,
                status: TrialStatus::Failed,
                error: Some(e.to_string()),
            },
        }
    }
}

/// All trials of one search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Study {
    pub trials: Vec<Trial>,
}

impl Study {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_trial(&mut self, trial: Trial) {
        if trial.status == TrialStatus::Failed {
            warn!(
                trial = trial.number,
                params = %trial.params,
                error = trial.error.as_deref().unwrap_or(""),
                "Trial failed"
            );
        }
        self.trials.push(trial);
    }

    /// Highest-scoring complete trial; the earliest wins ties
    pub fn best_trial(&self) -> Option<&Trial> {
        let scores: Vec<Option<f64>> = self.trials.iter().map(|t| t.score).collect();
        best_index(&scores).map(|i| &self.trials[i])
    }

    pub fn n_complete(&self) -> usize {
        self.trials.iter().filter(|t| t.status == TrialStatus::Complete).count()
    }

    pub fn n_failed(&self) -> usize {
        self.trials.len() - self.n_complete()
    }
}

/// Evaluate pre-built candidates and collect them into a study
pub(crate) fn run_study(
    model: &dyn ModelAdapter,
    candidates: Vec<ParamSet>,
    data: &TrainingData,
    n_jobs: usize,
    fold_preprocessing: Option<&PreprocessingConfig>,
) -> Result<Study> {
    let results = run_jobs(&candidates, n_jobs, |params| {
        evaluate(model, params, data, fold_preprocessing)
    })?;
    let mut study = Study::new();
    for (number, (params, result)) in candidates.into_iter().zip(results).enumerate() {
        study.add_trial(Trial::from_result(number, params, result));
    }
    Ok(study)
}

/// Refit the best trial's configuration on the full training partition,
/// through the same per-fold preprocessing the trials were scored with
pub(crate) fn finish(
    model: &dyn ModelAdapter,
    study: Study,
    data: &TrainingData,
    fold_preprocessing: Option<&PreprocessingConfig>,
) -> Result<SearchOutcome> {
    let best = study
        .best_trial()
        .cloned()
        .ok_or_else(|| CvError::SearchExhausted(model.name().to_string()))?;
    let best_score = best.score.unwrap_or(f64::NAN);

    let mut candidate = model.clone_box();
    candidate.set_params(&best.params)?;
    let fitted = FittedModel::fit(&*candidate, data.train(), fold_preprocessing)?;

    info!(
        model = %model.name(),
        score = best_score,
        params = %best.params,
        n_failed = study.n_failed(),
        "Search finished"
    );
    Ok(SearchOutcome {
        best_params: best.params,
        best_score,
        model: Some(fitted),
        trials: study.trials,
    })
}

/// Budgeted random search with a seeded sampler.
///
/// Parameter sets are drawn up front so the evaluated configurations do not
/// depend on the number of workers.
#[derive(Debug, Clone)]
pub struct TrialSearch {
    n_trials: usize,
    seed: u64,
    n_jobs: usize,
    space: Option<SearchSpace>,
    fold_preprocessing: Option<PreprocessingConfig>,
}

impl TrialSearch {
    pub fn new(n_trials: usize) -> Self {
        Self {
            n_trials,
            seed: 42,
            n_jobs: 1,
            space: None,
            fold_preprocessing: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = n_jobs.max(1);
        self
    }

    /// Replace the model family's space
    pub fn with_space(mut self, space: SearchSpace) -> Self {
        self.space = Some(space);
        self
    }

    pub fn with_fold_preprocessing(mut self, config: PreprocessingConfig) -> Self {
        self.fold_preprocessing = Some(config);
        self
    }

    fn space_for(&self, model: &dyn ModelAdapter) -> Result<SearchSpace> {
        let space = match &self.space {
            Some(space) => space.clone(),
            None => model.search_space()?,
        };
        space.validate()?;
        Ok(space)
    }

    /// Joint study over several models and preprocessing variants.
    ///
    /// Every trial samples a model (recorded under `"model"`), a variant
    /// (under `"preprocessing"`, only when there is more than one) and then
    /// that model's parameters. The returned parameters include both keys.
    ///
    /// `data` holds raw partitions. Each variant is fitted once on the
    /// training partition, or on every fold-train partition when per-fold
    /// preprocessing is enabled. The returned model predicts raw partitions.
    pub fn search_models(
        &self,
        models: &[Box<dyn ModelAdapter>],
        data: &TrainingData,
        variants: &[PreprocessingConfig],
    ) -> Result<SearchOutcome> {
        if models.is_empty() || variants.is_empty() {
            return Err(CvError::InvalidConfig(
                "a joint study needs at least one model and one preprocessing variant".to_string(),
            ));
        }
        let spaces = models
            .iter()
            .map(|m| self.space_for(m.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let per_fold = self.fold_preprocessing.is_some();
        let prepared = if per_fold {
            vec![None; variants.len()]
        } else {
            variants
                .iter()
                .map(|config| data.preprocess(config).map(Some))
                .collect::<Result<Vec<_>>>()?
        };
        // Partitions and per-fold config each variant is scored on
        let inputs: Vec<(&TrainingData, Option<&PreprocessingConfig>)> = prepared
            .iter()
            .zip(variants)
            .map(|(preprocessed, config)| match preprocessed {
                Some(preprocessed) => (preprocessed, None),
                None => (data, Some(config)),
            })
            .collect();

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed);
        let jobs: Vec<(usize, usize, ParamSet)> = (0..self.n_trials)
            .map(|_| {
                let m = rng.gen_range(0..models.len());
                let v = rng.gen_range(0..variants.len());
                (m, v, spaces[m].sample(&mut rng))
            })
            .collect();
        info!(
            n_trials = self.n_trials,
            n_models = models.len(),
            n_variants = variants.len(),
            per_fold,
            "Starting joint study"
        );

        let results = run_jobs(&jobs, self.n_jobs, |(m, v, params)| {
            let (variant_data, fold_preprocessing) = inputs[*v];
            evaluate(models[*m].as_ref(), params, variant_data, fold_preprocessing)
        })?;

        let mut study = Study::new();
        for (number, ((m, v, params), result)) in jobs.iter().zip(results).enumerate() {
            let mut recorded = params.clone().with(MODEL_KEY, models[*m].name());
            if variants.len() > 1 {
                recorded.insert(PREPROCESSING_KEY, variants[*v].label());
            }
            study.add_trial(Trial::from_result(number, recorded, result));
        }

        let best = study
            .best_trial()
            .cloned()
            .ok_or_else(|| CvError::SearchExhausted("joint study".to_string()))?;
        let (m, v, params) = &jobs[best.number];
        let mut candidate = models[*m].clone_box();
        candidate.set_params(params)?;
        let (variant_data, fold_preprocessing) = inputs[*v];
        let mut fitted = FittedModel::fit(&*candidate, variant_data.train(), fold_preprocessing)?;
        if fold_preprocessing.is_none() {
            fitted = fitted.with_preprocessor(variant_data.preprocessor().cloned());
        }

        info!(
            model = %models[*m].name(),
            variant = %variants[*v].label(),
            score = best.score.unwrap_or(f64::NAN),
            n_failed = study.n_failed(),
            "Joint study finished"
        );
        Ok(SearchOutcome {
            best_params: best.params,
            best_score: best.score.unwrap_or(f64::NAN),
            model: Some(fitted),
            trials: study.trials,
        })
    }
}

impl HyperparamSearch for TrialSearch {
    fn search(&self, model: &dyn ModelAdapter, data: &TrainingData) -> Result<SearchOutcome> {
        let space = self.space_for(model)?;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed);
        let candidates: Vec<ParamSet> = (0..self.n_trials).map(|_| space.sample(&mut rng)).collect();
        info!(model = %model.name(), n_trials = self.n_trials, "Starting trial search");

        let study = run_study(model, candidates, data, self.n_jobs, self.fold_preprocessing.as_ref())?;
        finish(model, study, data, self.fold_preprocessing.as_ref())
    }
}

/// Model parameters of a joint-study result, without the study keys
pub fn model_params(params: &ParamSet) -> ParamSet {
    params
        .iter()
        .filter(|(name, _)| name.as_str() != MODEL_KEY && name.as_str() != PREPROCESSING_KEY)
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Model name recorded in a joint-study result
pub fn sampled_model(params: &ParamSet) -> Option<&str> {
    params.get(MODEL_KEY).and_then(ParamValue::as_str)
}
