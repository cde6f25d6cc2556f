//! Run orchestration: split, preprocess, tune, cross-validate, persist

use super::config::TrainerConfig;
use super::metrics::{accuracy, roc_auc};
use super::model::{FittedModel, ModelAdapter};
use super::results::ResultTable;
use crate::dataset::{Dataset, TrainingData};
use crate::error::{CvError, Result};
use crate::optimizer::{HyperparamOptimizer, SearchOutcome, TrialSearch, TunedParams};
use crate::preprocessing::PreprocessingConfig;
use crate::splits::{SplitAssignment, SplitStore};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Progress of a run; each step moves it forward by one state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunState {
    Init,
    SplitReady,
    Preprocessed,
    ModelsDone,
    Persisted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Init => "init",
            RunState::SplitReady => "split ready",
            RunState::Preprocessed => "preprocessed",
            RunState::ModelsDone => "models done",
            RunState::Persisted => "persisted",
        };
        f.write_str(name)
    }
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub predictions_path: PathBuf,
    pub split_path: PathBuf,
    /// Parameters used per model, in training order
    pub params: Vec<(String, TunedParams)>,
}

/// Result of a joint study
#[derive(Debug)]
pub struct OptimizeReport {
    pub best_params_path: PathBuf,
    pub outcome: SearchOutcome,
}

/// Drives one experiment over a dataset and a list of models.
///
/// Preprocessing is fitted once on the training partition, or, when the
/// search config enables per-fold preprocessing, separately on every
/// fold-train partition and on the full training partition. Every model is
/// tuned through the parameter cache and predicted on each validation fold.
/// The test rows are predicted by the search's refitted model, or by a model
/// refitted on the full training partition when parameters came from cache.
pub struct Trainer {
    config: TrainerConfig,
    dataset: Dataset,
    models: Vec<Box<dyn ModelAdapter>>,
    optimizer: HyperparamOptimizer,
    state: RunState,
    assignment: Option<SplitAssignment>,
    raw: Option<TrainingData>,
    data: Option<TrainingData>,
    results: Option<ResultTable>,
    params: Vec<(String, TunedParams)>,
    fitted: Vec<(String, FittedModel)>,
}

impl Trainer {
    pub fn new(dataset: Dataset, models: Vec<Box<dyn ModelAdapter>>, config: TrainerConfig) -> Result<Self> {
        config.validate()?;
        let optimizer = HyperparamOptimizer::from_config(&config.search)?;
        Ok(Self::with_optimizer(dataset, models, config, optimizer))
    }

    /// Trainer with a caller-supplied cache and search strategy
    pub fn with_optimizer(
        dataset: Dataset,
        models: Vec<Box<dyn ModelAdapter>>,
        config: TrainerConfig,
        optimizer: HyperparamOptimizer,
    ) -> Self {
        Self {
            config,
            dataset,
            models,
            optimizer,
            state: RunState::Init,
            assignment: None,
            raw: None,
            data: None,
            results: None,
            params: Vec::new(),
            fitted: Vec::new(),
        }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn assignment(&self) -> Option<&SplitAssignment> {
        self.assignment.as_ref()
    }

    /// Partitions as they are fed to the models; raw in per-fold mode
    pub fn training_data(&self) -> Option<&TrainingData> {
        self.data.as_ref().or(self.raw.as_ref())
    }

    /// Model used for the test predictions, once trained
    pub fn fitted_model(&self, name: &str) -> Option<&FittedModel> {
        self.fitted.iter().find(|(n, _)| n == name).map(|(_, m)| m)
    }

    pub fn results(&self) -> Option<&ResultTable> {
        self.results.as_ref()
    }

    fn expect_state(&self, expected: RunState) -> Result<()> {
        if self.state != expected {
            return Err(CvError::InvalidConfig(format!(
                "trainer is in state '{}', expected '{}'",
                self.state, expected
            )));
        }
        Ok(())
    }

    /// Load the split document, or build and save one, then materialise
    /// the partitions and the result table
    pub fn prepare_split(&mut self) -> Result<&SplitAssignment> {
        self.expect_state(RunState::Init)?;
        let path = &self.config.split_path;
        let assignment = if path.exists() {
            info!(path = %path.display(), "Loading existing split");
            SplitStore::load(path)?
        } else {
            info!(path = %path.display(), "No split found, creating one");
            let assignment = match &self.config.test_selector {
                Some(selector) => self.dataset.split_with_test_from_column(
                    &selector.column,
                    &selector.value,
                    &self.config.split,
                )?,
                None => self.dataset.full_split(&self.config.split)?,
            };
            SplitStore::save(&assignment, path)?;
            assignment
        };

        let raw = self.dataset.apply_split(&assignment)?;
        self.results = Some(ResultTable::for_training_data(self.dataset.meta().clone(), &raw)?);
        self.raw = Some(raw);
        self.state = RunState::SplitReady;
        Ok(&*self.assignment.insert(assignment))
    }

    /// Fit preprocessing once on the training partition and transform
    /// every partition with it. In per-fold mode the partitions stay raw.
    pub fn preprocess(&mut self) -> Result<()> {
        self.expect_state(RunState::SplitReady)?;
        let raw = self.raw.as_ref().ok_or_else(not_prepared)?;
        match &self.config.search.fold_preprocessing {
            Some(config) => info!(
                preprocessing = %config.label(),
                "Per-fold preprocessing enabled, skipping run-level preprocessing"
            ),
            None => self.data = Some(raw.preprocess(&self.config.preprocessing)?),
        }
        self.state = RunState::Preprocessed;
        Ok(())
    }

    /// Tune, cross-validate and test every model in order
    pub fn train_models(&mut self) -> Result<()> {
        self.expect_state(RunState::Preprocessed)?;
        if self.models.is_empty() {
            warn!("No models to train");
        }
        let data = self.data.as_ref().or(self.raw.as_ref()).ok_or_else(not_prepared)?;
        let table = self.results.as_mut().ok_or_else(not_prepared)?;
        let fold_preprocessing = self.config.search.fold_preprocessing.as_ref();
        for model in self.models.iter_mut() {
            let (tuned, fitted) = train_model(&self.optimizer, model.as_mut(), data, fold_preprocessing, table)?;
            self.params.push((model.name().to_string(), tuned));
            self.fitted.push((model.name().to_string(), fitted));
        }
        self.state = RunState::ModelsDone;
        Ok(())
    }

    /// Write the result table once
    pub fn persist(&mut self) -> Result<PathBuf> {
        self.expect_state(RunState::ModelsDone)?;
        let table = self.results.as_ref().ok_or_else(not_prepared)?;
        let path = table.save(&self.config.result_dir, &self.config.task_name)?;
        self.state = RunState::Persisted;
        Ok(path)
    }

    /// Run every remaining step
    pub fn run(&mut self) -> Result<RunReport> {
        info!(task = %self.config.task_name, n_models = self.models.len(), "Starting run");
        if self.state == RunState::Init {
            self.prepare_split()?;
        }
        if self.state == RunState::SplitReady {
            self.preprocess()?;
        }
        if self.state == RunState::Preprocessed {
            self.train_models()?;
        }
        let predictions_path = match self.state {
            RunState::ModelsDone => self.persist()?,
            _ => self.predictions_path(),
        };
        Ok(RunReport {
            predictions_path,
            split_path: self.config.split_path.clone(),
            params: self.params.clone(),
        })
    }

    pub fn predictions_path(&self) -> PathBuf {
        self.config
            .result_dir
            .join(format!("predictions_{}.csv", self.config.task_name))
    }

    /// Joint trial study over the models and preprocessing variants; the
    /// winning configuration is written to `best_params.json`.
    ///
    /// Without configured variants the run's preprocessing competes alone.
    /// In per-fold mode every variant is fitted per fold.
    pub fn optimize(&mut self) -> Result<OptimizeReport> {
        if self.state == RunState::Init {
            self.prepare_split()?;
        }
        let raw = self.raw.as_ref().ok_or_else(not_prepared)?;

        let search = &self.config.search;
        let variants = match (&self.config.preprocessing_variants[..], &search.fold_preprocessing) {
            ([], Some(per_fold)) => vec![per_fold.clone()],
            ([], None) => vec![self.config.preprocessing.clone()],
            (variants, _) => variants.to_vec(),
        };
        let mut study = TrialSearch::new(search.n_trials)
            .with_seed(search.seed)
            .with_n_jobs(search.n_jobs);
        if let Some(pre) = &search.fold_preprocessing {
            study = study.with_fold_preprocessing(pre.clone());
        }
        let outcome = study.search_models(&self.models, raw, &variants)?;

        fs::create_dir_all(&self.config.result_dir)?;
        let path = self.config.result_dir.join("best_params.json");
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, &outcome.best_params)?;
        writer.flush()?;
        info!(
            path = %path.display(),
            score = outcome.best_score,
            params = %outcome.best_params,
            "Saved best parameters"
        );
        Ok(OptimizeReport {
            best_params_path: path,
            outcome,
        })
    }
}

fn not_prepared() -> CvError {
    CvError::InvalidConfig("split has not been prepared".to_string())
}

fn train_model(
    optimizer: &HyperparamOptimizer,
    model: &mut dyn ModelAdapter,
    data: &TrainingData,
    fold_preprocessing: Option<&PreprocessingConfig>,
    table: &mut ResultTable,
) -> Result<(TunedParams, FittedModel)> {
    let name = model.name().to_string();
    table.add_model(&name)?;
    let (tuned, searched) = optimizer.load_or_tune_fitted(model, data)?;

    let folds = match fold_preprocessing {
        Some(config) => data.cv_folds().with_fold_preprocessing(config.clone()),
        None => data.cv_folds(),
    };
    for fold in folds {
        let fold = fold?;
        let mut fold_model = model.clone_box();
        fold_model
            .fit(fold.train.x(), fold.train.y())
            .map_err(|e| CvError::FoldFitFailure {
                model: name.clone(),
                fold: fold.index,
                reason: e.to_string(),
            })?;
        let predict_failure = |e: CvError| CvError::FoldPredictFailure {
            model: name.clone(),
            fold: fold.index,
            reason: e.to_string(),
        };
        let labels = fold_model.predict_label(fold.val.x()).map_err(predict_failure)?;
        let proba = fold_model.predict_proba(fold.val.x()).map_err(predict_failure)?;
        table.write_predictions(&name, fold.val.row_keys(), &labels, &proba)?;
        match roc_auc(fold.val.y(), &proba) {
            Ok(score) => info!(model = %name, fold = fold.index, score, "Fold validated"),
            Err(e) => debug!(model = %name, fold = fold.index, error = %e, "Fold AUC undefined"),
        }
    }

    let fitted = match searched {
        Some(fitted) => {
            debug!(model = %name, "Using the search's refitted model");
            fitted
        }
        None => FittedModel::fit(&*model, data.train(), fold_preprocessing)?,
    };
    let test = data.test();
    if test.is_empty() {
        warn!(model = %name, "Empty test set, skipping test predictions");
    } else {
        let (labels, proba) = fitted.predict(test)?;
        table.write_predictions(&name, test.row_keys(), &labels, &proba)?;
        if let Ok(score) = roc_auc(test.y(), &proba) {
            let accuracy = accuracy(test.y(), &labels)?;
            info!(model = %name, score, accuracy, "Test set scored");
        }
    }
    Ok((tuned, fitted))
}
