//! Integration tests for the trainer: splits, tuning, fold predictions and
//! the persisted result table

use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tabular_cv::dataset::{ColumnConfig, Dataset};
use tabular_cv::error::{CvError, Result};
use tabular_cv::optimizer::{ParamCache, ParamGrid, ParamSet, SearchConfig, SearchStrategy, MODEL_KEY, PREPROCESSING_KEY};
use tabular_cv::preprocessing::{OversamplingMethod, PreprocessingConfig, ScalerType, SelectionMethod};
use tabular_cv::training::{
    LogisticRegressionModel, ModelAdapter, ModelFamily, RandomForestModel, RunState, Trainer, TrainerConfig,
    UNPREDICTED,
};
use tabular_cv::utils::DataLoader;
use tempfile::tempdir;

// ============================================================================
// Fixtures
// ============================================================================

fn frame(n: usize) -> DataFrame {
    let ids: Vec<String> = (0..n).map(|i| format!("case_{:02}", i)).collect();
    let labels: Vec<i64> = (0..n).map(|i| (i % 2) as i64).collect();
    let f1: Vec<f64> = (0..n).map(|i| (i % 2) as f64 * 2.0 + (i % 5) as f64 * 0.1).collect();
    let f2: Vec<f64> = (0..n).map(|i| (i % 7) as f64).collect();
    let f3: Vec<f64> = (0..n).map(|i| 1.0 - (i % 2) as f64 + (i % 3) as f64 * 0.05).collect();
    let site: Vec<&str> = (0..n).map(|i| if i % 3 == 0 { "north" } else { "south" }).collect();
    df!(
        "id" => ids,
        "label" => labels,
        "f1" => f1,
        "f2" => f2,
        "f3" => f3,
        "site" => site
    )
    .unwrap()
}

fn dataset(n: usize) -> Dataset {
    let columns = ColumnConfig::new("label", "id").with_meta_columns(vec!["site".to_string()]);
    Dataset::from_dataframe(&frame(n), &columns).unwrap()
}

fn small_grids(dir: &Path) -> SearchConfig {
    SearchConfig::new()
        .with_param_dir(dir.join("params"))
        .with_grid_override("LogisticRegression", ParamGrid::new().axis("C", vec![0.1, 1.0]))
        .with_grid_override(
            "RandomForest",
            ParamGrid::new()
                .axis("n_estimators", vec![5i64])
                .axis("max_depth", vec![3i64]),
        )
}

fn config(dir: &Path) -> TrainerConfig {
    TrainerConfig::new("demo")
        .with_result_dir(dir.join("results"))
        .with_split_path(dir.join("splits").join("split.json"))
        .with_search(small_grids(dir))
}

fn models() -> Vec<Box<dyn ModelAdapter>> {
    vec![
        Box::new(LogisticRegressionModel::new()),
        Box::new(RandomForestModel::new().with_n_estimators(5)),
    ]
}

fn column_f64(df: &DataFrame, name: &str) -> Vec<f64> {
    df.column(name)
        .unwrap()
        .cast(&DataType::Float64)
        .unwrap()
        .f64()
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap())
        .collect()
}

// ============================================================================
// End to end
// ============================================================================

#[test]
fn test_two_models_thirty_cases() {
    let dir = tempdir().unwrap();
    let mut trainer = Trainer::new(dataset(30), models(), config(dir.path())).unwrap();
    let report = trainer.run().unwrap();
    assert_eq!(trainer.state(), RunState::Persisted);

    let data = trainer.training_data().unwrap();
    assert_eq!(data.train().n_samples(), 24);
    assert_eq!(data.test().n_samples(), 6);
    assert_eq!(data.n_folds(), 5);

    assert!(report.predictions_path.ends_with("predictions_demo.csv"));
    let df = DataLoader::new().load_csv(&report.predictions_path).unwrap();
    assert_eq!(df.height(), 30);

    let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "id",
            "site",
            "test",
            "cv_split",
            "LogisticRegression_pred",
            "LogisticRegression_pred_proba",
            "RandomForest_pred",
            "RandomForest_pred_proba",
        ]
    );

    let test = column_f64(&df, "test");
    let cv_split = column_f64(&df, "cv_split");
    assert_eq!(test.iter().filter(|&&t| t == 1.0).count(), 6);
    assert_eq!(cv_split.iter().filter(|&&c| c == -1.0).count(), 6);
    for (t, c) in test.iter().zip(&cv_split) {
        assert_eq!(*t == 1.0, *c == -1.0);
    }

    for model in ["LogisticRegression", "RandomForest"] {
        let pred = column_f64(&df, &format!("{}_pred", model));
        let proba = column_f64(&df, &format!("{}_pred_proba", model));
        assert!(pred.iter().all(|&p| p == 0.0 || p == 1.0), "{} has unpredicted rows", model);
        assert!(proba.iter().all(|&p| p != UNPREDICTED && (0.0..=1.0).contains(&p)));
    }

    // Row order follows the source table
    let ids: Vec<String> = df
        .column("id")
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap().to_string())
        .collect();
    assert_eq!(ids.first().map(String::as_str), Some("case_00"));
    assert_eq!(ids.last().map(String::as_str), Some("case_29"));

    // Both models cached their parameters
    let cache = ParamCache::new(dir.path().join("params"));
    assert!(cache.require("LogisticRegression").is_ok());
    assert!(cache.require("RandomForest").is_ok());
}

#[test]
fn test_second_run_reuses_split_and_cache() {
    let dir = tempdir().unwrap();
    let mut first = Trainer::new(dataset(30), models(), config(dir.path())).unwrap();
    first.run().unwrap();
    let split = first.assignment().cloned().unwrap();

    let mut second = Trainer::new(dataset(30), models(), config(dir.path())).unwrap();
    let report = second.run().unwrap();
    assert_eq!(second.assignment(), Some(&split));
    assert!(report
        .params
        .iter()
        .all(|(_, tuned)| tuned.source == tabular_cv::optimizer::ParamSource::Cache));
}

#[test]
fn test_steps_must_run_in_order() {
    let dir = tempdir().unwrap();
    let mut trainer = Trainer::new(dataset(30), models(), config(dir.path())).unwrap();
    assert!(matches!(trainer.train_models(), Err(CvError::InvalidConfig(_))));
    assert!(matches!(trainer.persist(), Err(CvError::InvalidConfig(_))));

    trainer.prepare_split().unwrap();
    assert_eq!(trainer.state(), RunState::SplitReady);
    assert!(trainer.prepare_split().is_err());
    trainer.preprocess().unwrap();
    assert_eq!(trainer.state(), RunState::Preprocessed);
    assert!(trainer.training_data().unwrap().is_preprocessed());
}

#[test]
fn test_predefined_test_column() {
    let dir = tempdir().unwrap();
    let config = config(dir.path()).with_test_selector("site", "north");
    let mut trainer = Trainer::new(dataset(30), models(), config).unwrap();
    let split = trainer.prepare_split().unwrap();
    assert_eq!(split.test_ids().len(), 10);
    assert!(split.split_type().unwrap().starts_with("predefined test as site = north"));
}

#[test]
fn test_feature_selection_is_applied_to_every_partition() {
    let dir = tempdir().unwrap();
    let config = config(dir.path()).with_preprocessing(
        PreprocessingConfig::new()
            .with_scaler(ScalerType::Standard)
            .with_feature_selection(SelectionMethod::Anova { k: 2 }),
    );
    let mut trainer = Trainer::new(dataset(30), models(), config).unwrap();
    trainer.run().unwrap();

    let data = trainer.training_data().unwrap();
    let selected = data.selected_features().unwrap().to_vec();
    assert_eq!(selected.len(), 2);
    assert_eq!(data.test().feature_names(), selected.as_slice());
    for fold in data.folds() {
        assert_eq!(fold.val.feature_names(), selected.as_slice());
    }
}

// ============================================================================
// Failures
// ============================================================================

/// Fits only on partitions larger than `min_rows`
#[derive(Debug, Clone)]
struct PickyModel {
    min_rows: usize,
}

impl ModelAdapter for PickyModel {
    fn name(&self) -> &str {
        "Picky"
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::Custom("Picky".to_string())
    }

    fn fit(&mut self, x: &Array2<f64>, _y: &Array1<f64>) -> Result<()> {
        if x.nrows() <= self.min_rows {
            return Err(CvError::ModelFit(format!("need more than {} rows", self.min_rows)));
        }
        Ok(())
    }

    fn predict_label(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(Array1::zeros(x.nrows()))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(Array1::from_elem(x.nrows(), 0.5))
    }

    fn get_params(&self) -> ParamSet {
        ParamSet::new().with("min_rows", self.min_rows as i64)
    }

    fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        if let Some(min_rows) = params.i64_param("min_rows")? {
            self.min_rows = min_rows as usize;
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn ModelAdapter> {
        Box::new(self.clone())
    }
}

#[test]
fn test_fold_failure_names_model_and_fold() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());

    // Cached parameters skip the search; every fold-train has 19 or 20 rows
    ParamCache::new(&config.search.param_dir)
        .save_params("Picky", &ParamSet::new().with("min_rows", 100i64))
        .unwrap();
    let models: Vec<Box<dyn ModelAdapter>> = vec![Box::new(PickyModel { min_rows: 0 })];

    let mut trainer = Trainer::new(dataset(30), models, config.clone()).unwrap();
    match trainer.run() {
        Err(CvError::FoldFitFailure { model, fold, .. }) => {
            assert_eq!(model, "Picky");
            assert_eq!(fold, 0);
        }
        other => panic!("expected FoldFitFailure, got {:?}", other.map(|r| r.predictions_path)),
    }
    assert_eq!(trainer.state(), RunState::Preprocessed);
    assert!(!config.result_dir.join("predictions_demo.csv").exists());
}

#[test]
fn test_custom_family_without_cache_cannot_be_tuned() {
    let dir = tempdir().unwrap();
    let models: Vec<Box<dyn ModelAdapter>> = vec![Box::new(PickyModel { min_rows: 0 })];
    let mut trainer = Trainer::new(dataset(30), models, config(dir.path())).unwrap();
    assert!(matches!(trainer.run(), Err(CvError::NoParamGridDefined(ref name)) if name == "Picky"));
}

/// Records the shape of every matrix it is fitted on; prediction fails on
/// inputs with fewer than `predict_min_rows` rows
#[derive(Debug, Clone)]
struct ShapeRecorder {
    fits: Arc<Mutex<Vec<(usize, usize)>>>,
    predict_min_rows: usize,
}

impl ShapeRecorder {
    fn new() -> Self {
        Self {
            fits: Arc::new(Mutex::new(Vec::new())),
            predict_min_rows: 0,
        }
    }

    fn fits(&self) -> Vec<(usize, usize)> {
        self.fits.lock().unwrap().clone()
    }
}

impl ModelAdapter for ShapeRecorder {
    fn name(&self) -> &str {
        "Recorder"
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::Custom("Recorder".to_string())
    }

    fn fit(&mut self, x: &Array2<f64>, _y: &Array1<f64>) -> Result<()> {
        self.fits.lock().unwrap().push(x.dim());
        Ok(())
    }

    fn predict_label(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.nrows() < self.predict_min_rows {
            return Err(CvError::ModelFit("too few rows to predict".to_string()));
        }
        Ok(x.column(0).mapv(|v| 1.0 / (1.0 + (-v).exp())))
    }

    fn get_params(&self) -> ParamSet {
        ParamSet::new().with("predict_min_rows", self.predict_min_rows as i64)
    }

    fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        if let Some(rows) = params.i64_param("predict_min_rows")? {
            self.predict_min_rows = rows as usize;
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn ModelAdapter> {
        Box::new(self.clone())
    }
}

fn recorder_config(dir: &Path) -> TrainerConfig {
    let search = small_grids(dir).with_grid_override("Recorder", ParamGrid::new().axis("predict_min_rows", vec![0i64]));
    config(dir).with_search(search)
}

#[test]
fn test_predict_failure_names_model_and_fold() {
    let dir = tempdir().unwrap();
    let config = recorder_config(dir.path());
    ParamCache::new(&config.search.param_dir)
        .save_params("Recorder", &ParamSet::new().with("predict_min_rows", 10i64))
        .unwrap();
    let models: Vec<Box<dyn ModelAdapter>> = vec![Box::new(ShapeRecorder::new())];

    let mut trainer = Trainer::new(dataset(30), models, config).unwrap();
    match trainer.run() {
        Err(CvError::FoldPredictFailure { model, fold, reason }) => {
            assert_eq!(model, "Recorder");
            assert_eq!(fold, 0);
            assert!(reason.contains("too few rows"));
        }
        other => panic!("expected FoldPredictFailure, got {:?}", other.map(|r| r.predictions_path)),
    }
}

// ============================================================================
// Model reuse and per-fold preprocessing
// ============================================================================

#[test]
fn test_tuned_model_is_fitted_once_on_full_training() {
    let dir = tempdir().unwrap();
    let recorder = ShapeRecorder::new();
    let models: Vec<Box<dyn ModelAdapter>> = vec![Box::new(recorder.clone())];

    let mut trainer = Trainer::new(dataset(30), models, recorder_config(dir.path())).unwrap();
    trainer.run().unwrap();
    let full_fits = recorder.fits().iter().filter(|(rows, _)| *rows == 24).count();
    assert_eq!(full_fits, 1);
    assert!(trainer.fitted_model("Recorder").is_some());

    // Cached parameters: the full training partition is fitted by the trainer
    let cached = ShapeRecorder::new();
    let models: Vec<Box<dyn ModelAdapter>> = vec![Box::new(cached.clone())];
    let mut second = Trainer::new(dataset(30), models, recorder_config(dir.path())).unwrap();
    let report = second.run().unwrap();
    assert_eq!(report.params[0].1.source, tabular_cv::optimizer::ParamSource::Cache);
    assert_eq!(cached.fits().iter().filter(|(rows, _)| *rows == 24).count(), 1);
}

#[test]
fn test_fold_preprocessing_replaces_run_level_preprocessing() {
    let dir = tempdir().unwrap();
    let search = recorder_config(dir.path()).search.with_fold_preprocessing(
        PreprocessingConfig::new()
            .with_scaler(ScalerType::Standard)
            .with_feature_selection(SelectionMethod::Anova { k: 1 }),
    );
    let config = recorder_config(dir.path())
        .with_preprocessing(
            PreprocessingConfig::new()
                .with_scaler(ScalerType::MinMax)
                .with_feature_selection(SelectionMethod::Anova { k: 2 }),
        )
        .with_search(search);
    let recorder = ShapeRecorder::new();
    let models: Vec<Box<dyn ModelAdapter>> = vec![Box::new(recorder.clone())];

    let mut trainer = Trainer::new(dataset(30), models, config).unwrap();
    let report = trainer.run().unwrap();

    // 5 search folds, the search refit and 5 main-pass folds
    let fits = recorder.fits();
    assert_eq!(fits.len(), 11);
    assert!(fits.iter().all(|&(_, n_features)| n_features == 1), "fits: {:?}", fits);
    assert!(!trainer.training_data().unwrap().is_preprocessed());

    let fitted = trainer.fitted_model("Recorder").unwrap();
    assert_eq!(fitted.preprocessor().and_then(|p| p.selected_features()).map(|f| f.len()), Some(1));

    let df = DataLoader::new().load_csv(&report.predictions_path).unwrap();
    let proba = column_f64(&df, "Recorder_pred_proba");
    assert!(proba.iter().all(|&p| p != UNPREDICTED));
}

#[test]
fn test_oversampling_keeps_one_row_per_case() {
    let dir = tempdir().unwrap();
    let config = config(dir.path()).with_preprocessing(
        PreprocessingConfig::new().with_oversampling(OversamplingMethod::Smote { k_neighbors: 3, seed: 5 }),
    );
    let mut trainer = Trainer::new(dataset(31), models(), config).unwrap();
    let report = trainer.run().unwrap();

    let df = DataLoader::new().load_csv(&report.predictions_path).unwrap();
    assert_eq!(df.height(), 31);
    for model in ["LogisticRegression", "RandomForest"] {
        let proba = column_f64(&df, &format!("{}_pred_proba", model));
        assert!(proba.iter().all(|&p| p != UNPREDICTED));
    }
    let test_rows = column_f64(&df, "test").iter().filter(|&&t| t == 1.0).count();
    assert_eq!(trainer.training_data().unwrap().test().n_samples(), test_rows);
}

// ============================================================================
// Joint study
// ============================================================================

#[test]
fn test_optimize_writes_best_params() {
    let dir = tempdir().unwrap();
    let search = small_grids(dir.path())
        .with_strategy(SearchStrategy::Trials)
        .with_n_trials(6)
        .with_seed(7);
    let config = config(dir.path())
        .with_search(search)
        .with_preprocessing_variants(vec![
            PreprocessingConfig::new().with_scaler(ScalerType::MinMax),
            PreprocessingConfig::new().with_scaler(ScalerType::Standard),
        ]);
    let models: Vec<Box<dyn ModelAdapter>> = vec![
        Box::new(LogisticRegressionModel::new()),
        Box::new(LogisticRegressionModel::new().with_name("LogisticRegressionAlt")),
    ];

    let mut trainer = Trainer::new(dataset(30), models, config).unwrap();
    let report = trainer.optimize().unwrap();
    assert_eq!(report.outcome.trials.len(), 6);
    assert!(report.outcome.model.is_some());
    assert!(report.outcome.best_score.is_finite());

    let json = std::fs::read_to_string(&report.best_params_path).unwrap();
    let saved: ParamSet = serde_json::from_str(&json).unwrap();
    assert_eq!(saved, report.outcome.best_params);
    let model = saved.str_param(MODEL_KEY).unwrap().unwrap();
    assert!(model == "LogisticRegression" || model == "LogisticRegressionAlt");
    let variant = saved.str_param(PREPROCESSING_KEY).unwrap().unwrap();
    assert!(variant == "minmax" || variant == "standard");
    assert!(saved.get("C").is_some());
}
