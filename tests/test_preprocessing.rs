//! Integration test: preprocessing is fitted on training data only

use approx::assert_relative_eq;
use polars::prelude::*;
use std::collections::BTreeSet;
use tabular_cv::dataset::{ColumnConfig, Dataset, Partition, TrainingData};
use tabular_cv::error::CvError;
use tabular_cv::preprocessing::{
    OversamplingMethod, PreprocessingConfig, Preprocessor, ScalerType, SelectionMethod,
};
use tabular_cv::splits::SplitConfig;

fn sample_df() -> DataFrame {
    let n = 40;
    let ids: Vec<String> = (0..n).map(|i| format!("p{}", i)).collect();
    let labels: Vec<i64> = (0..n).map(|i| (i % 2) as i64).collect();
    let age: Vec<f64> = (0..n).map(|i| 25.0 + i as f64).collect();
    let volume: Vec<f64> = (0..n).map(|i| 100.0 + (i % 2) as f64 * 50.0 + (i % 5) as f64).collect();
    let constant: Vec<f64> = vec![3.0; n];
    df!(
        "id" => ids,
        "label" => labels,
        "age" => age,
        "volume" => volume,
        "constant" => constant
    )
    .unwrap()
}

fn training_data() -> (Dataset, TrainingData) {
    let dataset = Dataset::from_dataframe(&sample_df(), &ColumnConfig::new("label", "id")).unwrap();
    let split = dataset.full_split(&SplitConfig::default()).unwrap();
    let data = dataset.apply_split(&split).unwrap();
    (dataset, data)
}

#[test]
fn test_minmax_uses_training_range_only() {
    let (_, data) = training_data();
    let processed = data
        .preprocess(&PreprocessingConfig::new().with_scaler(ScalerType::MinMax))
        .unwrap();

    let train = processed.train().x();
    for j in 0..2 {
        let column = train.column(j);
        let min = column.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = column.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert_relative_eq!(min, 0.0);
        assert_relative_eq!(max, 1.0);
    }

    // Test rows are scaled with the training statistics, not their own
    let raw_test = data.test().x();
    let scaled_test = processed.test().x();
    let raw_train = data.train().x();
    let lo = raw_train.column(0).iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = raw_train.column(0).iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    for (raw, scaled) in raw_test.column(0).iter().zip(scaled_test.column(0).iter()) {
        assert_relative_eq!(*scaled, (raw - lo) / (hi - lo), epsilon = 1e-12);
    }
}

#[test]
fn test_source_partitions_are_untouched() {
    let (_, data) = training_data();
    let before = data.train().x().clone();
    let processed = data
        .preprocess(&PreprocessingConfig::new().with_scaler(ScalerType::Standard))
        .unwrap();
    assert_eq!(data.train().x(), &before);
    assert!(!data.is_preprocessed());
    assert!(processed.is_preprocessed());
    assert!(processed.preprocess(&PreprocessingConfig::new()).is_err());
}

#[test]
fn test_fit_rejected_outside_training() {
    let (dataset, data) = training_data();
    let config = PreprocessingConfig::new();

    assert!(matches!(
        Preprocessor::new(config.clone()).fit(data.test()),
        Err(CvError::PreprocessorFitRejected(_))
    ));
    assert!(matches!(
        dataset.fit_preprocess(&data.folds()[0].val, &config),
        Err(CvError::PreprocessorFitRejected(_))
    ));
    assert!(dataset.fit_preprocess(&data.folds()[0].train, &config).is_ok());
}

#[test]
fn test_fit_once_and_unfitted_transform() {
    let (dataset, data) = training_data();
    let unfitted = Preprocessor::new(PreprocessingConfig::new());
    assert!(matches!(
        dataset.transform(data.test(), &unfitted),
        Err(CvError::UnfittedPreprocessor)
    ));

    let fitted = unfitted.fit(data.train()).unwrap();
    assert!(matches!(fitted.clone().fit(data.train()), Err(CvError::PreprocessorAlreadyFitted)));
    let test = dataset.transform(data.test(), &fitted).unwrap();
    assert_eq!(test.n_samples(), data.test().n_samples());
    assert_eq!(test.row_keys(), data.test().row_keys());
}

#[test]
fn test_variance_threshold_drops_constant_feature() {
    let (_, data) = training_data();
    let config = PreprocessingConfig::new()
        .with_scaler(ScalerType::None)
        .with_feature_selection(SelectionMethod::VarianceThreshold { threshold: 0.0 });
    let processed = data.preprocess(&config).unwrap();

    let selected = processed.selected_features().unwrap();
    assert_eq!(selected.to_vec(), vec!["age".to_string(), "volume".to_string()]);
    assert_eq!(processed.test().n_features(), 2);
    for fold in processed.folds() {
        assert_eq!(fold.train.n_features(), 2);
        assert_eq!(fold.val.n_features(), 2);
    }
}

#[test]
fn test_per_fold_preprocessing() {
    let (_, data) = training_data();
    let config = PreprocessingConfig::new().with_scaler(ScalerType::MinMax);
    let folds: Vec<_> = data
        .cv_folds()
        .with_fold_preprocessing(config)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(folds.len(), 5);

    for fold in &folds {
        let column = fold.train.x().column(0).to_owned();
        let max = column.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert_relative_eq!(max, 1.0);
    }
    // The shared partitions stay raw
    assert!(data.folds()[0].train.x().column(0).iter().any(|&v| v > 1.0));
}

fn imbalanced_data() -> TrainingData {
    let n = 45;
    let ids: Vec<String> = (0..n).map(|i| format!("p{}", i)).collect();
    let labels: Vec<i64> = (0..n).map(|i| (i % 3 == 0) as i64).collect();
    let age: Vec<f64> = (0..n).map(|i| 30.0 + i as f64 + (i % 3 == 0) as i64 as f64 * 20.0).collect();
    let volume: Vec<f64> = (0..n).map(|i| 50.0 + (i % 7) as f64).collect();
    let df = df!("id" => ids, "label" => labels, "age" => age, "volume" => volume).unwrap();

    let dataset = Dataset::from_dataframe(&df, &ColumnConfig::new("label", "id")).unwrap();
    let split = dataset.full_split(&SplitConfig::default()).unwrap();
    dataset.apply_split(&split).unwrap()
}

fn class_count(partition: &Partition, label: f64) -> usize {
    partition.y().iter().filter(|&&l| l == label).count()
}

#[test]
fn test_smote_resamples_training_partitions_only() {
    let data = imbalanced_data();
    let config = PreprocessingConfig::new().with_oversampling(OversamplingMethod::default());
    let processed = data.preprocess(&config).unwrap();

    let train = processed.train();
    assert!(train.n_samples() > data.train().n_samples());
    assert_eq!(class_count(train, 1.0), class_count(train, 0.0));
    let source_keys: BTreeSet<usize> = data.train().row_keys().iter().copied().collect();
    assert!(train.row_keys().iter().all(|k| source_keys.contains(k)));

    assert_eq!(processed.test().n_samples(), data.test().n_samples());
    assert_eq!(processed.test().row_keys(), data.test().row_keys());
    for (raw, fold) in data.folds().iter().zip(processed.folds()) {
        assert_eq!(fold.val.n_samples(), raw.val.n_samples());
        assert_eq!(fold.val.row_keys(), raw.val.row_keys());
        assert_eq!(class_count(&fold.train, 1.0), class_count(&fold.train, 0.0));
    }
}

#[test]
fn test_smote_per_fold_keeps_validation_rows() {
    let data = imbalanced_data();
    let config = PreprocessingConfig::new()
        .with_scaler(ScalerType::Standard)
        .with_oversampling(OversamplingMethod::Smote { k_neighbors: 3, seed: 1 });

    for (raw, fold) in data.folds().iter().zip(data.cv_folds().with_fold_preprocessing(config)) {
        let fold = fold.unwrap();
        assert_eq!(fold.val.n_samples(), raw.val.n_samples());
        assert_eq!(fold.val.y(), raw.val.y());
        assert!(fold.train.n_samples() > raw.train.n_samples());
        assert_eq!(class_count(&fold.train, 1.0), class_count(&fold.train, 0.0));
    }
}
