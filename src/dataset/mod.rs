//! Source tables and their materialised partitions
//!
//! A [`Dataset`] is never mutated once loaded. Applying a split produces a
//! [`TrainingData`] whose partitions own copies of their rows, so
//! preprocessing one partition cannot affect another.

mod config;
mod cv;
mod partition;
mod table;

pub use config::ColumnConfig;
pub use cv::CvIterator;
pub use partition::{FoldPair, Partition, PartitionRole, TrainingData};
pub use table::{Dataset, MetaTable};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::{PreprocessingConfig, ScalerType, SelectionMethod};
    use crate::splits::{CaseId, SplitConfig};
    use ndarray::Array2;

    fn dataset() -> Dataset {
        let n = 30;
        let ids = (0..n).map(|i| CaseId::new(format!("c{}", i))).collect();
        let labels: Vec<i64> = (0..n).map(|i| (i % 2) as i64).collect();
        let x = Array2::from_shape_fn((n, 3), |(r, c)| match c {
            0 => r as f64,
            1 => (r % 2) as f64 + 0.01 * r as f64,
            _ => 7.0,
        });
        Dataset::new(
            ids,
            x,
            vec!["a".into(), "b".into(), "c".into()],
            labels,
            MetaTable::empty(n),
        )
        .unwrap()
    }

    fn training_data() -> TrainingData {
        let dataset = dataset();
        let assignment = dataset.full_split(&SplitConfig::new()).unwrap();
        dataset.apply_split(&assignment).unwrap()
    }

    #[test]
    fn test_cv_folds_restartable() {
        let data = training_data();
        let first: Vec<usize> = data.cv_folds().map(|f| f.unwrap().index).collect();
        let second: Vec<usize> = data.cv_folds().map(|f| f.unwrap().index).collect();
        assert_eq!(first, vec![0, 1, 2, 3, 4]);
        assert_eq!(first, second);
        assert_eq!(data.cv_folds().len(), 5);
    }

    #[test]
    fn test_per_fold_preprocessing() {
        let data = training_data();
        let config = PreprocessingConfig::new()
            .with_scaler(ScalerType::MinMax)
            .with_feature_selection(SelectionMethod::Anova { k: 1 });
        for fold in data.cv_folds().with_fold_preprocessing(config) {
            let fold = fold.unwrap();
            assert_eq!(fold.train.n_features(), 1);
            assert_eq!(fold.val.feature_names(), fold.train.feature_names());
            let max = fold.train.x().iter().copied().fold(f64::MIN, f64::max);
            assert!((max - 1.0).abs() < 1e-12);
        }
        // borrowed folds are untouched
        assert_eq!(data.folds()[0].train.n_features(), 3);
    }

    #[test]
    fn test_preprocess_once() {
        let data = training_data();
        let config = PreprocessingConfig::new()
            .with_feature_selection(SelectionMethod::VarianceThreshold { threshold: 0.0 });
        let processed = data.preprocess(&config).unwrap();

        assert_eq!(processed.selected_features().unwrap(), &["a".to_string(), "b".to_string()]);
        assert_eq!(processed.test().n_features(), 2);
        assert!(processed.folds().iter().all(|f| f.val.n_features() == 2));
        assert_eq!(
            processed.preprocessor().and_then(|p| p.fitted_on()),
            Some(PartitionRole::Train)
        );

        let err = processed.preprocess(&config).unwrap_err();
        assert!(matches!(err, crate::error::CvError::PreprocessorAlreadyFitted));
        assert!(data.selected_features().is_err());
    }

    #[test]
    fn test_display_summary() {
        let data = training_data();
        assert_eq!(
            data.to_string(),
            "TrainingData with 24 training observations, 6 test observations, 3 features, 5 folds and 0 meta columns."
        );
    }
}
