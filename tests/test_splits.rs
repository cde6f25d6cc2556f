//! Integration tests for split building, validation and persistence

use proptest::prelude::*;
use std::collections::BTreeSet;
use tabular_cv::error::CvError;
use tabular_cv::splits::{CaseId, SplitAssignment, SplitConfig, SplitStore};
use tempfile::tempdir;

fn ids(n: usize) -> Vec<CaseId> {
    (0..n).map(|i| CaseId::new(format!("case_{:03}", i))).collect()
}

fn val_union(assignment: &SplitAssignment) -> BTreeSet<CaseId> {
    assignment
        .folds()
        .iter()
        .flat_map(|f| f.val.iter().cloned())
        .collect()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_inconsistent_id_label_rejected() {
    let mut row_ids = ids(90);
    let mut labels: Vec<i64> = (0..90).map(|i| (i % 2) as i64).collect();
    for i in 0..10 {
        row_ids.push(CaseId::new("shared"));
        labels.push((i % 2) as i64);
    }
    assert_eq!(row_ids.len(), 100);

    let result = SplitStore::new(SplitConfig::default()).build(&row_ids, &labels);
    match result {
        Err(CvError::InconsistentIdLabel { id, labels }) => {
            assert_eq!(id, "shared");
            assert_eq!(labels, vec![0, 1]);
        }
        other => panic!("expected InconsistentIdLabel, got {:?}", other),
    }
}

#[test]
fn test_fifty_cases_five_folds() {
    let row_ids = ids(50);
    let labels: Vec<i64> = (0..50).map(|i| if i < 30 { 0 } else { 1 }).collect();
    let config = SplitConfig::default().with_test_fraction(0.2).with_n_splits(5);

    let assignment = SplitStore::new(config).build(&row_ids, &labels).unwrap();
    assert_eq!(assignment.test_ids().len(), 10);
    assert_eq!(assignment.n_folds(), 5);
    for fold in assignment.folds() {
        assert_eq!(fold.val.len(), 8);
        assert_eq!(fold.train.len(), 32);
    }

    // 30/20 classes give a 6/4 test set
    let positives = assignment
        .test_ids()
        .iter()
        .filter(|id| row_ids.iter().position(|r| r == *id).unwrap() >= 30)
        .count();
    assert_eq!(positives, 4);
}

#[test]
fn test_repeated_rows_stay_together() {
    let mut row_ids = Vec::new();
    let mut labels = Vec::new();
    for i in 0..40 {
        for _ in 0..(1 + i % 3) {
            row_ids.push(CaseId::new(format!("patient_{}", i)));
            labels.push((i % 2) as i64);
        }
    }
    let assignment = SplitStore::new(SplitConfig::default()).build(&row_ids, &labels).unwrap();
    assert_eq!(assignment.all_ids().len(), 40);
    assert_eq!(assignment.test_ids().len(), 8);
    assert!(assignment.validate().is_ok());
}

#[test]
fn test_predefined_test_set() {
    let row_ids = ids(30);
    let labels: Vec<i64> = (0..30).map(|i| (i % 2) as i64).collect();
    let is_test: Vec<bool> = (0..30).map(|i| i >= 24).collect();

    let assignment = SplitStore::new(SplitConfig::default().with_n_splits(3))
        .build_with_test_from_column(&row_ids, &labels, &is_test)
        .unwrap();
    let expected: BTreeSet<CaseId> = row_ids[24..].iter().cloned().collect();
    assert_eq!(assignment.test_ids(), &expected);
    assert_eq!(assignment.n_folds(), 3);
    assert_eq!(val_union(&assignment).len(), 24);
}

#[test]
fn test_assignment_lookup() {
    let row_ids = ids(20);
    let labels: Vec<i64> = (0..20).map(|i| (i % 2) as i64).collect();
    let assignment = SplitStore::new(SplitConfig::default().with_n_splits(2))
        .build(&row_ids, &labels)
        .unwrap();

    for id in &row_ids {
        let a = assignment.assignment(id).unwrap();
        if a.is_test {
            assert!(a.fold_index.is_none());
        } else {
            let fold = a.fold_index.unwrap();
            assert!(assignment.folds()[fold].val.contains(id));
        }
    }
    assert!(assignment.assignment(&CaseId::new("unknown")).is_none());
}

#[test]
fn test_invalid_configs() {
    let row_ids = ids(20);
    let labels = vec![0i64; 20];
    for config in [
        SplitConfig::default().with_test_fraction(0.0),
        SplitConfig::default().with_test_fraction(1.0),
        SplitConfig::default().with_n_splits(1),
        SplitConfig::default().with_n_splits(30),
    ] {
        assert!(matches!(
            SplitStore::new(config).build(&row_ids, &labels),
            Err(CvError::InvalidConfig(_))
        ));
    }
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_missing_split_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.json");
    assert!(matches!(SplitStore::load(&path), Err(CvError::MissingSplitFile(p)) if p == path));
}

#[test]
fn test_malformed_split_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("split.json");
    std::fs::write(&path, "{\"test\": [1, 2").unwrap();
    assert!(matches!(SplitStore::load(&path), Err(CvError::SerializationError(_))));
}

#[test]
fn test_overlapping_document_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("split.json");
    std::fs::write(
        &path,
        r#"{"test": ["a"], "train": {"fold_0": [["a", "b"], ["c"]], "fold_1": [["c"], ["b"]]}}"#,
    )
    .unwrap();
    assert!(matches!(SplitStore::load(&path), Err(CvError::InvalidSplit(_))));
}

#[test]
fn test_numeric_ids_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("split.json");
    std::fs::write(
        &path,
        r#"{"test": [1, 2], "train": {"fold_1": [[3, 4], [5, 6]], "fold_0": [[5, 6], [3, 4]]}}"#,
    )
    .unwrap();

    let assignment = SplitStore::load(&path).unwrap();
    assert!(assignment.test_ids().contains(&CaseId::new("1")));
    assert_eq!(assignment.n_folds(), 2);
    assert!(assignment.folds()[0].val.contains(&CaseId::new("3")));
    assert!(assignment.folds()[1].val.contains(&CaseId::new("5")));
}

#[test]
fn test_fold_order_survives_round_trip() {
    let row_ids = ids(80);
    let labels: Vec<i64> = (0..80).map(|i| (i % 2) as i64).collect();
    let config = SplitConfig::default().with_n_splits(12);
    let assignment = SplitStore::new(config).build(&row_ids, &labels).unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("split.json");
    SplitStore::save(&assignment, &path).unwrap();
    let loaded = SplitStore::load(&path).unwrap();
    assert_eq!(loaded, assignment);
}

// ============================================================================
// Properties
// ============================================================================

fn split_inputs() -> impl Strategy<Value = (Vec<bool>, f64, usize, u64)> {
    (12usize..80).prop_flat_map(|n| {
        (
            prop::collection::vec(any::<bool>(), n),
            0.1f64..0.5,
            2usize..=5,
            any::<u64>(),
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_split_invariants((flags, fraction, n_splits, seed) in split_inputs()) {
        let n = flags.len();
        let row_ids = ids(n);
        let labels: Vec<i64> = flags.iter().map(|&b| b as i64).collect();
        let config = SplitConfig::default()
            .with_test_fraction(fraction)
            .with_n_splits(n_splits)
            .with_seed(seed);
        let assignment = SplitStore::new(config.clone()).build(&row_ids, &labels).unwrap();

        prop_assert!(assignment.validate().is_ok());

        let expected_test = ((n as f64) * fraction - 1e-9).ceil() as usize;
        prop_assert_eq!(assignment.test_ids().len(), expected_test);

        // Test and validation folds partition the ids
        let vals = val_union(&assignment);
        prop_assert!(vals.is_disjoint(assignment.test_ids()));
        let all: BTreeSet<CaseId> = vals.union(assignment.test_ids()).cloned().collect();
        prop_assert_eq!(all, row_ids.iter().cloned().collect::<BTreeSet<_>>());

        // Fold sizes differ by at most one
        let sizes: Vec<usize> = assignment.folds().iter().map(|f| f.val.len()).collect();
        let (min, max) = (sizes.iter().min().unwrap(), sizes.iter().max().unwrap());
        prop_assert!(max - min <= 1);

        // Test classes follow the class proportions
        let n_pos = flags.iter().filter(|&&b| b).count();
        let test_pos = assignment
            .test_ids()
            .iter()
            .filter(|id| flags[row_ids.iter().position(|r| r == *id).unwrap()])
            .count();
        let exact = expected_test as f64 * n_pos as f64 / n as f64;
        prop_assert!((test_pos as f64 - exact).abs() < 1.0 + 1e-9);

        // Same inputs, same split
        let again = SplitStore::new(config).build(&row_ids, &labels).unwrap();
        prop_assert_eq!(again, assignment);
    }

    #[test]
    fn prop_row_order_irrelevant((flags, fraction, n_splits, seed) in split_inputs()) {
        let row_ids = ids(flags.len());
        let labels: Vec<i64> = flags.iter().map(|&b| b as i64).collect();
        let config = SplitConfig::default()
            .with_test_fraction(fraction)
            .with_n_splits(n_splits)
            .with_seed(seed);
        let forward = SplitStore::new(config.clone()).build(&row_ids, &labels).unwrap();

        let reversed_ids: Vec<CaseId> = row_ids.iter().rev().cloned().collect();
        let reversed_labels: Vec<i64> = labels.iter().rev().copied().collect();
        let backward = SplitStore::new(config).build(&reversed_ids, &reversed_labels).unwrap();
        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn prop_save_load_round_trip((flags, fraction, n_splits, seed) in split_inputs()) {
        let row_ids = ids(flags.len());
        let labels: Vec<i64> = flags.iter().map(|&b| b as i64).collect();
        let config = SplitConfig::default()
            .with_test_fraction(fraction)
            .with_n_splits(n_splits)
            .with_seed(seed);
        let assignment = SplitStore::new(config).build(&row_ids, &labels).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("split.json");
        SplitStore::save(&assignment, &path).unwrap();
        prop_assert_eq!(SplitStore::load(&path).unwrap(), assignment);
    }
}
