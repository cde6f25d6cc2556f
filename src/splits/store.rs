//! Building, saving and loading split assignments

use super::assignment::{CaseId, Fold, SplitAssignment, SplitDocument};
use super::config::SplitConfig;
use crate::error::{CvError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Stratified train/test + k-fold splitter with a JSON document store
#[derive(Debug, Clone, Default)]
pub struct SplitStore {
    config: SplitConfig,
}

impl SplitStore {
    pub fn new(config: SplitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Carve a stratified test set, then stratified k-fold on the rest.
    ///
    /// `ids` and `labels` are per row; rows sharing an id are grouped and must
    /// agree on the label.
    pub fn build(&self, ids: &[CaseId], labels: &[i64]) -> Result<SplitAssignment> {
        self.config.validate()?;
        let groups = group_labels(ids, labels)?;
        let n_ids = groups.len();

        let n_test = ((n_ids as f64) * self.config.test_fraction - 1e-9).ceil() as usize;
        if n_test == 0 || n_ids < n_test + self.config.n_splits {
            return Err(CvError::InvalidConfig(format!(
                "{} ids cannot hold a test set of {} and {} folds",
                n_ids, n_test, self.config.n_splits
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut by_class = ids_by_class(&groups);
        for members in by_class.values_mut() {
            members.shuffle(&mut rng);
        }

        let sizes: Vec<(i64, usize)> = by_class.iter().map(|(c, m)| (*c, m.len())).collect();
        let quotas = allocate_proportionally(&sizes, n_test);

        let mut test = BTreeSet::new();
        for (class, quota) in quotas {
            if let Some(members) = by_class.get_mut(&class) {
                test.extend(members.drain(..quota));
            }
        }

        let folds = stratified_folds(by_class, self.config.n_splits, &mut rng);
        info!(
            n_ids,
            n_test = test.len(),
            n_folds = folds.len(),
            seed = self.config.seed,
            "Built stratified split"
        );
        SplitAssignment::new(test, folds)
    }

    /// Use a predefined test set (one flag per row) and stratified k-fold on
    /// the remaining ids.
    pub fn build_with_test_from_column(
        &self,
        ids: &[CaseId],
        labels: &[i64],
        is_test: &[bool],
    ) -> Result<SplitAssignment> {
        if self.config.n_splits < 2 {
            return Err(CvError::InvalidConfig(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if is_test.len() != ids.len() {
            return Err(CvError::ShapeError {
                expected: format!("{} test flags", ids.len()),
                actual: format!("{} test flags", is_test.len()),
            });
        }
        let groups = group_labels(ids, labels)?;

        let mut flags: BTreeMap<&CaseId, bool> = BTreeMap::new();
        for (id, &flag) in ids.iter().zip(is_test) {
            if let Some(prev) = flags.insert(id, flag) {
                if prev != flag {
                    return Err(CvError::InvalidSplit(format!(
                        "id {} has rows both in and out of the test set",
                        id
                    )));
                }
            }
        }

        let test: BTreeSet<CaseId> = flags
            .iter()
            .filter(|(_, flag)| **flag)
            .map(|(id, _)| (*id).clone())
            .collect();
        let train_groups: BTreeMap<CaseId, i64> = groups
            .into_iter()
            .filter(|(id, _)| !test.contains(id))
            .collect();
        if train_groups.len() < self.config.n_splits {
            return Err(CvError::InvalidConfig(format!(
                "{} training ids cannot fill {} folds",
                train_groups.len(),
                self.config.n_splits
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut by_class = ids_by_class(&train_groups);
        for members in by_class.values_mut() {
            members.shuffle(&mut rng);
        }
        let folds = stratified_folds(by_class, self.config.n_splits, &mut rng);
        SplitAssignment::new(test, folds)
    }

    /// Write the assignment as a JSON document, creating parent directories
    pub fn save(assignment: &SplitAssignment, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &assignment.to_document())?;
        writer.flush()?;
        debug!(path = %path.display(), "Saved split document");
        Ok(())
    }

    /// Read a JSON split document and validate it
    pub fn load(path: impl AsRef<Path>) -> Result<SplitAssignment> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CvError::MissingSplitFile(path.to_path_buf()));
        }
        let json = std::fs::read_to_string(path)?;
        let doc: SplitDocument = serde_json::from_str(&json)?;
        let assignment = SplitAssignment::from_document(doc)?;
        debug!(
            path = %path.display(),
            n_folds = assignment.n_folds(),
            "Loaded split document"
        );
        Ok(assignment)
    }
}

/// Collapse rows to one label per id
fn group_labels(ids: &[CaseId], labels: &[i64]) -> Result<BTreeMap<CaseId, i64>> {
    if ids.len() != labels.len() {
        return Err(CvError::ShapeError {
            expected: format!("{} labels", ids.len()),
            actual: format!("{} labels", labels.len()),
        });
    }

    let mut seen: BTreeMap<&CaseId, BTreeSet<i64>> = BTreeMap::new();
    for (id, &label) in ids.iter().zip(labels) {
        seen.entry(id).or_default().insert(label);
    }

    let mut groups = BTreeMap::new();
    for (id, labels) in seen {
        if labels.len() > 1 {
            return Err(CvError::InconsistentIdLabel {
                id: id.to_string(),
                labels: labels.into_iter().collect(),
            });
        }
        if let Some(&label) = labels.iter().next() {
            groups.insert(id.clone(), label);
        }
    }
    Ok(groups)
}

fn ids_by_class(groups: &BTreeMap<CaseId, i64>) -> BTreeMap<i64, Vec<CaseId>> {
    let mut by_class: BTreeMap<i64, Vec<CaseId>> = BTreeMap::new();
    for (id, &label) in groups {
        by_class.entry(label).or_default().push(id.clone());
    }
    by_class
}

/// Split `total` over classes proportionally to their sizes (largest remainder)
fn allocate_proportionally(sizes: &[(i64, usize)], total: usize) -> Vec<(i64, usize)> {
    let n: usize = sizes.iter().map(|(_, s)| s).sum();
    if n == 0 {
        return Vec::new();
    }

    let mut quotas: Vec<(i64, usize, f64)> = sizes
        .iter()
        .map(|&(class, size)| {
            let exact = size as f64 * total as f64 / n as f64;
            let floor = exact.floor() as usize;
            (class, floor.min(size), exact - floor as f64)
        })
        .collect();

    let assigned: usize = quotas.iter().map(|(_, q, _)| q).sum();
    let mut remaining = total.saturating_sub(assigned);

    let mut order: Vec<usize> = (0..quotas.len()).collect();
    order.sort_by(|&a, &b| {
        quotas[b]
            .2
            .partial_cmp(&quotas[a].2)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(quotas[a].0.cmp(&quotas[b].0))
    });
    for idx in order {
        if remaining == 0 {
            break;
        }
        let size = sizes[idx].1;
        if quotas[idx].1 < size {
            quotas[idx].1 += 1;
            remaining -= 1;
        }
    }

    quotas.into_iter().map(|(c, q, _)| (c, q)).collect()
}

/// Deal each (shuffled) class round robin over the folds. The counter runs on
/// across classes so fold sizes differ by at most one.
fn stratified_folds(
    by_class: BTreeMap<i64, Vec<CaseId>>,
    n_splits: usize,
    rng: &mut ChaCha8Rng,
) -> Vec<Fold> {
    let mut buckets: Vec<BTreeSet<CaseId>> = vec![BTreeSet::new(); n_splits];
    let mut counter = 0usize;
    for (_, mut members) in by_class {
        members.shuffle(rng);
        for id in members {
            buckets[counter % n_splits].insert(id);
            counter += 1;
        }
    }

    (0..n_splits)
        .map(|fold_idx| {
            let train = buckets
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != fold_idx)
                .flat_map(|(_, b)| b.iter().cloned())
                .collect();
            Fold {
                train,
                val: buckets[fold_idx].clone(),
            }
        })
        .collect()
}
