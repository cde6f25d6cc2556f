//! Synthetic minority oversampling of training partitions

use crate::error::{CvError, Result};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Distance/index pair ordered by distance, then index
#[derive(Debug, Clone, Copy)]
struct DistIdx(f64, usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0).then(self.1.cmp(&other.1))
    }
}

/// Oversampling method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OversamplingMethod {
    /// SMOTE: interpolate between a class member and one of its k nearest
    /// neighbours of the same class until every class matches the majority
    Smote { k_neighbors: usize, seed: u64 },
}

impl Default for OversamplingMethod {
    fn default() -> Self {
        OversamplingMethod::Smote {
            k_neighbors: 5,
            seed: 42,
        }
    }
}

/// Rows generated by an oversampler
#[derive(Debug, Clone)]
pub struct SyntheticRows {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    /// Index of the input row each synthetic row was interpolated from
    pub sources: Vec<usize>,
}

impl SyntheticRows {
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl OversamplingMethod {
    pub fn name(&self) -> &'static str {
        match self {
            OversamplingMethod::Smote { .. } => "smote",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            OversamplingMethod::Smote { k_neighbors: 0, .. } => Err(CvError::InvalidParameter {
                name: "k_neighbors".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            }),
            OversamplingMethod::Smote { .. } => Ok(()),
        }
    }

    /// Synthetic rows that bring every class up to the majority count.
    ///
    /// The input rows are not part of the result. A partition with a single
    /// class gets no synthetic rows.
    pub fn resample(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<SyntheticRows> {
        self.validate()?;
        if x.nrows() != y.len() {
            return Err(CvError::ShapeError {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }
        let OversamplingMethod::Smote { k_neighbors, seed } = self;

        let classes = class_members(y);
        let majority = classes.iter().map(|(_, rows)| rows.len()).max().unwrap_or(0);
        let mut rng = ChaCha8Rng::seed_from_u64(*seed);
        let mut values = Vec::new();
        let mut labels = Vec::new();
        let mut sources = Vec::new();

        if classes.len() > 1 {
            for (label, rows) in &classes {
                for _ in rows.len()..majority {
                    let pick = rows[rng.gen_range(0..rows.len())];
                    let neighbors = nearest_neighbors(x, pick, rows, *k_neighbors);
                    // A lone class member is duplicated
                    let partner = match neighbors.len() {
                        0 => pick,
                        n => neighbors[rng.gen_range(0..n)],
                    };
                    let gap: f64 = rng.gen();
                    let (a, b) = (x.row(pick), x.row(partner));
                    values.extend(a.iter().zip(b.iter()).map(|(&p, &q)| p + gap * (q - p)));
                    labels.push(*label);
                    sources.push(pick);
                }
            }
        }

        Ok(SyntheticRows {
            x: Array2::from_shape_vec((sources.len(), x.ncols()), values)?,
            y: Array1::from_vec(labels),
            sources,
        })
    }
}

/// Row indices per class, classes in ascending label order
fn class_members(y: &Array1<f64>) -> Vec<(f64, Vec<usize>)> {
    let mut classes: Vec<(f64, Vec<usize>)> = Vec::new();
    for (i, &label) in y.iter().enumerate() {
        match classes.iter_mut().find(|(l, _)| *l == label) {
            Some((_, rows)) => rows.push(i),
            None => classes.push((label, vec![i])),
        }
    }
    classes.sort_by(|a, b| a.0.total_cmp(&b.0));
    classes
}

/// The k rows of `candidates` closest to `point`, excluding `point` itself
fn nearest_neighbors(x: &Array2<f64>, point: usize, candidates: &[usize], k: usize) -> Vec<usize> {
    let origin = x.row(point);
    let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(k + 1);
    for &i in candidates.iter().filter(|&&i| i != point) {
        let dist: f64 = origin
            .iter()
            .zip(x.row(i).iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum();
        heap.push(DistIdx(dist, i));
        if heap.len() > k {
            heap.pop();
        }
    }
    let mut nearest: Vec<DistIdx> = heap.into_vec();
    nearest.sort();
    nearest.into_iter().map(|DistIdx(_, i)| i).collect()
}
