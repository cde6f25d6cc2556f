//! Feature selection algorithms
//!
//! Provides filter-style selectors scored on the training partition only:
//! - ANOVA F-test (k best)
//! - Mutual information (k best)
//! - Variance threshold

use crate::error::{CvError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Feature selection method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectionMethod {
    /// Select k features with the highest ANOVA F statistic
    Anova { k: usize },
    /// Select k features with the highest mutual information with the label
    MutualInformation { k: usize },
    /// Remove features with variance at or below threshold
    VarianceThreshold { threshold: f64 },
}

impl SelectionMethod {
    /// Short name, used when preprocessing variants are sampled by name
    pub fn name(&self) -> &'static str {
        match self {
            SelectionMethod::Anova { .. } => "anova",
            SelectionMethod::MutualInformation { .. } => "mutual_information",
            SelectionMethod::VarianceThreshold { .. } => "variance_threshold",
        }
    }
}

/// Feature selector for dimensionality reduction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSelector {
    method: SelectionMethod,
    selected_features: Option<Vec<usize>>,
    feature_scores: Option<Vec<f64>>,
    n_features_in: Option<usize>,
}

impl FeatureSelector {
    /// Create a new feature selector with the given method
    pub fn new(method: SelectionMethod) -> Self {
        Self {
            method,
            selected_features: None,
            feature_scores: None,
            n_features_in: None,
        }
    }

    pub fn method(&self) -> &SelectionMethod {
        &self.method
    }

    /// Fit the selector to data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(CvError::ShapeError {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }
        self.n_features_in = Some(x.ncols());

        let scores: Vec<f64> = match &self.method {
            SelectionMethod::Anova { .. } => x
                .columns()
                .into_iter()
                .map(|col| anova_f(col, y.view()))
                .collect(),
            SelectionMethod::MutualInformation { .. } => x
                .columns()
                .into_iter()
                .map(|col| mutual_information(col, y.view()))
                .collect(),
            SelectionMethod::VarianceThreshold { .. } => x
                .columns()
                .into_iter()
                .map(|col| {
                    let mean = col.mean().unwrap_or(0.0);
                    col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / col.len().max(1) as f64
                })
                .collect(),
        };

        let mut selected: Vec<usize> = match &self.method {
            SelectionMethod::Anova { k } | SelectionMethod::MutualInformation { k } => {
                top_k(&scores, *k)
            }
            SelectionMethod::VarianceThreshold { threshold } => scores
                .iter()
                .enumerate()
                .filter(|(_, &s)| s > *threshold)
                .map(|(i, _)| i)
                .collect(),
        };
        // Keep the source column order
        selected.sort_unstable();

        if selected.is_empty() {
            return Err(CvError::DataError(format!(
                "{} selection kept no features",
                self.method.name()
            )));
        }

        self.feature_scores = Some(scores);
        self.selected_features = Some(selected);
        Ok(())
    }

    /// Transform data by selecting features
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let selected = self
            .selected_features
            .as_ref()
            .ok_or(CvError::UnfittedPreprocessor)?;

        if let Some(n_in) = self.n_features_in {
            if x.ncols() != n_in {
                return Err(CvError::ShapeError {
                    expected: format!("{} columns", n_in),
                    actual: format!("{} columns", x.ncols()),
                });
            }
        }

        let mut result = Array2::zeros((x.nrows(), selected.len()));
        for (new_idx, &old_idx) in selected.iter().enumerate() {
            result.column_mut(new_idx).assign(&x.column(old_idx));
        }
        Ok(result)
    }

    /// Get selected feature indices
    pub fn selected_indices(&self) -> Option<&[usize]> {
        self.selected_features.as_deref()
    }

    /// Get feature scores
    pub fn scores(&self) -> Option<&[f64]> {
        self.feature_scores.as_deref()
    }
}

fn top_k(scores: &[f64], k: usize) -> Vec<usize> {
    let mut indexed: Vec<(usize, f64)> = scores.iter().copied().enumerate().collect();
    // NaN scores rank last; equal scores keep column order
    indexed.sort_by(|a, b| {
        let a_score = if a.1.is_nan() { f64::NEG_INFINITY } else { a.1 };
        let b_score = if b.1.is_nan() { f64::NEG_INFINITY } else { b.1 };
        b_score
            .partial_cmp(&a_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    indexed.into_iter().take(k.min(scores.len())).map(|(i, _)| i).collect()
}

/// One-way ANOVA F statistic of a feature across label classes
fn anova_f(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
    let mut groups: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
    for (&v, &label) in x.iter().zip(y.iter()) {
        groups.entry(label.round() as i64).or_default().push(v);
    }

    let n = x.len() as f64;
    let k = groups.len() as f64;
    if k < 2.0 || n <= k {
        return 0.0;
    }

    let grand_mean = x.sum() / n;
    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for values in groups.values() {
        let m = values.len() as f64;
        let mean = values.iter().sum::<f64>() / m;
        ss_between += m * (mean - grand_mean).powi(2);
        ss_within += values.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    }

    let ms_between = ss_between / (k - 1.0);
    let ms_within = ss_within / (n - k);
    if ms_within == 0.0 {
        return if ms_between > 0.0 { f64::INFINITY } else { 0.0 };
    }
    ms_between / ms_within
}

/// Mutual information between a discretised feature and the label
fn mutual_information(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
    let n = x.len() as f64;
    if n < 2.0 {
        return 0.0;
    }

    let n_bins = (n.sqrt() as usize).clamp(2, 20);
    let x_bins = discretize(x, n_bins);
    let y_classes: Vec<i64> = y.iter().map(|v| v.round() as i64).collect();

    let mut joint: HashMap<(usize, i64), usize> = HashMap::new();
    let mut x_counts: HashMap<usize, usize> = HashMap::new();
    let mut y_counts: HashMap<i64, usize> = HashMap::new();
    for (&xb, &yc) in x_bins.iter().zip(&y_classes) {
        *joint.entry((xb, yc)).or_insert(0) += 1;
        *x_counts.entry(xb).or_insert(0) += 1;
        *y_counts.entry(yc).or_insert(0) += 1;
    }

    joint
        .iter()
        .map(|(&(xb, yc), &count)| {
            let p_xy = count as f64 / n;
            let p_x = x_counts[&xb] as f64 / n;
            let p_y = y_counts[&yc] as f64 / n;
            p_xy * (p_xy / (p_x * p_y)).ln()
        })
        .sum::<f64>()
        .max(0.0)
}

fn discretize(x: ArrayView1<f64>, n_bins: usize) -> Vec<usize> {
    let min = x.iter().copied().fold(f64::INFINITY, f64::min);
    let max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range == 0.0 || !range.is_finite() {
        return vec![0; x.len()];
    }
    x.iter()
        .map(|&v| (((v - min) / range) * n_bins as f64).floor().min((n_bins - 1) as f64) as usize)
        .collect()
}
