//! Evaluation metrics

use crate::error::{CvError, Result};
use ndarray::Array1;

/// Area under the ROC curve.
///
/// The larger of the two labels is the positive class. Uses the rank-sum
/// formulation, with tied scores sharing their average rank.
pub fn roc_auc(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<f64> {
    if y_true.len() != scores.len() {
        return Err(CvError::ShapeError {
            expected: format!("{} scores", y_true.len()),
            actual: format!("{} scores", scores.len()),
        });
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(CvError::MetricUndefined("AUC with non-finite scores".to_string()));
    }

    let positive = y_true.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let n_pos = y_true.iter().filter(|&&y| y == positive).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(CvError::MetricUndefined(
            "AUC needs both classes in y_true".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based average rank of the tie block i..=j
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = y_true
        .iter()
        .zip(&ranks)
        .filter(|(&y, _)| y == positive)
        .map(|(_, &r)| r)
        .sum();
    let n_pos = n_pos as f64;
    Ok((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64))
}

/// Fraction of correct labels
pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    if y_true.len() != y_pred.len() || y_true.is_empty() {
        return Err(CvError::ShapeError {
            expected: format!("{} non-empty predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / y_true.len() as f64)
}
