//! Logistic regression adapter

use super::model::{check_known_params, check_shapes, BinaryClasses, ModelAdapter, ModelFamily};
use crate::error::{CvError, Result};
use crate::optimizer::{ParamSet, ParamValue};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Regularisation penalty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Penalty {
    L1,
    L2,
    ElasticNet,
    None,
}

impl Penalty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Penalty::L1 => "l1",
            Penalty::L2 => "l2",
            Penalty::ElasticNet => "elasticnet",
            Penalty::None => "none",
        }
    }
}

impl FromStr for Penalty {
    type Err = CvError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "l1" => Ok(Penalty::L1),
            "l2" => Ok(Penalty::L2),
            "elasticnet" => Ok(Penalty::ElasticNet),
            "none" => Ok(Penalty::None),
            other => Err(CvError::InvalidParameter {
                name: "penalty".to_string(),
                value: other.to_string(),
                reason: "expected l1, l2, elasticnet or none".to_string(),
            }),
        }
    }
}

const PARAMS: &[&str] = &["C", "penalty", "l1_ratio", "max_iter", "learning_rate"];

/// Binary logistic regression fitted by (proximal) gradient descent.
///
/// The objective is the mean log loss plus the penalty scaled by
/// `1 / (C * n_samples)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegressionModel {
    name: String,
    c: f64,
    penalty: Penalty,
    l1_ratio: Option<f64>,
    max_iter: usize,
    learning_rate: f64,
    tol: f64,
    coefficients: Option<Array1<f64>>,
    intercept: f64,
    classes: Option<BinaryClasses>,
}

impl Default for LogisticRegressionModel {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegressionModel {
    pub fn new() -> Self {
        Self {
            name: ModelFamily::LogisticRegression.name().to_string(),
            c: 1.0,
            penalty: Penalty::L2,
            l1_ratio: None,
            max_iter: 1000,
            learning_rate: 0.1,
            tol: 1e-6,
            coefficients: None,
            intercept: 0.0,
            classes: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_c(mut self, c: f64) -> Result<Self> {
        self.c = validate_c(c)?;
        Ok(self)
    }

    pub fn with_penalty(mut self, penalty: Penalty) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn with_l1_ratio(mut self, l1_ratio: f64) -> Self {
        self.l1_ratio = Some(l1_ratio);
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    /// (l1 strength, l2 strength) per sample
    fn penalty_strengths(&self, n_samples: usize) -> Result<(f64, f64)> {
        let alpha = 1.0 / (self.c * n_samples as f64);
        Ok(match self.penalty {
            Penalty::None => (0.0, 0.0),
            Penalty::L1 => (alpha, 0.0),
            Penalty::L2 => (0.0, alpha),
            Penalty::ElasticNet => match self.l1_ratio {
                Some(r) if (0.0..=1.0).contains(&r) => (alpha * r, alpha * (1.0 - r)),
                _ => {
                    return Err(CvError::ModelFit(
                        "elasticnet penalty requires l1_ratio in [0, 1]".to_string(),
                    ))
                }
            },
        })
    }

    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }
}

fn validate_c(c: f64) -> Result<f64> {
    if c > 0.0 && c.is_finite() {
        Ok(c)
    } else {
        Err(CvError::InvalidParameter {
            name: "C".to_string(),
            value: c.to_string(),
            reason: "must be a positive number".to_string(),
        })
    }
}

fn soft_threshold(v: f64, t: f64) -> f64 {
    v.signum() * (v.abs() - t).max(0.0)
}

impl ModelAdapter for LogisticRegressionModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::LogisticRegression
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        let classes = BinaryClasses::from_labels(y)?;
        let target = classes.encode(y);
        let n_samples = x.nrows();
        let (l1, l2) = self.penalty_strengths(n_samples)?;

        let mut weights = Array1::zeros(x.ncols());
        let mut bias = 0.0;
        let lr = self.learning_rate;

        for _ in 0..self.max_iter {
            let predictions = Self::sigmoid(&(x.dot(&weights) + bias));
            let errors = &predictions - &target;
            let dw = x.t().dot(&errors) / n_samples as f64 + l2 * &weights;
            let db = errors.mean().unwrap_or(0.0);

            let step = lr * &dw;
            let updated = (&weights - &step).mapv(|w| soft_threshold(w, lr * l1));
            let change = (&updated - &weights).mapv(|v| v * v).sum() + (lr * db).powi(2);
            weights = updated;
            bias -= lr * db;

            if change.sqrt() < self.tol {
                break;
            }
        }

        if weights.iter().any(|w| !w.is_finite()) || !bias.is_finite() {
            return Err(CvError::ModelFit("logistic regression diverged".to_string()));
        }

        self.coefficients = Some(weights);
        self.intercept = bias;
        self.classes = Some(classes);
        Ok(())
    }

    fn predict_label(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let classes = self.classes.ok_or(CvError::ModelNotFitted)?;
        Ok(classes.decode(&self.predict_proba(x)?))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(CvError::ModelNotFitted)?;
        if x.ncols() != coefficients.len() {
            return Err(CvError::ShapeError {
                expected: format!("{} features", coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(Self::sigmoid(&(x.dot(coefficients) + self.intercept)))
    }

    fn get_params(&self) -> ParamSet {
        ParamSet::new()
            .with("C", self.c)
            .with("penalty", self.penalty.as_str())
            .with("l1_ratio", self.l1_ratio)
            .with("max_iter", self.max_iter as i64)
            .with("learning_rate", self.learning_rate)
    }

    fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        check_known_params(&self.name, params, PARAMS)?;
        let mut next = self.clone();
        if let Some(c) = params.f64_param("C")? {
            next.c = validate_c(c)?;
        }
        if let Some(penalty) = params.str_param("penalty")? {
            next.penalty = penalty.parse()?;
        }
        match params.get("l1_ratio") {
            Some(ParamValue::Null) => next.l1_ratio = None,
            Some(_) => next.l1_ratio = params.f64_param("l1_ratio")?,
            None => {}
        }
        if let Some(max_iter) = params.i64_param("max_iter")? {
            next.max_iter = usize::try_from(max_iter).map_err(|_| CvError::InvalidParameter {
                name: "max_iter".to_string(),
                value: max_iter.to_string(),
                reason: "must not be negative".to_string(),
            })?;
        }
        if let Some(lr) = params.f64_param("learning_rate")? {
            next.learning_rate = lr;
        }
        *self = next;
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn ModelAdapter> {
        Box::new(self.clone())
    }
}
