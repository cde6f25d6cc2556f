//! Model capability contract and model family tables

use crate::dataset::Partition;
use crate::error::{CvError, Result};
use crate::optimizer::{ParamGrid, ParamSet, SearchSpace};
use crate::preprocessing::{PreprocessingConfig, Preprocessor};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Model family; selects the static parameter grid and trial space
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFamily {
    RandomForest,
    XGBoost,
    LogisticRegression,
    Svm,
    /// A family without predefined search tables
    Custom(String),
}

impl ModelFamily {
    pub fn name(&self) -> &str {
        match self {
            ModelFamily::RandomForest => "RandomForest",
            ModelFamily::XGBoost => "XGBoost",
            ModelFamily::LogisticRegression => "LogisticRegression",
            ModelFamily::Svm => "SVM",
            ModelFamily::Custom(name) => name,
        }
    }

    /// Exhaustive grid used by grid search
    pub fn param_grid(&self) -> Result<ParamGrid> {
        let grid = match self {
            ModelFamily::RandomForest => ParamGrid::new()
                .axis("n_estimators", vec![200i64, 600, 1000])
                .axis("max_features", vec!["sqrt", "log2"])
                .axis("max_depth", vec![Some(10i64), Some(50), None])
                .axis("min_samples_split", vec![2i64, 5, 10])
                .axis("min_samples_leaf", vec![1i64, 4])
                .axis("bootstrap", vec![true, false]),
            ModelFamily::XGBoost => ParamGrid::new()
                .axis("learning_rate", vec![0.05, 0.10, 0.20, 0.30])
                .axis("max_depth", vec![2i64, 4, 8, 12, 15])
                .axis("min_child_weight", vec![1i64, 3, 7])
                .axis("gamma", vec![0.0, 0.1, 0.3])
                .axis("colsample_bytree", vec![0.3, 0.5, 0.7]),
            ModelFamily::LogisticRegression => ParamGrid::new()
                .axis("C", vec![0.001, 0.01, 0.1, 1.0, 10.0, 100.0, 1000.0])
                .axis("penalty", vec!["l1", "l2", "elasticnet", "none"]),
            ModelFamily::Svm => ParamGrid::new()
                .axis("kernel", vec!["rbf"])
                .axis("C", vec![0.001, 0.01, 0.1, 1.0, 10.0])
                .axis("gamma", vec![0.001, 0.01, 0.1, 1.0]),
            ModelFamily::Custom(name) => return Err(CvError::NoParamGridDefined(name.clone())),
        };
        Ok(grid)
    }

    /// Sampling space used by trial search
    pub fn search_space(&self) -> Result<SearchSpace> {
        let space = match self {
            ModelFamily::RandomForest => SearchSpace::new()
                .int("n_estimators", 50, 1000)
                .categorical("max_features", vec!["sqrt", "log2"])
                .int("max_depth", 2, 50)
                .int("min_samples_split", 2, 10)
                .int("min_samples_leaf", 1, 4)
                .boolean("bootstrap"),
            ModelFamily::XGBoost => SearchSpace::new()
                .log_float("learning_rate", 0.01, 0.3)
                .int("max_depth", 2, 15)
                .int("min_child_weight", 1, 7)
                .float("gamma", 0.0, 0.3)
                .float("colsample_bytree", 0.3, 1.0),
            ModelFamily::LogisticRegression => SearchSpace::new()
                .log_float("C", 1e-3, 1e3)
                .categorical("penalty", vec!["l1", "l2", "elasticnet", "none"])
                .float("l1_ratio", 0.0, 1.0),
            ModelFamily::Svm => SearchSpace::new()
                .categorical("kernel", vec!["rbf"])
                .log_float("C", 1e-3, 10.0)
                .log_float("gamma", 1e-3, 1.0),
            ModelFamily::Custom(name) => return Err(CvError::NoParamGridDefined(name.clone())),
        };
        Ok(space)
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ModelFamily {
    type Err = CvError;

    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        Ok(match key.as_str() {
            "randomforest" | "rf" => ModelFamily::RandomForest,
            "xgboost" | "xgb" => ModelFamily::XGBoost,
            "logisticregression" | "logreg" | "lr" => ModelFamily::LogisticRegression,
            "svm" | "svc" => ModelFamily::Svm,
            _ => ModelFamily::Custom(s.to_string()),
        })
    }
}

/// Binary classifier as seen by the harness.
///
/// Implementations are cloned per fold and per search candidate, so `fit`
/// only ever touches the receiver's own state.
pub trait ModelAdapter: Send + Sync + fmt::Debug {
    /// Unique name within a run; used for result columns and cache files
    fn name(&self) -> &str;

    fn family(&self) -> ModelFamily;

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predicted class label per row
    fn predict_label(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Probability of the positive (larger) class per row
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    fn get_params(&self) -> ParamSet;

    fn set_params(&mut self, params: &ParamSet) -> Result<()>;

    fn clone_box(&self) -> Box<dyn ModelAdapter>;

    fn param_grid(&self) -> Result<ParamGrid> {
        self.family().param_grid()
    }

    fn search_space(&self) -> Result<SearchSpace> {
        self.family().search_space()
    }
}

impl Clone for Box<dyn ModelAdapter> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A model fitted on a full training partition, with the preprocessing its
/// inputs go through before prediction
#[derive(Debug, Clone)]
pub struct FittedModel {
    model: Box<dyn ModelAdapter>,
    preprocessor: Option<Preprocessor>,
}

impl FittedModel {
    /// Fit a clone of `model` on `train`. With a preprocessing config, a
    /// preprocessor is fitted on `train` first and kept for prediction.
    pub fn fit(
        model: &dyn ModelAdapter,
        train: &Partition,
        preprocessing: Option<&PreprocessingConfig>,
    ) -> Result<Self> {
        let preprocessor = preprocessing
            .map(|config| Preprocessor::new(config.clone()).fit(train))
            .transpose()?;
        let mut fitted = model.clone_box();
        match &preprocessor {
            Some(preprocessor) => {
                let train = preprocessor.transform(train)?;
                fitted.fit(train.x(), train.y())?;
            }
            None => fitted.fit(train.x(), train.y())?,
        }
        Ok(Self {
            model: fitted,
            preprocessor,
        })
    }

    /// Attach the preprocessor the training partition had already been
    /// through, so prediction accepts raw partitions
    pub fn with_preprocessor(mut self, preprocessor: Option<Preprocessor>) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    pub fn model(&self) -> &dyn ModelAdapter {
        self.model.as_ref()
    }

    pub fn preprocessor(&self) -> Option<&Preprocessor> {
        self.preprocessor.as_ref()
    }

    /// Predicted labels and positive-class probabilities for a partition
    pub fn predict(&self, partition: &Partition) -> Result<(Array1<f64>, Array1<f64>)> {
        let transformed;
        let input = match &self.preprocessor {
            Some(preprocessor) => {
                transformed = preprocessor.transform(partition)?;
                &transformed
            }
            None => partition,
        };
        let labels = self.model.predict_label(input.x())?;
        let proba = self.model.predict_proba(input.x())?;
        Ok((labels, proba))
    }
}

/// Negative and positive class of a binary target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinaryClasses {
    pub negative: f64,
    pub positive: f64,
}

impl BinaryClasses {
    /// The two distinct labels of `y`; the larger one is positive
    pub fn from_labels(y: &Array1<f64>) -> Result<Self> {
        let mut classes: Vec<f64> = y.iter().copied().collect();
        classes.sort_by(|a, b| a.total_cmp(b));
        classes.dedup();
        match classes.as_slice() {
            [negative, positive] => Ok(Self {
                negative: *negative,
                positive: *positive,
            }),
            other => Err(CvError::ModelFit(format!(
                "binary classification needs exactly two classes, found {}",
                other.len()
            ))),
        }
    }

    /// 1.0 for the positive class, 0.0 otherwise
    pub fn encode(&self, y: &Array1<f64>) -> Array1<f64> {
        y.mapv(|v| if v == self.positive { 1.0 } else { 0.0 })
    }

    pub fn decode(&self, proba: &Array1<f64>) -> Array1<f64> {
        proba.mapv(|p| if p >= 0.5 { self.positive } else { self.negative })
    }
}

pub(crate) fn check_shapes(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(CvError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(CvError::ModelFit("cannot fit on zero rows".to_string()));
    }
    Ok(())
}

/// Reject parameter names the model does not know
pub(crate) fn check_known_params(model: &str, params: &ParamSet, known: &[&str]) -> Result<()> {
    match params.iter().find(|(name, _)| !known.contains(&name.as_str())) {
        Some((name, value)) => Err(CvError::InvalidParameter {
            name: name.clone(),
            value: value.to_string(),
            reason: format!("not a parameter of {}", model),
        }),
        None => Ok(()),
    }
}
