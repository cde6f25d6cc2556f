//! Random forest adapter

use super::decision_tree::DecisionTree;
use super::model::{check_known_params, check_shapes, BinaryClasses, ModelAdapter, ModelFamily};
use crate::error::{CvError, Result};
use crate::optimizer::{ParamSet, ParamValue};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Strategy for features considered per split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    Fraction(f64),
    Fixed(usize),
    All,
}

impl MaxFeatures {
    fn resolve(&self, n_features: usize) -> usize {
        match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::Fixed(n) => (*n).min(n_features),
            MaxFeatures::All => n_features,
        }
        .max(1)
    }

    fn to_param(self) -> ParamValue {
        match self {
            MaxFeatures::Sqrt => ParamValue::from("sqrt"),
            MaxFeatures::Log2 => ParamValue::from("log2"),
            MaxFeatures::Fraction(f) => ParamValue::Float(f),
            MaxFeatures::Fixed(n) => ParamValue::Int(n as i64),
            MaxFeatures::All => ParamValue::Null,
        }
    }

    fn from_param(value: &ParamValue) -> Result<Self> {
        let parsed = match value {
            ParamValue::Str(s) if s == "sqrt" || s == "auto" => Some(MaxFeatures::Sqrt),
            ParamValue::Str(s) if s == "log2" => Some(MaxFeatures::Log2),
            ParamValue::Null => Some(MaxFeatures::All),
            ParamValue::Int(n) if *n >= 1 => Some(MaxFeatures::Fixed(*n as usize)),
            ParamValue::Float(f) if *f > 0.0 && *f <= 1.0 => Some(MaxFeatures::Fraction(*f)),
            _ => None,
        };
        parsed.ok_or_else(|| CvError::InvalidParameter {
            name: "max_features".to_string(),
            value: value.to_string(),
            reason: "expected sqrt, log2, null, a count or a fraction".to_string(),
        })
    }
}

const PARAMS: &[&str] = &[
    "n_estimators",
    "max_features",
    "max_depth",
    "min_samples_split",
    "min_samples_leaf",
    "bootstrap",
    "random_state",
];

/// Bagged Gini trees; probabilities are the mean leaf fraction across trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestModel {
    name: String,
    n_estimators: usize,
    max_features: MaxFeatures,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    bootstrap: bool,
    random_state: u64,
    trees: Vec<DecisionTree>,
    classes: Option<BinaryClasses>,
}

impl Default for RandomForestModel {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomForestModel {
    pub fn new() -> Self {
        Self {
            name: ModelFamily::RandomForest.name().to_string(),
            n_estimators: 100,
            max_features: MaxFeatures::Sqrt,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            bootstrap: true,
            random_state: 42,
            trees: Vec::new(),
            classes: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n.max(1);
        self
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

fn positive_usize(name: &str, value: i64, min: i64) -> Result<usize> {
    if value < min {
        return Err(CvError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: format!("must be at least {}", min),
        });
    }
    Ok(value as usize)
}

impl ModelAdapter for RandomForestModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::RandomForest
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        let classes = BinaryClasses::from_labels(y)?;
        let target = classes.encode(y);
        let n_samples = x.nrows();
        let max_features = self.max_features.resolve(x.ncols());

        let trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.wrapping_add(tree_idx as u64));
                let indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let mut tree = DecisionTree::new()
                    .with_max_depth(self.max_depth)
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(Some(max_features));
                tree.fit(x, &target, indices, &mut rng)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.classes = Some(classes);
        Ok(())
    }

    fn predict_label(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let classes = self.classes.ok_or(CvError::ModelNotFitted)?;
        Ok(classes.decode(&self.predict_proba(x)?))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(CvError::ModelNotFitted);
        }
        let mut total = Array1::<f64>::zeros(x.nrows());
        for tree in &self.trees {
            total += &tree.predict_proba(x)?;
        }
        Ok(total / self.trees.len() as f64)
    }

    fn get_params(&self) -> ParamSet {
        ParamSet::new()
            .with("n_estimators", self.n_estimators as i64)
            .with("max_features", self.max_features.to_param())
            .with("max_depth", self.max_depth.map(|d| d as i64))
            .with("min_samples_split", self.min_samples_split as i64)
            .with("min_samples_leaf", self.min_samples_leaf as i64)
            .with("bootstrap", self.bootstrap)
            .with("random_state", self.random_state as i64)
    }

    fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        check_known_params(&self.name, params, PARAMS)?;
        let mut next = self.clone();
        if let Some(n) = params.i64_param("n_estimators")? {
            next.n_estimators = positive_usize("n_estimators", n, 1)?;
        }
        if let Some(value) = params.get("max_features") {
            next.max_features = MaxFeatures::from_param(value)?;
        }
        if params.get("max_depth").is_some() {
            next.max_depth = params
                .i64_param("max_depth")?
                .map(|d| positive_usize("max_depth", d, 1))
                .transpose()?;
        }
        if let Some(n) = params.i64_param("min_samples_split")? {
            next.min_samples_split = positive_usize("min_samples_split", n, 2)?;
        }
        if let Some(n) = params.i64_param("min_samples_leaf")? {
            next.min_samples_leaf = positive_usize("min_samples_leaf", n, 1)?;
        }
        if let Some(bootstrap) = params.bool_param("bootstrap")? {
            next.bootstrap = bootstrap;
        }
        if let Some(seed) = params.i64_param("random_state")? {
            next.random_state = seed as u64;
        }
        *self = next;
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn ModelAdapter> {
        Box::new(self.clone())
    }
}
