//! Binary CART tree with Gini impurity

use crate::error::{CvError, Result};
use ndarray::{Array1, Array2};
use rand::seq::index::sample;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf holding the positive-class fraction of its samples
    Leaf { value: f64, n_samples: usize },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

/// Classification tree on 0/1 targets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn at random per node; all when unset
    pub max_features: Option<usize>,
    n_features: usize,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

fn gini(n_pos: f64, n: f64) -> f64 {
    if n == 0.0 {
        return 0.0;
    }
    let p = n_pos / n;
    2.0 * p * (1.0 - p)
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            n_features: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Fit on rows `indices` of `x`; `y` holds 0/1 targets
    pub fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: Vec<usize>,
        rng: &mut impl Rng,
    ) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(CvError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if indices.is_empty() {
            return Err(CvError::ModelFit("tree needs at least one sample".to_string()));
        }
        self.n_features = x.ncols();
        self.root = Some(self.build(x, y, indices, 0, rng));
        Ok(())
    }

    fn build(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: Vec<usize>,
        depth: usize,
        rng: &mut impl Rng,
    ) -> TreeNode {
        let n = indices.len();
        let n_pos: f64 = indices.iter().map(|&i| y[i]).sum();
        let leaf = TreeNode::Leaf {
            value: n_pos / n as f64,
            n_samples: n,
        };

        let pure = n_pos == 0.0 || n_pos == n as f64;
        if pure || n < self.min_samples_split || self.max_depth.is_some_and(|d| depth >= d) {
            return leaf;
        }

        let Some((feature_idx, threshold)) = self.best_split(x, y, &indices, n_pos, rng) else {
            return leaf;
        };
        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| x[[i, feature_idx]] <= threshold);

        TreeNode::Split {
            feature_idx,
            threshold,
            left: Box::new(self.build(x, y, left, depth + 1, rng)),
            right: Box::new(self.build(x, y, right, depth + 1, rng)),
        }
    }

    fn best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        n_pos: f64,
        rng: &mut impl Rng,
    ) -> Option<(usize, f64)> {
        let n_features = x.ncols();
        let features: Vec<usize> = match self.max_features {
            Some(m) if m < n_features => sample(rng, n_features, m.max(1)).into_vec(),
            _ => (0..n_features).collect(),
        };

        let n = indices.len() as f64;
        let parent = gini(n_pos, n);
        let mut best: Option<(usize, f64, f64)> = None;
        let mut sorted = indices.to_vec();

        for feature_idx in features {
            sorted.sort_by(|&a, &b| x[[a, feature_idx]].total_cmp(&x[[b, feature_idx]]));

            let mut left_n = 0.0;
            let mut left_pos = 0.0;
            for pair in sorted.windows(2) {
                left_n += 1.0;
                left_pos += y[pair[0]];
                let (lo, hi) = (x[[pair[0], feature_idx]], x[[pair[1], feature_idx]]);
                if lo == hi
                    || left_n < self.min_samples_leaf as f64
                    || n - left_n < self.min_samples_leaf as f64
                {
                    continue;
                }

                let weighted = (left_n * gini(left_pos, left_n)
                    + (n - left_n) * gini(n_pos - left_pos, n - left_n))
                    / n;
                let gain = parent - weighted;
                if gain > 1e-12 && best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature_idx, (lo + hi) / 2.0, gain));
                }
            }
        }

        best.map(|(feature_idx, threshold, _)| (feature_idx, threshold))
    }

    /// Positive-class fraction of the leaf each row falls into
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(CvError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(CvError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let mut node = root;
                loop {
                    match node {
                        TreeNode::Leaf { value, .. } => break *value,
                        TreeNode::Split {
                            feature_idx,
                            threshold,
                            left,
                            right,
                        } => {
                            node = if row[*feature_idx] <= *threshold { &**left } else { &**right };
                        }
                    }
                }
            })
            .collect())
    }

    pub fn depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
            }
        }
        self.root.as_ref().map_or(0, node_depth)
    }
}
