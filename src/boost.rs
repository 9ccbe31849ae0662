//! Multi-class gradient-boosted decision trees.
//!
//! Each boosting round fits one regression tree per class to the gradient
//! and hessian of the softmax log-loss, using second-order split gain and
//! leaf weights `-G / (H + lambda)`. Raw scores are summed over rounds and
//! turned into probabilities with a softmax.
//!
//! The estimator plugs into linfa: [`GradientBoostingParams`] is a
//! [`ParamGuard`], [`GradientBoostingValidParams`] implements [`Fit`] and the
//! fitted [`GradientBoostingClassifier`] implements [`PredictInplace`].

use linfa::prelude::{DatasetBase, Fit, ParamGuard, PredictInplace};
use ndarray::{Array1, Array2, ArrayBase, ArrayView1, ArrayView2, ArrayViewMut1, Data, Ix2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoostError {
    #[error("invalid booster parameter: {0}")]
    InvalidParams(String),
    #[error("cannot fit on an empty dataset")]
    EmptyDataset,
    #[error("records have {records} rows but targets have {targets}")]
    MismatchedRows { records: usize, targets: usize },
    #[error("label {label} is out of range for {n_classes} classes")]
    LabelOutOfRange { label: usize, n_classes: usize },
    #[error("expected {expected} features, got {got}")]
    FeatureCount { expected: usize, got: usize },
    #[error(transparent)]
    Linfa(#[from] linfa::error::Error),
}

/// Validated hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingValidParams {
    n_estimators: usize,
    max_depth: usize,
    learning_rate: f64,
    lambda: f64,
    min_child_weight: f64,
    n_classes: Option<usize>,
}

impl GradientBoostingValidParams {
    pub fn n_estimators(&self) -> usize {
        self.n_estimators
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}

/// Unchecked hyperparameters. Defaults: 100 rounds, depth 4, eta 0.3, lambda 1.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientBoostingParams(GradientBoostingValidParams);

impl Default for GradientBoostingParams {
    fn default() -> Self {
        GradientBoostingParams(GradientBoostingValidParams {
            n_estimators: 100,
            max_depth: 4,
            learning_rate: 0.3,
            lambda: 1.0,
            min_child_weight: 1.0,
            n_classes: None,
        })
    }
}

impl GradientBoostingParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_estimators(mut self, n: usize) -> Self {
        self.0.n_estimators = n;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.0.max_depth = depth;
        self
    }

    pub fn learning_rate(mut self, eta: f64) -> Self {
        self.0.learning_rate = eta;
        self
    }

    /// L2 regularisation on leaf weights.
    pub fn lambda(mut self, lambda: f64) -> Self {
        self.0.lambda = lambda;
        self
    }

    /// Minimum hessian sum required in each child of a split.
    pub fn min_child_weight(mut self, weight: f64) -> Self {
        self.0.min_child_weight = weight;
        self
    }

    /// Fixes the number of output classes. Without it the count is
    /// `max(label) + 1` of the training targets.
    pub fn n_classes(mut self, n: usize) -> Self {
        self.0.n_classes = Some(n);
        self
    }
}

impl ParamGuard for GradientBoostingParams {
    type Checked = GradientBoostingValidParams;
    type Error = BoostError;

    fn check_ref(&self) -> Result<&Self::Checked, Self::Error> {
        let p = &self.0;
        if p.n_estimators == 0 {
            return Err(BoostError::InvalidParams("n_estimators must be at least 1".into()));
        }
        if p.max_depth == 0 {
            return Err(BoostError::InvalidParams("max_depth must be at least 1".into()));
        }
        if !(p.learning_rate.is_finite() && p.learning_rate > 0.0) {
            return Err(BoostError::InvalidParams(format!(
                "learning_rate must be positive, got {}",
                p.learning_rate
            )));
        }
        if !(p.lambda.is_finite() && p.lambda >= 0.0) {
            return Err(BoostError::InvalidParams(format!("lambda must be >= 0, got {}", p.lambda)));
        }
        if !(p.min_child_weight.is_finite() && p.min_child_weight >= 0.0) {
            return Err(BoostError::InvalidParams(format!(
                "min_child_weight must be >= 0, got {}",
                p.min_child_weight
            )));
        }
        if p.n_classes.is_some_and(|k| k < 2) {
            return Err(BoostError::InvalidParams("n_classes must be at least 2".into()));
        }
        Ok(p)
    }

    fn check(self) -> Result<Self::Checked, Self::Error> {
        self.check_ref()?;
        Ok(self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf { value: f64 },
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

/// Regression tree stored as a flat node list; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split { feature, threshold, left, right } => {
                    idx = if row[*feature] < *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, Node::Leaf { .. })).count()
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Grows one tree. `'x` is the dataset borrow; `'g` covers the per-class
/// gradient buffers, which are rewritten between trees.
struct TreeBuilder<'x, 'g> {
    x: ArrayView2<'x, f64>,
    grad: &'g [f64],
    hess: &'g [f64],
    params: &'g GradientBoostingValidParams,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_, '_> {
    fn leaf_weight(&self, g: f64, h: f64) -> f64 {
        -g / (h + self.params.lambda) * self.params.learning_rate
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.params.lambda)
    }

    fn best_split(&self, rows: &[usize], g_total: f64, h_total: f64) -> Option<SplitCandidate> {
        let parent = self.score(g_total, h_total);
        let mut best: Option<SplitCandidate> = None;
        let mut sorted = rows.to_vec();

        for feature in 0..self.x.ncols() {
            sorted.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));
            let (mut gl, mut hl) = (0.0, 0.0);
            for w in 0..sorted.len() - 1 {
                let i = sorted[w];
                gl += self.grad[i];
                hl += self.hess[i];
                let here = self.x[[i, feature]];
                let next = self.x[[sorted[w + 1], feature]];
                if here == next {
                    continue;
                }
                let (gr, hr) = (g_total - gl, h_total - hl);
                if hl < self.params.min_child_weight || hr < self.params.min_child_weight {
                    continue;
                }
                let gain = self.score(gl, hl) + self.score(gr, hr) - parent;
                if gain > 1e-12 && best.as_ref().is_none_or(|b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: (here + next) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }

    fn build(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let g: f64 = rows.iter().map(|&i| self.grad[i]).sum();
        let h: f64 = rows.iter().map(|&i| self.hess[i]).sum();
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { value: self.leaf_weight(g, h) });

        if depth >= self.params.max_depth || rows.len() < 2 {
            return id;
        }
        let Some(split) = self.best_split(&rows, g, h) else {
            return id;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&i| self.x[[i, split.feature]] < split.threshold);
        let left = self.build(left_rows, depth + 1);
        let right = self.build(right_rows, depth + 1);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }
}

/// Fitted multi-class gradient-boosted tree ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    n_features: usize,
    n_classes: usize,
    /// `rounds[r][c]` is the tree for class `c` in round `r`.
    rounds: Vec<Vec<RegressionTree>>,
}

impl GradientBoostingClassifier {
    pub fn params() -> GradientBoostingParams {
        GradientBoostingParams::new()
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_rounds(&self) -> usize {
        self.rounds.len()
    }

    fn raw_scores(&self, x: ArrayView2<f64>) -> Array2<f64> {
        let mut scores = Array2::zeros((x.nrows(), self.n_classes));
        for (row, mut out) in x.rows().into_iter().zip(scores.rows_mut()) {
            for trees in &self.rounds {
                for (c, tree) in trees.iter().enumerate() {
                    out[c] += tree.predict_row(row);
                }
            }
        }
        scores
    }

    /// Per-class probabilities, one row per input row. Each row sums to 1.
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, BoostError> {
        if x.ncols() != self.n_features {
            return Err(BoostError::FeatureCount {
                expected: self.n_features,
                got: x.ncols(),
            });
        }
        let mut scores = self.raw_scores(x);
        for row in scores.rows_mut() {
            softmax_inplace(row);
        }
        Ok(scores)
    }
}

fn softmax_inplace(mut scores: ArrayViewMut1<f64>) {
    let max = scores.fold(f64::NEG_INFINITY, |m, &s| m.max(s));
    scores.mapv_inplace(|s| (s - max).exp());
    let sum = scores.sum();
    scores /= sum;
}

fn argmax(row: ArrayView1<f64>) -> usize {
    let mut best = 0;
    for (i, &v) in row.iter().enumerate() {
        if v > row[best] {
            best = i;
        }
    }
    best
}

impl Fit<Array2<f64>, Array1<usize>, BoostError> for GradientBoostingValidParams {
    type Object = GradientBoostingClassifier;

    fn fit(&self, dataset: &DatasetBase<Array2<f64>, Array1<usize>>) -> Result<Self::Object, BoostError> {
        let x = dataset.records.view();
        let y = &dataset.targets;
        let n = x.nrows();

        if n == 0 {
            return Err(BoostError::EmptyDataset);
        }
        if y.len() != n {
            return Err(BoostError::MismatchedRows {
                records: n,
                targets: y.len(),
            });
        }
        let max_label = y.iter().copied().max().unwrap_or(0);
        let n_classes = self.n_classes.unwrap_or(max_label + 1).max(2);
        if max_label >= n_classes {
            return Err(BoostError::LabelOutOfRange {
                label: max_label,
                n_classes,
            });
        }

        let mut scores = Array2::<f64>::zeros((n, n_classes));
        let mut rounds = Vec::with_capacity(self.n_estimators);
        let mut grad = vec![0.0; n];
        let mut hess = vec![0.0; n];

        for _ in 0..self.n_estimators {
            let mut probs = scores.clone();
            for row in probs.rows_mut() {
                softmax_inplace(row);
            }

            let mut trees = Vec::with_capacity(n_classes);
            for c in 0..n_classes {
                for i in 0..n {
                    let p = probs[[i, c]];
                    let target = if y[i] == c { 1.0 } else { 0.0 };
                    grad[i] = p - target;
                    hess[i] = (p * (1.0 - p)).max(1e-16);
                }
                let mut builder = TreeBuilder {
                    x: x.view(),
                    grad: &grad,
                    hess: &hess,
                    params: self,
                    nodes: Vec::new(),
                };
                builder.build((0..n).collect(), 0);
                let tree = RegressionTree { nodes: builder.nodes };

                for (i, s) in scores.column_mut(c).iter_mut().enumerate() {
                    *s += tree.predict_row(x.row(i));
                }
                trees.push(tree);
            }
            rounds.push(trees);
        }

        Ok(GradientBoostingClassifier {
            n_features: x.ncols(),
            n_classes,
            rounds,
        })
    }
}

impl<D: Data<Elem = f64>> PredictInplace<ArrayBase<D, Ix2>, Array1<usize>> for GradientBoostingClassifier {
    fn predict_inplace(&self, x: &ArrayBase<D, Ix2>, y: &mut Array1<usize>) {
        assert_eq!(
            x.nrows(),
            y.len(),
            "the number of data points must match the number of output targets"
        );
        assert_eq!(x.ncols(), self.n_features, "feature count must match the fitted model");
        let scores = self.raw_scores(x.view());
        for (row, target) in scores.rows().into_iter().zip(y.iter_mut()) {
            *target = argmax(row);
        }
    }

    fn default_target(&self, x: &ArrayBase<D, Ix2>) -> Array1<usize> {
        Array1::zeros(x.nrows())
    }
}
