//! CART decision trees stored as a flat node arena.
//!
//! Every node keeps its training cover (number of samples routed through it)
//! so the tree can be explained with path-dependent TreeSHAP. Classification
//! trees store class proportions at each node, regression trees the mean.

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::index;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::MaxFeatures;
use crate::error::{ImpactError, Result};

/// Minimum impurity decrease for a split to be kept.
const MIN_GAIN: f64 = 1e-12;

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Variance reduction (regression)
    MSE,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Split {
    pub feature: usize,
    pub threshold: f64,
    pub left: usize,
    pub right: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreeNode {
    pub cover: f64,
    pub value: Vec<f64>,
    pub split: Option<Split>,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.split.is_none()
    }
}

/// Targets handed to the tree builder.
#[derive(Debug, Clone, Copy)]
pub enum TreeTargets<'a> {
    Classes { y: &'a [usize], n_classes: usize },
    Values(&'a [f64]),
}

impl TreeTargets<'_> {
    fn len(&self) -> usize {
        match self {
            TreeTargets::Classes { y, .. } => y.len(),
            TreeTargets::Values(y) => y.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
        }
    }
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionTree {
    params: TreeParams,
    criterion: Criterion,
    n_features: usize,
    n_outputs: usize,
    nodes: Vec<TreeNode>,
}

/// Running sufficient statistics for one side of a candidate split.
#[derive(Debug, Clone)]
enum NodeStats {
    Classes { counts: Vec<f64>, n: f64 },
    Values { sum: f64, sum_sq: f64, n: f64 },
}

impl NodeStats {
    fn empty(targets: &TreeTargets) -> Self {
        match targets {
            TreeTargets::Classes { n_classes, .. } => NodeStats::Classes {
                counts: vec![0.0; *n_classes],
                n: 0.0,
            },
            TreeTargets::Values(_) => NodeStats::Values {
                sum: 0.0,
                sum_sq: 0.0,
                n: 0.0,
            },
        }
    }

    fn from_indices(targets: &TreeTargets, indices: &[usize]) -> Self {
        let mut stats = Self::empty(targets);
        for &i in indices {
            stats.update(targets, i, 1.0);
        }
        stats
    }

    fn update(&mut self, targets: &TreeTargets, i: usize, sign: f64) {
        match (self, targets) {
            (NodeStats::Classes { counts, n }, TreeTargets::Classes { y, .. }) => {
                counts[y[i]] += sign;
                *n += sign;
            }
            (NodeStats::Values { sum, sum_sq, n }, TreeTargets::Values(y)) => {
                *sum += sign * y[i];
                *sum_sq += sign * y[i] * y[i];
                *n += sign;
            }
            _ => unreachable!("node statistics always match their targets"),
        }
    }

    fn n(&self) -> f64 {
        match self {
            NodeStats::Classes { n, .. } | NodeStats::Values { n, .. } => *n,
        }
    }

    fn impurity(&self) -> f64 {
        match self {
            NodeStats::Classes { counts, n } => {
                if *n <= 0.0 {
                    return 0.0;
                }
                1.0 - counts.iter().map(|c| (c / n).powi(2)).sum::<f64>()
            }
            NodeStats::Values { sum, sum_sq, n } => {
                if *n <= 0.0 {
                    return 0.0;
                }
                (sum_sq / n - (sum / n).powi(2)).max(0.0)
            }
        }
    }

    fn value(&self) -> Vec<f64> {
        match self {
            NodeStats::Classes { counts, n } => {
                if *n <= 0.0 {
                    counts.clone()
                } else {
                    counts.iter().map(|c| c / n).collect()
                }
            }
            NodeStats::Values { sum, n, .. } => {
                vec![if *n <= 0.0 { 0.0 } else { sum / n }]
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl DecisionTree {
    pub fn new_classifier(params: TreeParams) -> Self {
        Self {
            params,
            criterion: Criterion::Gini,
            n_features: 0,
            n_outputs: 0,
            nodes: Vec::new(),
        }
    }

    pub fn new_regressor(params: TreeParams) -> Self {
        Self {
            params,
            criterion: Criterion::MSE,
            n_features: 0,
            n_outputs: 1,
            nodes: Vec::new(),
        }
    }

    pub fn criterion(&self) -> Criterion {
        self.criterion
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn is_fitted(&self) -> bool {
        !self.nodes.is_empty()
    }

    /// Fit on every row of `x`.
    pub fn fit(&mut self, x: &Array2<f64>, targets: TreeTargets, rng: &mut StdRng) -> Result<()> {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.fit_indices(x, targets, &indices, rng)
    }

    /// Fit on the given rows. Rows may repeat (bootstrap samples).
    pub fn fit_indices(
        &mut self,
        x: &Array2<f64>,
        targets: TreeTargets,
        indices: &[usize],
        rng: &mut StdRng,
    ) -> Result<()> {
        if x.nrows() != targets.len() {
            return Err(ImpactError::InsufficientData(format!(
                "feature matrix has {} rows but targets have {}",
                x.nrows(),
                targets.len()
            )));
        }
        if indices.is_empty() {
            return Err(ImpactError::InsufficientData(
                "cannot fit a tree on zero rows".to_string(),
            ));
        }
        let expected = match (self.criterion, &targets) {
            (Criterion::Gini, TreeTargets::Classes { n_classes, .. }) => *n_classes,
            (Criterion::MSE, TreeTargets::Values(_)) => 1,
            _ => {
                return Err(ImpactError::UnsupportedModel {
                    model: "decision_tree".to_string(),
                    task: "targets of this kind".to_string(),
                })
            }
        };

        self.n_features = x.ncols();
        self.n_outputs = expected;
        self.nodes.clear();
        self.grow(x, &targets, indices.to_vec(), 0, rng);
        Ok(())
    }

    fn grow(
        &mut self,
        x: &Array2<f64>,
        targets: &TreeTargets,
        indices: Vec<usize>,
        depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let stats = NodeStats::from_indices(targets, &indices);
        let node_id = self.nodes.len();
        self.nodes.push(TreeNode {
            cover: indices.len() as f64,
            value: stats.value(),
            split: None,
        });

        let should_stop = indices.len() < self.params.min_samples_split
            || indices.len() < 2 * self.params.min_samples_leaf
            || self.params.max_depth.map_or(false, |d| depth >= d)
            || stats.impurity() <= MIN_GAIN;
        if should_stop {
            return node_id;
        }

        let features = self.candidate_features(rng);
        let Some(best) = self.find_best_split(x, targets, &indices, &stats, &features) else {
            return node_id;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best.feature]] <= best.threshold);

        let left = self.grow(x, targets, left_rows, depth + 1, rng);
        let right = self.grow(x, targets, right_rows, depth + 1, rng);
        self.nodes[node_id].split = Some(Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        });
        node_id
    }

    fn candidate_features(&self, rng: &mut StdRng) -> Vec<usize> {
        let k = self.params.max_features.resolve(self.n_features);
        if k >= self.n_features {
            return (0..self.n_features).collect();
        }
        let mut features = index::sample(rng, self.n_features, k).into_vec();
        features.sort_unstable();
        features
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        targets: &TreeTargets,
        indices: &[usize],
        parent: &NodeStats,
        features: &[usize],
    ) -> Option<SplitCandidate> {
        let min_leaf = self.params.min_samples_leaf.max(1) as f64;
        let parent_impurity = parent.impurity();
        let n = indices.len() as f64;

        // Each feature is scanned independently; the reduction below keeps
        // feature order so ties resolve to the lowest feature index.
        let per_feature: Vec<Option<SplitCandidate>> = features
            .par_iter()
            .map(|&feature| {
                let mut sorted = indices.to_vec();
                sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

                let mut left = NodeStats::empty(targets);
                let mut right = parent.clone();
                let mut best: Option<SplitCandidate> = None;

                for pos in 0..sorted.len() - 1 {
                    let row = sorted[pos];
                    left.update(targets, row, 1.0);
                    right.update(targets, row, -1.0);

                    let here = x[[row, feature]];
                    let next = x[[sorted[pos + 1], feature]];
                    if here == next || left.n() < min_leaf || right.n() < min_leaf {
                        continue;
                    }

                    let weighted =
                        (left.n() * left.impurity() + right.n() * right.impurity()) / n;
                    let gain = parent_impurity - weighted;
                    if gain > MIN_GAIN && best.map_or(true, |b| gain > b.gain) {
                        best = Some(SplitCandidate {
                            feature,
                            threshold: here + (next - here) / 2.0,
                            gain,
                        });
                    }
                }
                best
            })
            .collect();

        per_feature
            .into_iter()
            .flatten()
            .fold(None, |acc: Option<SplitCandidate>, cand| match acc {
                Some(b) if b.gain >= cand.gain => Some(b),
                _ => Some(cand),
            })
    }

    /// Index of the leaf reached by `row`. Missing values go right.
    pub fn apply(&self, row: ArrayView1<f64>) -> usize {
        let mut node = 0;
        while let Some(split) = &self.nodes[node].split {
            node = if row[split.feature] <= split.threshold {
                split.left
            } else {
                split.right
            };
        }
        node
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> &[f64] {
        &self.nodes[self.apply(row)].value
    }

    /// Per-row outputs, shape `(n_rows, n_outputs)`.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted() {
            return Err(ImpactError::NotFitted("decision_tree".to_string()));
        }
        let mut out = Array2::zeros((x.nrows(), self.n_outputs));
        for (i, row) in x.rows().into_iter().enumerate() {
            for (o, v) in self.predict_row(row).iter().enumerate() {
                out[[i, o]] = *v;
            }
        }
        Ok(out)
    }

    /// Overwrite a leaf's output; used by boosting to install line-search steps.
    pub(crate) fn set_leaf_value(&mut self, node: usize, value: Vec<f64>) {
        debug_assert!(self.nodes[node].is_leaf());
        self.nodes[node].value = value;
    }

    /// Cover-weighted mean leaf output: the expectation TreeSHAP attributes against.
    pub fn expected_value(&self) -> Vec<f64> {
        let mut expected = vec![0.0; self.n_outputs];
        let Some(root) = self.nodes.first() else {
            return expected;
        };
        for node in self.nodes.iter().filter(|n| n.is_leaf()) {
            for (o, v) in node.value.iter().enumerate() {
                expected[o] += v * node.cover / root.cover;
            }
        }
        expected
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], node: usize) -> usize {
            match &nodes[node].split {
                None => 1,
                Some(s) => 1 + walk(nodes, s.left).max(walk(nodes, s.right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn classifier_separates_simple_data() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = [0usize, 0, 1, 1];
        let mut tree = DecisionTree::new_classifier(TreeParams::default());
        let mut rng = StdRng::seed_from_u64(0);
        tree.fit(&x, TreeTargets::Classes { y: &y, n_classes: 2 }, &mut rng)
            .unwrap();

        let proba = tree.predict(&x).unwrap();
        for (i, &label) in y.iter().enumerate() {
            assert_eq!(proba[[i, label]], 1.0);
        }
        assert_eq!(tree.depth(), 2);
    }

    #[test]
    fn regressor_fits_training_data() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = [1.0, 2.0, 3.0, 4.0, 5.0];
        let mut tree = DecisionTree::new_regressor(TreeParams::default());
        let mut rng = StdRng::seed_from_u64(0);
        tree.fit(&x, TreeTargets::Values(&y), &mut rng).unwrap();

        let pred = tree.predict(&x).unwrap();
        for (i, v) in y.iter().enumerate() {
            assert!((pred[[i, 0]] - v).abs() < 1e-12);
        }
    }

    #[test]
    fn max_depth_is_respected() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = [0.0, 1.0, 2.0, 3.0];
        let params = TreeParams {
            max_depth: Some(1),
            ..TreeParams::default()
        };
        let mut tree = DecisionTree::new_regressor(params);
        tree.fit(&x, TreeTargets::Values(&y), &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.nodes().iter().filter(|n| n.is_leaf()).count(), 2);
    }

    #[test]
    fn expected_value_matches_cover_weighted_mean() {
        let x = array![[0.0], [0.0], [0.0], [1.0]];
        let y = [0.0, 0.0, 0.0, 8.0];
        let mut tree = DecisionTree::new_regressor(TreeParams::default());
        tree.fit(&x, TreeTargets::Values(&y), &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert!((tree.expected_value()[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn unfitted_tree_errors() {
        let tree = DecisionTree::new_regressor(TreeParams::default());
        assert!(matches!(
            tree.predict(&array![[1.0]]),
            Err(ImpactError::NotFitted(_))
        ));
    }
}
