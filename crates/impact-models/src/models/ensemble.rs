//! Read-only view of a fitted model as a weighted sum of trees.
//!
//! A model's raw output for output column `k` is
//! `base_offset[k] + sum(scale * tree_value[k])` over the members routed to
//! `k`. Forests average (scale `1/T`), boosting adds shrunken trees on top of
//! an initial margin.

use super::tree::DecisionTree;

/// Which model outputs a member tree contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputRoute {
    /// Tree output `o` feeds model output `o`.
    All,
    /// The tree's single output feeds model output `k`.
    Single(usize),
}

#[derive(Debug, Clone)]
pub struct EnsembleMember<'a> {
    pub tree: &'a DecisionTree,
    pub output: OutputRoute,
    pub scale: f64,
}

#[derive(Debug, Clone)]
pub struct TreeEnsemble<'a> {
    pub n_outputs: usize,
    pub base_offset: Vec<f64>,
    pub members: Vec<EnsembleMember<'a>>,
}

impl<'a> TreeEnsemble<'a> {
    pub fn single(tree: &'a DecisionTree) -> Self {
        Self {
            n_outputs: tree.n_outputs(),
            base_offset: vec![0.0; tree.n_outputs()],
            members: vec![EnsembleMember {
                tree,
                output: OutputRoute::All,
                scale: 1.0,
            }],
        }
    }

    /// Expected raw output per model output under the training distribution.
    pub fn expected_value(&self) -> Vec<f64> {
        let mut expected = self.base_offset.clone();
        for member in &self.members {
            let tree_expected = member.tree.expected_value();
            match member.output {
                OutputRoute::All => {
                    for (o, v) in tree_expected.iter().enumerate() {
                        expected[o] += member.scale * v;
                    }
                }
                OutputRoute::Single(k) => {
                    expected[k] += member.scale * tree_expected.first().copied().unwrap_or(0.0);
                }
            }
        }
        expected
    }
}
