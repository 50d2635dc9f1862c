use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::MaxFeatures;
use crate::error::{ImpactError, Result};
use crate::models::classifier_trait::{Classifier, Regressor};
use crate::models::ensemble::{EnsembleMember, OutputRoute, TreeEnsemble};
use crate::models::tree::{DecisionTree, TreeParams, TreeTargets};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
}

impl ForestParams {
    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: 2,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features,
        }
    }
}

/// Bagged ensemble of CART trees. Each tree gets its own seed derived from the
/// forest seed, so fitting in parallel stays reproducible.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RandomForest {
    params: ForestParams,
    seed: u64,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn new(params: ForestParams, seed: u64) -> Self {
        Self {
            params,
            seed,
            trees: Vec::new(),
        }
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    fn fit_trees(&mut self, x: &Array2<f64>, targets: TreeTargets, classifier: bool) -> Result<()> {
        if self.params.n_estimators == 0 {
            return Err(ImpactError::InvalidConfig(
                "random forest needs at least one estimator".to_string(),
            ));
        }
        let n = x.nrows();
        if n == 0 {
            return Err(ImpactError::InsufficientData(
                "cannot fit a forest on zero rows".to_string(),
            ));
        }
        let tree_params = self.params.tree_params();
        let bootstrap = self.params.bootstrap;
        let seed = self.seed;

        self.trees = (0..self.params.n_estimators)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(t as u64));
                let indices: Vec<usize> = if bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                let mut tree = if classifier {
                    DecisionTree::new_classifier(tree_params.clone())
                } else {
                    DecisionTree::new_regressor(tree_params.clone())
                };
                tree.fit_indices(x, targets, &indices, &mut rng)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;
        log::trace!("Fitted {} trees", self.trees.len());
        Ok(())
    }

    /// Mean of the member trees' outputs.
    fn average(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let first = self
            .trees
            .first()
            .ok_or_else(|| ImpactError::NotFitted("random_forest".to_string()))?;
        let mut sum = Array2::zeros((x.nrows(), first.n_outputs()));
        for tree in &self.trees {
            sum += &tree.predict(x)?;
        }
        Ok(sum / self.trees.len() as f64)
    }

    fn ensemble(&self) -> Option<TreeEnsemble<'_>> {
        let first = self.trees.first()?;
        let scale = 1.0 / self.trees.len() as f64;
        Some(TreeEnsemble {
            n_outputs: first.n_outputs(),
            base_offset: vec![0.0; first.n_outputs()],
            members: self
                .trees
                .iter()
                .map(|tree| EnsembleMember {
                    tree,
                    output: OutputRoute::All,
                    scale,
                })
                .collect(),
        })
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()> {
        self.fit_trees(x, TreeTargets::Classes { y, n_classes }, true)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.average(x)
    }

    fn tree_ensemble(&self) -> Option<TreeEnsemble<'_>> {
        self.ensemble()
    }

    fn name(&self) -> &str {
        "random_forest"
    }
}

impl Regressor for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &[f64]) -> Result<()> {
        self.fit_trees(x, TreeTargets::Values(y), false)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        Ok(self.average(x)?.column(0).to_vec())
    }

    fn tree_ensemble(&self) -> Option<TreeEnsemble<'_>> {
        self.ensemble()
    }

    fn name(&self) -> &str {
        "random_forest"
    }
}
