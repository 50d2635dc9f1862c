//! Gradient-boosted regression trees.
//!
//! The classifier boosts one tree per class per round on the multinomial
//! deviance, with a single Newton step per leaf. The regressor boosts on
//! squared error, where the leaf mean already is the optimal step.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::MaxFeatures;
use crate::error::{ImpactError, Result};
use crate::models::classifier_trait::{Classifier, Regressor};
use crate::models::ensemble::{EnsembleMember, OutputRoute, TreeEnsemble};
use crate::models::tree::{DecisionTree, TreeParams, TreeTargets};
use crate::models::utils::softmax_rows;

/// Floor on class priors before taking logs.
const MIN_PRIOR: f64 = 1e-12;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub subsample: f64,
}

impl BoostingParams {
    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: Some(self.max_depth),
            min_samples_split: 2,
            min_samples_leaf: self.min_samples_leaf,
            max_features: MaxFeatures::All,
        }
    }

    fn validate(&self, n_rows: usize) -> Result<()> {
        if self.n_estimators == 0 || self.learning_rate <= 0.0 {
            return Err(ImpactError::InvalidConfig(
                "gradient boosting needs n_estimators > 0 and learning_rate > 0".to_string(),
            ));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(ImpactError::InvalidConfig(format!(
                "subsample must be in (0, 1], got {}",
                self.subsample
            )));
        }
        if n_rows == 0 {
            return Err(ImpactError::InsufficientData(
                "cannot boost on zero rows".to_string(),
            ));
        }
        Ok(())
    }

    /// Rows used to grow the trees of one round.
    fn round_rows(&self, n_rows: usize, rng: &mut StdRng) -> Vec<usize> {
        if self.subsample >= 1.0 {
            return (0..n_rows).collect();
        }
        let amount = ((self.subsample * n_rows as f64).ceil() as usize).clamp(1, n_rows);
        let mut rows = index::sample(rng, n_rows, amount).into_vec();
        rows.sort_unstable();
        rows
    }
}

/// Multiclass gradient boosting on softmax margins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GradientBoostingClassifier {
    params: BoostingParams,
    seed: u64,
    n_classes: usize,
    /// Initial margin per class: log of the training class priors.
    init: Vec<f64>,
    /// `rounds[r][k]` is the tree fitted for class `k` at round `r`.
    rounds: Vec<Vec<DecisionTree>>,
}

impl GradientBoostingClassifier {
    pub fn new(params: BoostingParams, seed: u64) -> Self {
        Self {
            params,
            seed,
            n_classes: 0,
            init: Vec::new(),
            rounds: Vec::new(),
        }
    }

    pub fn n_rounds(&self) -> usize {
        self.rounds.len()
    }

    /// Raw per-class margins, shape `(n_rows, n_classes)`.
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.rounds.is_empty() {
            return Err(ImpactError::NotFitted("gradient_boosting".to_string()));
        }
        let mut margins = Array2::zeros((x.nrows(), self.n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            for k in 0..self.n_classes {
                margins[[i, k]] = self.init[k];
            }
            for round in &self.rounds {
                for (k, tree) in round.iter().enumerate() {
                    margins[[i, k]] += self.params.learning_rate * tree.predict_row(row)[0];
                }
            }
        }
        Ok(margins)
    }
}

impl Classifier for GradientBoostingClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()> {
        let n = x.nrows();
        self.params.validate(n)?;
        if y.len() != n {
            return Err(ImpactError::InsufficientData(format!(
                "{} rows but {} labels",
                n,
                y.len()
            )));
        }

        let mut counts = vec![0.0; n_classes];
        for &label in y {
            counts[label] += 1.0;
        }
        self.n_classes = n_classes;
        self.init = counts
            .iter()
            .map(|c| (c / n as f64).max(MIN_PRIOR).ln())
            .collect();
        self.rounds.clear();

        let mut rng = StdRng::seed_from_u64(self.seed);
        let tree_params = self.params.tree_params();
        let step_factor = (n_classes as f64 - 1.0) / n_classes as f64;
        let mut margins = Array2::from_shape_fn((n, n_classes), |(_, k)| self.init[k]);
        let mut residual = vec![0.0; n];

        for _ in 0..self.params.n_estimators {
            let mut proba = margins.clone();
            softmax_rows(&mut proba);
            let rows = self.params.round_rows(n, &mut rng);

            let mut round = Vec::with_capacity(n_classes);
            for k in 0..n_classes {
                for i in 0..n {
                    let target = if y[i] == k { 1.0 } else { 0.0 };
                    residual[i] = target - proba[[i, k]];
                }
                let mut tree = DecisionTree::new_regressor(tree_params.clone());
                tree.fit_indices(x, TreeTargets::Values(&residual), &rows, &mut rng)?;

                // Newton step per leaf: sum(r) / sum(|r| (1 - |r|)), scaled by (K-1)/K.
                let mut numerator = vec![0.0; tree.nodes().len()];
                let mut denominator = vec![0.0; tree.nodes().len()];
                for &i in &rows {
                    let leaf = tree.apply(x.row(i));
                    let r = residual[i];
                    numerator[leaf] += r;
                    denominator[leaf] += r.abs() * (1.0 - r.abs());
                }
                let leaves: Vec<usize> = (0..tree.nodes().len())
                    .filter(|&id| tree.nodes()[id].is_leaf())
                    .collect();
                for leaf in leaves {
                    let step = if denominator[leaf] < 1e-150 {
                        0.0
                    } else {
                        step_factor * numerator[leaf] / denominator[leaf]
                    };
                    tree.set_leaf_value(leaf, vec![step]);
                }

                for i in 0..n {
                    margins[[i, k]] += self.params.learning_rate * tree.predict_row(x.row(i))[0];
                }
                round.push(tree);
            }
            self.rounds.push(round);
        }
        log::trace!(
            "Boosted {} rounds over {} classes",
            self.rounds.len(),
            n_classes
        );
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let mut proba = self.decision_function(x)?;
        softmax_rows(&mut proba);
        Ok(proba)
    }

    /// Attributions are on the margin (log-odds) scale.
    fn tree_ensemble(&self) -> Option<TreeEnsemble<'_>> {
        if self.rounds.is_empty() {
            return None;
        }
        let scale = self.params.learning_rate;
        let members = self
            .rounds
            .iter()
            .flat_map(|round| {
                round.iter().enumerate().map(move |(k, tree)| EnsembleMember {
                    tree,
                    output: OutputRoute::Single(k),
                    scale,
                })
            })
            .collect();
        Some(TreeEnsemble {
            n_outputs: self.n_classes,
            base_offset: self.init.clone(),
            members,
        })
    }

    fn name(&self) -> &str {
        "gradient_boosting"
    }
}

/// Least-squares gradient boosting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GradientBoostingRegressor {
    params: BoostingParams,
    seed: u64,
    init: f64,
    trees: Vec<DecisionTree>,
}

impl GradientBoostingRegressor {
    pub fn new(params: BoostingParams, seed: u64) -> Self {
        Self {
            params,
            seed,
            init: 0.0,
            trees: Vec::new(),
        }
    }
}

impl Regressor for GradientBoostingRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &[f64]) -> Result<()> {
        let n = x.nrows();
        self.params.validate(n)?;
        if y.len() != n {
            return Err(ImpactError::InsufficientData(format!(
                "{} rows but {} targets",
                n,
                y.len()
            )));
        }

        self.init = y.iter().sum::<f64>() / n as f64;
        self.trees.clear();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let tree_params = self.params.tree_params();
        let mut current = vec![self.init; n];
        let mut residual = vec![0.0; n];

        for _ in 0..self.params.n_estimators {
            for i in 0..n {
                residual[i] = y[i] - current[i];
            }
            let rows = self.params.round_rows(n, &mut rng);
            let mut tree = DecisionTree::new_regressor(tree_params.clone());
            tree.fit_indices(x, TreeTargets::Values(&residual), &rows, &mut rng)?;
            for (i, value) in current.iter_mut().enumerate() {
                *value += self.params.learning_rate * tree.predict_row(x.row(i))[0];
            }
            self.trees.push(tree);
        }
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        if self.trees.is_empty() {
            return Err(ImpactError::NotFitted("gradient_boosting".to_string()));
        }
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                self.init
                    + self
                        .trees
                        .iter()
                        .map(|t| self.params.learning_rate * t.predict_row(row)[0])
                        .sum::<f64>()
            })
            .collect())
    }

    fn tree_ensemble(&self) -> Option<TreeEnsemble<'_>> {
        if self.trees.is_empty() {
            return None;
        }
        Some(TreeEnsemble {
            n_outputs: 1,
            base_offset: vec![self.init],
            members: self
                .trees
                .iter()
                .map(|tree| EnsembleMember {
                    tree,
                    output: OutputRoute::All,
                    scale: self.params.learning_rate,
                })
                .collect(),
        })
    }

    fn name(&self) -> &str {
        "gradient_boosting"
    }
}
