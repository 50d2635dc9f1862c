use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::{MaxFeatures, ModelConfig, ModelType};
use crate::error::{ImpactError, Result};
use crate::models::boosting::{BoostingParams, GradientBoostingClassifier, GradientBoostingRegressor};
use crate::models::classifier_trait::{Classifier, Regressor};
use crate::models::ensemble::TreeEnsemble;
use crate::models::forest::{ForestParams, RandomForest};
use crate::models::linear::{LogisticRegression, LogisticRegressionParams};
use crate::models::tree::{DecisionTree, TreeParams, TreeTargets};

use rand::rngs::StdRng;
use rand::SeedableRng;

/// A fitted (or fittable) severity classifier of any supported family.
/// Serializes with a `family` tag into its artifact file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ClassifierModel {
    LogisticRegression(LogisticRegression),
    DecisionTree { seed: u64, tree: DecisionTree },
    RandomForest(RandomForest),
    GradientBoosting(GradientBoostingClassifier),
}

/// A fitted (or fittable) regressor for one numeric target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum RegressorModel {
    DecisionTree { seed: u64, tree: DecisionTree },
    RandomForest(RandomForest),
    GradientBoosting(GradientBoostingRegressor),
}

/// Build an unfitted classifier from a candidate configuration.
pub fn build_classifier(config: &ModelConfig, seed: u64) -> Result<ClassifierModel> {
    Ok(match &config.model_type {
        ModelType::LogisticRegression {
            learning_rate,
            max_iter,
            l2_penalty,
        } => ClassifierModel::LogisticRegression(LogisticRegression::new(
            LogisticRegressionParams {
                learning_rate: *learning_rate,
                max_iter: *max_iter,
                l2_penalty: *l2_penalty,
            },
        )),
        ModelType::DecisionTree { .. } => ClassifierModel::DecisionTree {
            seed,
            tree: DecisionTree::new_classifier(tree_params(&config.model_type)),
        },
        ModelType::RandomForest { .. } => {
            ClassifierModel::RandomForest(RandomForest::new(forest_params(&config.model_type), seed))
        }
        ModelType::GradientBoosting { .. } => ClassifierModel::GradientBoosting(
            GradientBoostingClassifier::new(boosting_params(&config.model_type), seed),
        ),
    })
}

/// Build an unfitted regressor. Logistic regression has no regression form.
pub fn build_regressor(config: &ModelConfig, seed: u64) -> Result<RegressorModel> {
    match &config.model_type {
        ModelType::LogisticRegression { .. } => Err(ImpactError::UnsupportedModel {
            model: config.name.clone(),
            task: "regression".to_string(),
        }),
        ModelType::DecisionTree { .. } => Ok(RegressorModel::DecisionTree {
            seed,
            tree: DecisionTree::new_regressor(tree_params(&config.model_type)),
        }),
        ModelType::RandomForest { .. } => Ok(RegressorModel::RandomForest(RandomForest::new(
            forest_params(&config.model_type),
            seed,
        ))),
        ModelType::GradientBoosting { .. } => Ok(RegressorModel::GradientBoosting(
            GradientBoostingRegressor::new(boosting_params(&config.model_type), seed),
        )),
    }
}

fn tree_params(model_type: &ModelType) -> TreeParams {
    match model_type {
        ModelType::DecisionTree {
            max_depth,
            min_samples_split,
            min_samples_leaf,
        } => TreeParams {
            max_depth: *max_depth,
            min_samples_split: *min_samples_split,
            min_samples_leaf: *min_samples_leaf,
            max_features: MaxFeatures::All,
        },
        _ => TreeParams::default(),
    }
}

fn forest_params(model_type: &ModelType) -> ForestParams {
    match model_type {
        ModelType::RandomForest {
            n_estimators,
            max_depth,
            min_samples_leaf,
            max_features,
            bootstrap,
        } => ForestParams {
            n_estimators: *n_estimators,
            max_depth: *max_depth,
            min_samples_leaf: *min_samples_leaf,
            max_features: *max_features,
            bootstrap: *bootstrap,
        },
        _ => ForestParams {
            n_estimators: 100,
            max_depth: None,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
        },
    }
}

fn boosting_params(model_type: &ModelType) -> BoostingParams {
    match model_type {
        ModelType::GradientBoosting {
            n_estimators,
            learning_rate,
            max_depth,
            min_samples_leaf,
            subsample,
        } => BoostingParams {
            n_estimators: *n_estimators,
            learning_rate: *learning_rate,
            max_depth: *max_depth,
            min_samples_leaf: *min_samples_leaf,
            subsample: *subsample,
        },
        _ => BoostingParams {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_samples_leaf: 1,
            subsample: 1.0,
        },
    }
}

impl Classifier for ClassifierModel {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()> {
        match self {
            ClassifierModel::LogisticRegression(m) => m.fit(x, y, n_classes),
            ClassifierModel::DecisionTree { seed, tree } => tree.fit(
                x,
                TreeTargets::Classes { y, n_classes },
                &mut StdRng::seed_from_u64(*seed),
            ),
            ClassifierModel::RandomForest(m) => Classifier::fit(m, x, y, n_classes),
            ClassifierModel::GradientBoosting(m) => m.fit(x, y, n_classes),
        }
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            ClassifierModel::LogisticRegression(m) => m.predict_proba(x),
            ClassifierModel::DecisionTree { tree, .. } => tree.predict(x),
            ClassifierModel::RandomForest(m) => m.predict_proba(x),
            ClassifierModel::GradientBoosting(m) => m.predict_proba(x),
        }
    }

    fn tree_ensemble(&self) -> Option<TreeEnsemble<'_>> {
        match self {
            ClassifierModel::LogisticRegression(m) => m.tree_ensemble(),
            ClassifierModel::DecisionTree { tree, .. } => {
                tree.is_fitted().then(|| TreeEnsemble::single(tree))
            }
            ClassifierModel::RandomForest(m) => Classifier::tree_ensemble(m),
            ClassifierModel::GradientBoosting(m) => m.tree_ensemble(),
        }
    }

    fn name(&self) -> &str {
        match self {
            ClassifierModel::LogisticRegression(m) => m.name(),
            ClassifierModel::DecisionTree { .. } => "decision_tree",
            ClassifierModel::RandomForest(m) => Classifier::name(m),
            ClassifierModel::GradientBoosting(m) => m.name(),
        }
    }
}

impl Regressor for RegressorModel {
    fn fit(&mut self, x: &Array2<f64>, y: &[f64]) -> Result<()> {
        match self {
            RegressorModel::DecisionTree { seed, tree } => {
                tree.fit(x, TreeTargets::Values(y), &mut StdRng::seed_from_u64(*seed))
            }
            RegressorModel::RandomForest(m) => Regressor::fit(m, x, y),
            RegressorModel::GradientBoosting(m) => m.fit(x, y),
        }
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        match self {
            RegressorModel::DecisionTree { tree, .. } => Ok(tree.predict(x)?.column(0).to_vec()),
            RegressorModel::RandomForest(m) => Regressor::predict(m, x),
            RegressorModel::GradientBoosting(m) => m.predict(x),
        }
    }

    fn tree_ensemble(&self) -> Option<TreeEnsemble<'_>> {
        match self {
            RegressorModel::DecisionTree { tree, .. } => {
                tree.is_fitted().then(|| TreeEnsemble::single(tree))
            }
            RegressorModel::RandomForest(m) => Regressor::tree_ensemble(m),
            RegressorModel::GradientBoosting(m) => m.tree_ensemble(),
        }
    }

    fn name(&self) -> &str {
        match self {
            RegressorModel::DecisionTree { .. } => "decision_tree",
            RegressorModel::RandomForest(m) => Regressor::name(m),
            RegressorModel::GradientBoosting(m) => m.name(),
        }
    }
}
