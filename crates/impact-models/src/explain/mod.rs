//! Feature attributions for tree-structured models.
//!
//! [`TreeExplainer`] wraps the tree view of a fitted model and computes exact
//! TreeSHAP values. It is cheap to build and holds no state beyond a borrow of
//! the model, so callers construct it on demand.

mod tree_shap;

use ndarray::{Array2, Array3, ArrayView2, Axis};
use rayon::prelude::*;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{ImpactError, Result};
use crate::models::ensemble::TreeEnsemble;
use crate::models::{Classifier, Regressor};

/// Number of factors reported per prediction.
pub const TOP_FACTORS: usize = 3;

/// Attribution values for a batch of rows.
#[derive(Debug, Clone)]
pub struct Attributions {
    /// Expected model output per output column.
    pub base_values: Vec<f64>,
    /// Shape `(n_rows, n_features, n_outputs)`.
    pub values: Array3<f64>,
}

impl Attributions {
    pub fn n_outputs(&self) -> usize {
        self.values.len_of(Axis(2))
    }

    /// Attributions of one row, shape `(n_features, n_outputs)`.
    pub fn row(&self, i: usize) -> ArrayView2<'_, f64> {
        self.values.index_axis(Axis(0), i)
    }

    /// Mean absolute attribution per feature over rows and outputs.
    pub fn mean_abs(&self) -> Vec<f64> {
        let (n_rows, n_features, n_outputs) = self.values.dim();
        let denom = (n_rows * n_outputs).max(1) as f64;
        (0..n_features)
            .map(|f| {
                self.values
                    .index_axis(Axis(1), f)
                    .iter()
                    .map(|v| v.abs())
                    .sum::<f64>()
                    / denom
            })
            .collect()
    }
}

pub struct TreeExplainer<'a> {
    model: String,
    ensemble: TreeEnsemble<'a>,
    n_features: usize,
    base_values: Vec<f64>,
}

impl<'a> TreeExplainer<'a> {
    pub fn for_classifier<M: Classifier + ?Sized>(model: &'a M) -> Result<Self> {
        Self::from_ensemble(model.name(), model.tree_ensemble())
    }

    pub fn for_regressor<M: Regressor + ?Sized>(model: &'a M) -> Result<Self> {
        Self::from_ensemble(model.name(), model.tree_ensemble())
    }

    fn from_ensemble(name: &str, ensemble: Option<TreeEnsemble<'a>>) -> Result<Self> {
        let ensemble = ensemble.ok_or_else(|| ImpactError::ExplainerUnavailable {
            model: name.to_string(),
        })?;
        let n_features = ensemble
            .members
            .iter()
            .map(|m| m.tree.n_features())
            .max()
            .unwrap_or(0);
        let base_values = ensemble.expected_value();
        Ok(Self {
            model: name.to_string(),
            ensemble,
            n_features,
            base_values,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn expected_value(&self) -> &[f64] {
        &self.base_values
    }

    /// TreeSHAP values for every row of `x`. Rows are explained in parallel
    /// and reassembled in input order.
    pub fn explain(&self, x: &Array2<f64>) -> Result<Attributions> {
        if x.ncols() != self.n_features {
            return Err(ImpactError::InvalidConfig(format!(
                "{} explainer expects {} feature columns, got {}",
                self.model,
                self.n_features,
                x.ncols()
            )));
        }
        let n_outputs = self.ensemble.n_outputs;
        let rows: Vec<Array2<f64>> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i);
                let mut phi = Array2::zeros((self.n_features, n_outputs));
                for member in &self.ensemble.members {
                    tree_shap::accumulate_tree(member, row, &mut phi);
                }
                phi
            })
            .collect();

        let mut values = Array3::zeros((x.nrows(), self.n_features, n_outputs));
        for (i, phi) in rows.into_iter().enumerate() {
            values.index_axis_mut(Axis(0), i).assign(&phi);
        }
        Ok(Attributions {
            base_values: self.base_values.clone(),
            values,
        })
    }
}

/// Feature importances for one row, in fit-time feature order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureImportance(Vec<(String, f64)>);

impl FeatureImportance {
    pub fn new(entries: Vec<(String, f64)>) -> Self {
        Self(entries)
    }

    /// Reduce one row of attributions: mean of `|phi|` over outputs.
    pub fn from_attributions(feature_names: &[String], phi: ArrayView2<f64>) -> Self {
        let n_outputs = phi.ncols().max(1) as f64;
        Self(
            feature_names
                .iter()
                .zip(phi.rows())
                .map(|(name, outputs)| {
                    (
                        name.clone(),
                        outputs.iter().map(|v| v.abs()).sum::<f64>() / n_outputs,
                    )
                })
                .collect(),
        )
    }

    pub fn entries(&self) -> &[(String, f64)] {
        &self.0
    }

    pub fn get(&self, feature: &str) -> Option<f64> {
        self.0.iter().find(|(n, _)| n == feature).map(|(_, v)| *v)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Names of the `k` most important features. The sort is stable, so
    /// equal importances keep feature order.
    pub fn top(&self, k: usize) -> Vec<String> {
        let mut ranked: Vec<&(String, f64)> = self.0.iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.into_iter().take(k).map(|(n, _)| n.clone()).collect()
    }
}

impl Serialize for FeatureImportance {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Explanation attached to each prediction.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Explanation {
    pub top_3_factors: Vec<String>,
    pub full_details: FeatureImportance,
}

impl Explanation {
    pub fn from_importance(full_details: FeatureImportance) -> Self {
        Self {
            top_3_factors: full_details.top(TOP_FACTORS),
            full_details,
        }
    }

    /// Explanation used when no explainer is available.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Top-`k` feature names from a plain importance list.
pub fn rank_top_factors(importance: &[(String, f64)], k: usize) -> Vec<String> {
    FeatureImportance::new(importance.to_vec()).top(k)
}
