//! Best-of-N model selection for the severity classifier and the four
//! regression targets.
//!
//! Candidates are fitted in declaration order on the training split and scored
//! on the held-out split. A later candidate replaces the incumbent only when it
//! is strictly better, so ties keep the earlier candidate.

use ndarray::Array2;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::config::TrainingConfig;
use crate::data_handling::RegressionTarget;
use crate::error::{ImpactError, Result};
use crate::models::{build_classifier, build_regressor, Classifier, Regressor};
use crate::stats::{ClassificationMetrics, RegressionMetrics};
use crate::store::{ClassifierArtifact, RegressorArtifact};

/// Per-variant metrics, serialized as a JSON object in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsReport<M> {
    entries: Vec<(String, M)>,
}

impl<M> Default for MetricsReport<M> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<M> MetricsReport<M> {
    pub fn push(&mut self, variant: &str, metrics: M) {
        self.entries.push((variant.to_string(), metrics));
    }

    pub fn get(&self, variant: &str) -> Option<&M> {
        self.entries
            .iter()
            .find(|(name, _)| name == variant)
            .map(|(_, m)| m)
    }

    pub fn entries(&self) -> &[(String, M)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<M: Serialize> Serialize for MetricsReport<M> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(k, v)| (k, v)))
    }
}

pub type ClassificationReport = MetricsReport<ClassificationMetrics>;

/// Regression metrics keyed by target, then by variant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegressionReport {
    targets: Vec<(RegressionTarget, MetricsReport<RegressionMetrics>)>,
}

impl RegressionReport {
    pub fn target(&self, target: RegressionTarget) -> Option<&MetricsReport<RegressionMetrics>> {
        self.targets
            .iter()
            .find(|(t, _)| *t == target)
            .map(|(_, r)| r)
    }

    pub fn entries(&self) -> &[(RegressionTarget, MetricsReport<RegressionMetrics>)] {
        &self.targets
    }
}

impl Serialize for RegressionReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.targets.len()))?;
        for (target, report) in &self.targets {
            map.serialize_entry(target.column(), report)?;
        }
        map.end()
    }
}

/// Train/test matrices shared by both trainers.
#[derive(Debug, Clone, Copy)]
pub struct SplitData<'a> {
    pub feature_names: &'a [String],
    pub x_train: &'a Array2<f64>,
    pub x_test: &'a Array2<f64>,
}

#[derive(Debug, Clone)]
pub struct ClassificationOutcome {
    pub best: ClassifierArtifact,
    pub report: ClassificationReport,
}

#[derive(Debug, Clone)]
pub struct RegressionOutcome {
    /// One winner per target, in `RegressionTarget::ALL` order.
    pub best: Vec<RegressorArtifact>,
    pub report: RegressionReport,
}

impl RegressionOutcome {
    pub fn winner(&self, target: RegressionTarget) -> Option<&RegressorArtifact> {
        self.best.iter().find(|a| a.target == target)
    }
}

/// Fit every configured classifier and keep the best macro F1.
pub fn train_classifiers(
    config: &TrainingConfig,
    data: SplitData<'_>,
    y_train: &[usize],
    y_test: &[usize],
    n_classes: usize,
) -> Result<ClassificationOutcome> {
    log::info!("Training classification models");
    let mut report = ClassificationReport::default();
    let mut best: Option<ClassifierArtifact> = None;

    for candidate in &config.classifiers {
        log::info!("--- Training {} ---", candidate.name);
        let mut model = build_classifier(candidate, config.random_state)?;
        model.fit(data.x_train, y_train, n_classes)?;
        let y_pred = model.predict(data.x_test)?;
        let metrics = ClassificationMetrics::evaluate(y_test, &y_pred);
        log::info!("{} F1 Score (Macro): {:.4}", candidate.name, metrics.f1_macro);
        log::debug!("{} metrics: {:?}", candidate.name, metrics);
        report.push(&candidate.name, metrics);

        if best.as_ref().map_or(true, |b| metrics.f1_macro > b.f1_macro) {
            best = Some(ClassifierArtifact {
                variant: candidate.name.clone(),
                f1_macro: metrics.f1_macro,
                feature_names: data.feature_names.to_vec(),
                model,
            });
        }
    }

    let best = best.ok_or_else(|| {
        ImpactError::InvalidConfig("no classification candidates configured".to_string())
    })?;
    log::info!(
        "Best classification model: {} with F1 Score: {:.4}",
        best.variant,
        best.f1_macro
    );
    Ok(ClassificationOutcome { best, report })
}

/// Fit every configured regressor for each target and keep the lowest RMSE.
pub fn train_regressors(
    config: &TrainingConfig,
    data: SplitData<'_>,
    y_train: &[Vec<f64>; 4],
    y_test: &[Vec<f64>; 4],
) -> Result<RegressionOutcome> {
    log::info!("Training regression models");
    let mut report = RegressionReport::default();
    let mut winners = Vec::with_capacity(RegressionTarget::ALL.len());

    for target in RegressionTarget::ALL {
        log::info!("--- Training for target: {} ---", target);
        let train_values = &y_train[target.index()];
        let test_values = &y_test[target.index()];
        let mut target_report = MetricsReport::default();
        let mut best: Option<RegressorArtifact> = None;

        for candidate in &config.regressors {
            let mut model = build_regressor(candidate, config.random_state)?;
            model.fit(data.x_train, train_values)?;
            let y_pred = model.predict(data.x_test)?;
            let metrics = RegressionMetrics::evaluate(test_values, &y_pred);
            log::info!("  {} RMSE: {:.4}", candidate.name, metrics.rmse);
            log::debug!("  {} MAE: {:.4}", candidate.name, metrics.mae);
            target_report.push(&candidate.name, metrics);

            if best.as_ref().map_or(true, |b| metrics.rmse < b.rmse) {
                best = Some(RegressorArtifact {
                    target,
                    variant: candidate.name.clone(),
                    rmse: metrics.rmse,
                    feature_names: data.feature_names.to_vec(),
                    model,
                });
            }
        }

        let best = best.ok_or_else(|| {
            ImpactError::InvalidConfig("no regression candidates configured".to_string())
        })?;
        log::info!(
            "Best model for {}: {} with RMSE: {:.4}",
            target,
            best.variant,
            best.rmse
        );
        report.targets.push((target, target_report));
        winners.push(best);
    }

    Ok(RegressionOutcome {
        best: winners,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::RegressionMetrics;

    #[test]
    fn reports_keep_insertion_order() {
        let mut report = MetricsReport::default();
        report.push("Zeta", RegressionMetrics { mae: 1.0, rmse: 2.0 });
        report.push("Alpha", RegressionMetrics { mae: 0.5, rmse: 1.0 });
        let mut nested = RegressionReport::default();
        nested
            .targets
            .push((RegressionTarget::TotalFatalities, report));

        let json = serde_json::to_string(&nested).unwrap();
        assert_eq!(
            json,
            r#"{"total_fatalities":{"Zeta":{"mae":1.0,"rmse":2.0},"Alpha":{"mae":0.5,"rmse":1.0}}}"#
        );
    }
}
