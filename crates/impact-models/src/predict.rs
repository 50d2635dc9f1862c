//! Inference: load the persisted winners and assemble one prediction package
//! per input row.

use serde::Serialize;

use crate::data_handling::{FeatureTable, RegressionTarget};
use crate::error::{ImpactError, Result};
use crate::explain::{Explanation, FeatureImportance, TreeExplainer};
use crate::models::utils::argmax_rows;
use crate::models::{Classifier, Regressor};
use crate::preprocessing::LabelEncoder;
use crate::store::{ClassifierArtifact, EncoderArtifact, ModelStore, NamedArtifact, RegressorArtifact};

/// Error returned in place of predictions when no models are available.
pub const MODELS_NOT_LOADED: &str = "Models are not loaded.";

/// Every artifact needed to produce a prediction package.
#[derive(Debug, Clone)]
pub struct LoadedModels {
    pub classifier: ClassifierArtifact,
    pub encoder: LabelEncoder,
    /// One regressor per target, in `RegressionTarget::ALL` order.
    pub regressors: Vec<RegressorArtifact>,
}

impl LoadedModels {
    pub fn feature_names(&self) -> &[String] {
        &self.classifier.feature_names
    }

    pub fn is_explainable(&self) -> bool {
        self.classifier.model.tree_ensemble().is_some()
    }
}

/// Load the classifier, the label encoder and the four regressors.
///
/// Each missing artifact is logged by the store; if any is missing the
/// aggregate error lists them all.
pub fn load_models(store: &ModelStore) -> Result<LoadedModels> {
    log::info!("Loading models from {}", store.dir().display());
    let mut missing = Vec::new();

    let classifier = store.load::<ClassifierArtifact>(());
    if classifier.is_none() {
        missing.push(ClassifierArtifact::file_name(()));
    }
    let encoder = store.load::<EncoderArtifact>(());
    if encoder.is_none() {
        missing.push(EncoderArtifact::file_name(()));
    }
    let mut regressors = Vec::with_capacity(RegressionTarget::ALL.len());
    for target in RegressionTarget::ALL {
        match store.load::<RegressorArtifact>(target) {
            Some(artifact) => regressors.push(artifact),
            None => missing.push(RegressorArtifact::file_name(target)),
        }
    }

    let (Some(classifier), Some(encoder)) = (classifier, encoder) else {
        return Err(ImpactError::ModelsNotLoaded { missing });
    };
    if !missing.is_empty() {
        return Err(ImpactError::ModelsNotLoaded { missing });
    }

    let models = LoadedModels {
        classifier,
        encoder: encoder.encoder,
        regressors,
    };
    if let Err(e) = TreeExplainer::for_classifier(&models.classifier.model) {
        log::warn!(
            "Could not create SHAP explainer: {}. Explainability will be unavailable.",
            e
        );
    }
    log::info!("All models loaded successfully");
    Ok(models)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationPrediction {
    pub rank: String,
    /// Probability of the predicted class.
    pub confidence: f64,
}

/// Raw regressor outputs, one per target. Values are not clamped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionPredictions {
    pub total_population_affected: f64,
    pub total_fatalities: f64,
    pub total_injuries: f64,
    pub total_socio_economic_loss: f64,
}

impl RegressionPredictions {
    fn from_values(values: [f64; 4]) -> Self {
        Self {
            total_population_affected: values[RegressionTarget::TotalPopulationAffected.index()],
            total_fatalities: values[RegressionTarget::TotalFatalities.index()],
            total_injuries: values[RegressionTarget::TotalInjuries.index()],
            total_socio_economic_loss: values[RegressionTarget::TotalSocioEconomicLoss.index()],
        }
    }

    pub fn get(&self, target: RegressionTarget) -> f64 {
        match target {
            RegressionTarget::TotalPopulationAffected => self.total_population_affected,
            RegressionTarget::TotalFatalities => self.total_fatalities,
            RegressionTarget::TotalInjuries => self.total_injuries,
            RegressionTarget::TotalSocioEconomicLoss => self.total_socio_economic_loss,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionPackage {
    pub input_index: usize,
    pub classification: ClassificationPrediction,
    pub regression_predictions: RegressionPredictions,
    pub explainability: Explanation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PredictionResult {
    Package(PredictionPackage),
    Error { error: String },
}

impl PredictionResult {
    pub fn error<S: Into<String>>(message: S) -> Self {
        PredictionResult::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PredictionResult::Error { .. })
    }

    pub fn package(&self) -> Option<&PredictionPackage> {
        match self {
            PredictionResult::Package(p) => Some(p),
            PredictionResult::Error { .. } => None,
        }
    }
}

/// Predict severity, the four numeric outcomes and an explanation per row.
///
/// Returns one package per input row in input order, or a single error
/// entry if the models are absent or any step fails.
pub fn predict_full_package(models: Option<&LoadedModels>, features: &FeatureTable) -> Vec<PredictionResult> {
    let Some(models) = models else {
        return vec![PredictionResult::error(MODELS_NOT_LOADED)];
    };
    match predict_packages(models, features) {
        Ok(packages) => packages.into_iter().map(PredictionResult::Package).collect(),
        Err(e) => {
            log::error!("Prediction failed: {}", e);
            vec![PredictionResult::error(e.to_string())]
        }
    }
}

fn predict_packages(models: &LoadedModels, features: &FeatureTable) -> Result<Vec<PredictionPackage>> {
    let feature_names = models.feature_names();
    let x = features.align_to(feature_names)?;
    let n = x.nrows();

    let proba = models.classifier.model.predict_proba(&x)?;
    let classes = argmax_rows(&proba);
    let mut classifications = Vec::with_capacity(n);
    for (i, &class) in classes.iter().enumerate() {
        classifications.push(ClassificationPrediction {
            rank: models.encoder.decode(class)?.to_string(),
            confidence: proba[[i, class]],
        });
    }

    let mut regression = vec![[0.0; 4]; n];
    for artifact in &models.regressors {
        let x_target = features.align_to(&artifact.feature_names)?;
        for (i, value) in artifact.model.predict(&x_target)?.into_iter().enumerate() {
            regression[i][artifact.target.index()] = value;
        }
    }

    let explanations: Vec<Explanation> = match TreeExplainer::for_classifier(&models.classifier.model) {
        Ok(explainer) => {
            let attributions = explainer.explain(&x)?;
            (0..n)
                .map(|i| {
                    Explanation::from_importance(FeatureImportance::from_attributions(
                        feature_names,
                        attributions.row(i),
                    ))
                })
                .collect()
        }
        Err(_) => vec![Explanation::empty(); n],
    };

    Ok(classifications
        .into_iter()
        .zip(regression)
        .zip(explanations)
        .enumerate()
        .map(|(input_index, ((classification, values), explainability))| PredictionPackage {
            input_index,
            classification,
            regression_predictions: RegressionPredictions::from_values(values),
            explainability,
        })
        .collect())
}
