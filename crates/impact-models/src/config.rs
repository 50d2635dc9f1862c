use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{ImpactError, Result};

/// A named candidate estimator. Names must be unique within a candidate list
/// since they key the metrics report.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ModelConfig {
    pub name: String,

    #[serde(flatten)]
    pub model_type: ModelType,
}

/// Supported algorithm families and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum ModelType {
    /// Multinomial logistic regression (classification only).
    LogisticRegression {
        learning_rate: f64,
        max_iter: usize,
        l2_penalty: f64,
    },
    DecisionTree {
        max_depth: Option<usize>,
        min_samples_split: usize,
        min_samples_leaf: usize,
    },
    RandomForest {
        n_estimators: usize,
        max_depth: Option<usize>,
        min_samples_leaf: usize,
        max_features: MaxFeatures,
        bootstrap: bool,
    },
    GradientBoosting {
        n_estimators: usize,
        learning_rate: f64,
        max_depth: usize,
        min_samples_leaf: usize,
        subsample: f64,
    },
}

/// Number of features considered at each split.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub enum MaxFeatures {
    All,
    Sqrt,
    Fraction(f64),
}

impl MaxFeatures {
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt().round() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).round() as usize,
        };
        n.clamp(1, n_features.max(1))
    }
}

impl ModelType {
    /// Short identifier for logs and error messages.
    pub fn family(&self) -> &'static str {
        match self {
            ModelType::LogisticRegression { .. } => "logistic_regression",
            ModelType::DecisionTree { .. } => "decision_tree",
            ModelType::RandomForest { .. } => "random_forest",
            ModelType::GradientBoosting { .. } => "gradient_boosting",
        }
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', '-'], "").as_str() {
            "logisticregression" | "logistic" => Ok(ModelType::LogisticRegression {
                learning_rate: 0.1,
                max_iter: 1000,
                l2_penalty: 1e-3,
            }),
            "decisiontree" | "tree" => Ok(ModelType::DecisionTree {
                max_depth: None,
                min_samples_split: 2,
                min_samples_leaf: 1,
            }),
            "randomforest" | "forest" => Ok(ModelType::RandomForest {
                n_estimators: 100,
                max_depth: None,
                min_samples_leaf: 1,
                max_features: MaxFeatures::Sqrt,
                bootstrap: true,
            }),
            "gradientboosting" | "gbdt" | "xgboost" => Ok(ModelType::GradientBoosting {
                n_estimators: 100,
                learning_rate: 0.3,
                max_depth: 6,
                min_samples_leaf: 1,
                subsample: 1.0,
            }),
            _ => Err(format!(
                "Unknown model type: {}. Expected one of logistic_regression, decision_tree, random_forest, gradient_boosting",
                s
            )),
        }
    }
}

impl ModelConfig {
    pub fn new(name: &str, model_type: ModelType) -> Self {
        Self {
            name: name.to_string(),
            model_type,
        }
    }

    fn defaults(name: &str) -> Self {
        // The names below are all known to `ModelType::from_str`.
        let model_type = ModelType::from_str(name).unwrap_or(ModelType::DecisionTree {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        });
        Self::new(name, model_type)
    }
}

/// Largest number of rows the training-time attribution summary may use.
pub const MAX_EXPLAIN_SAMPLE_SIZE: usize = 1000;

/// Settings for one training run.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct TrainingConfig {
    pub test_size: f64,
    pub random_state: u64,
    /// Upper bound on rows used for the training-time attribution summary.
    pub explain_sample_size: usize,
    pub classifiers: Vec<ModelConfig>,
    pub regressors: Vec<ModelConfig>,
    pub write_report: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let mut forest_regressor = ModelConfig::defaults("RandomForest");
        if let ModelType::RandomForest { max_features, .. } = &mut forest_regressor.model_type {
            *max_features = MaxFeatures::All;
        }

        Self {
            test_size: 0.2,
            random_state: 42,
            explain_sample_size: MAX_EXPLAIN_SAMPLE_SIZE,
            classifiers: vec![
                ModelConfig::defaults("LogisticRegression"),
                ModelConfig::defaults("DecisionTree"),
                ModelConfig::defaults("RandomForest"),
                ModelConfig::defaults("GradientBoosting"),
            ],
            regressors: vec![
                ModelConfig::defaults("DecisionTree"),
                forest_regressor,
                ModelConfig::defaults("GradientBoosting"),
            ],
            write_report: true,
        }
    }
}

impl TrainingConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|source| ImpactError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let config: TrainingConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(ImpactError::InvalidConfig(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.explain_sample_size == 0 || self.explain_sample_size > MAX_EXPLAIN_SAMPLE_SIZE {
            return Err(ImpactError::InvalidConfig(format!(
                "explain_sample_size must be in 1..={}, got {}",
                MAX_EXPLAIN_SAMPLE_SIZE, self.explain_sample_size
            )));
        }
        if self.classifiers.is_empty() || self.regressors.is_empty() {
            return Err(ImpactError::InvalidConfig(
                "at least one classifier and one regressor candidate are required".to_string(),
            ));
        }
        for list in [&self.classifiers, &self.regressors] {
            let mut names: Vec<&str> = list.iter().map(|c| c.name.as_str()).collect();
            names.sort_unstable();
            if let Some(w) = names.windows(2).find(|w| w[0] == w[1]) {
                return Err(ImpactError::InvalidConfig(format!(
                    "duplicate candidate name '{}'",
                    w[0]
                )));
            }
        }
        Ok(())
    }
}

/// Directory layout for one process. Built once at start-up and handed to
/// every component that touches the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePaths {
    pub data_dir: PathBuf,
    pub model_dir: PathBuf,
    pub reports_dir: PathBuf,
}

impl PipelinePaths {
    pub fn new(data_dir: PathBuf, model_dir: PathBuf, reports_dir: PathBuf) -> Self {
        Self {
            data_dir,
            model_dir,
            reports_dir,
        }
    }

    /// Resolve optional overrides against the fixed layout under `root`.
    pub fn resolve(
        root: &Path,
        data_dir: Option<PathBuf>,
        model_dir: Option<PathBuf>,
        reports_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            data_dir: data_dir.unwrap_or_else(|| root.join("data").join("input")),
            model_dir: model_dir.unwrap_or_else(|| root.join("models")),
            reports_dir: reports_dir.unwrap_or_else(|| root.join("reports")),
        }
    }

    /// `$IMPACT_HOME` when set, otherwise the working directory.
    pub fn install_root() -> PathBuf {
        std::env::var_os("IMPACT_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn metrics_dir(&self) -> PathBuf {
        self.reports_dir.join("metrics")
    }

    pub fn figures_dir(&self) -> PathBuf {
        self.reports_dir.join("figures")
    }

    pub fn features_path(&self) -> PathBuf {
        self.data_dir.join("features.csv")
    }

    pub fn targets_path(&self) -> PathBuf {
        self.data_dir.join("targets.csv")
    }

    /// Create the model, metrics and figures directories.
    pub fn ensure_output_dirs(&self) -> Result<()> {
        for dir in [self.model_dir.clone(), self.metrics_dir(), self.figures_dir()] {
            std::fs::create_dir_all(&dir).map_err(|source| ImpactError::Io {
                path: dir.clone(),
                source,
            })?;
        }
        log::debug!(
            "Paths initialized: data={} models={} reports={}",
            self.data_dir.display(),
            self.model_dir.display(),
            self.reports_dir.display()
        );
        Ok(())
    }
}
