use std::error::Error;
use std::fmt;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, ImpactError>;

/// Failures raised while loading data, fitting models, persisting artifacts
/// or predicting.
#[derive(Debug)]
pub enum ImpactError {
    /// A required input table is missing at the attempted path.
    DataNotFound { path: PathBuf },
    MissingColumn { table: String, column: String },
    Parse {
        table: String,
        row: usize,
        column: String,
        value: String,
    },
    RowCountMismatch { features: usize, targets: usize },
    InsufficientData(String),
    Csv(csv::Error),
    Io { path: PathBuf, source: std::io::Error },
    Serialization(serde_json::Error),
    /// One or more required artifacts could not be loaded before prediction.
    ModelsNotLoaded { missing: Vec<String> },
    NotFitted(String),
    UnknownLabel(String),
    UnknownClassIndex(usize),
    UnsupportedModel { model: String, task: String },
    /// The attribution engine only walks tree-structured models.
    ExplainerUnavailable { model: String },
    FeatureMismatch { missing: Vec<String> },
    InvalidConfig(String),
}

impl fmt::Display for ImpactError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ImpactError::DataNotFound { path } => write!(
                f,
                "Could not find data file at {}. Please ensure 'features.csv' and 'targets.csv' exist.",
                path.display()
            ),
            ImpactError::MissingColumn { table, column } => {
                write!(f, "Required column '{}' missing from {}", column, table)
            }
            ImpactError::Parse {
                table,
                row,
                column,
                value,
            } => write!(
                f,
                "Could not parse value '{}' in {} (row {}, column '{}') as a number",
                value, table, row, column
            ),
            ImpactError::RowCountMismatch { features, targets } => write!(
                f,
                "Feature table has {} rows but target table has {} rows",
                features, targets
            ),
            ImpactError::InsufficientData(msg) => write!(f, "Insufficient data: {}", msg),
            ImpactError::Csv(e) => write!(f, "CSV error: {}", e),
            ImpactError::Io { path, source } => {
                write!(f, "I/O error at {}: {}", path.display(), source)
            }
            ImpactError::Serialization(e) => write!(f, "Serialization error: {}", e),
            ImpactError::ModelsNotLoaded { missing } => write!(
                f,
                "Models are not loaded (missing: {}). Please run training first.",
                missing.join(", ")
            ),
            ImpactError::NotFitted(model) => write!(f, "Model {} has not been fitted", model),
            ImpactError::UnknownLabel(label) => {
                write!(f, "Label '{}' was not seen when the encoder was fit", label)
            }
            ImpactError::UnknownClassIndex(idx) => {
                write!(f, "Class index {} is outside the encoder range", idx)
            }
            ImpactError::UnsupportedModel { model, task } => {
                write!(f, "Model type {} does not support {}", model, task)
            }
            ImpactError::ExplainerUnavailable { model } => write!(
                f,
                "Could not create a tree explainer for {}. Is the model tree-based?",
                model
            ),
            ImpactError::FeatureMismatch { missing } => write!(
                f,
                "Input is missing feature columns used at fit time: {}",
                missing.join(", ")
            ),
            ImpactError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl Error for ImpactError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ImpactError::Csv(e) => Some(e),
            ImpactError::Io { source, .. } => Some(source),
            ImpactError::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<csv::Error> for ImpactError {
    fn from(e: csv::Error) -> Self {
        ImpactError::Csv(e)
    }
}

impl From<serde_json::Error> for ImpactError {
    fn from(e: serde_json::Error) -> Self {
        ImpactError::Serialization(e)
    }
}
