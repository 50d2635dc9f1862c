//! impact-models: disaster impact severity classification, outcome regression
//! and per-prediction feature attributions.
//!
//! The crate turns a row-aligned feature/target dataset into a severity
//! classifier and four independent regressors (population affected,
//! fatalities, injuries, socio-economic loss), choosing each winner from a
//! set of candidates by held-out score. Tree-based winners are explained with
//! exact TreeSHAP, both as training-time summaries and per prediction.
//!
//! Models are implemented in-crate so the explainer can walk their trees.
pub mod config;
pub mod data_handling;
pub mod error;
pub mod explain;
pub mod io;
pub mod models;
pub mod pipeline;
pub mod predict;
pub mod preprocessing;
pub mod report;
pub mod stats;
pub mod store;
pub mod trainer;

pub use config::{PipelinePaths, TrainingConfig};
pub use error::{ImpactError, Result};
pub use pipeline::{run_training, TrainingSummary};
pub use predict::{load_models, predict_full_package, LoadedModels, PredictionResult};
pub use store::ModelStore;
