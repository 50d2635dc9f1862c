pub mod boosting;
pub mod ensemble;
pub mod forest;
pub mod linear;
pub mod tree;
pub mod utils;

pub mod classifier_trait;
pub mod factory;

pub use classifier_trait::{Classifier, Regressor};
pub use factory::{build_classifier, build_regressor, ClassifierModel, RegressorModel};
