//! IO utilities for loading the feature and target tables.

pub mod tables;

pub use tables::{load_dataset, read_feature_csv, read_target_csv, TableReaderConfig};
