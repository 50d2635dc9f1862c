//! CSV readers for the `features` and `targets` tables.
use std::collections::HashSet;
use std::path::Path;

use csv::StringRecord;
use ndarray::Array2;

use crate::config::PipelinePaths;
use crate::data_handling::{
    Dataset, FeatureTable, RegressionTarget, TargetTable, IDENTIFIER_COLUMNS, SEVERITY_COLUMN,
};
use crate::error::{ImpactError, Result};

/// Configuration for reading the feature table.
#[derive(Debug, Clone)]
pub struct TableReaderConfig {
    pub delimiter: u8,
    /// Columns dropped before modelling when present. Absence is not an error.
    pub ignore_columns: Vec<String>,
}

impl Default for TableReaderConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            ignore_columns: IDENTIFIER_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Load `features.csv` and `targets.csv` from the configured data root.
///
/// Fails with [`ImpactError::DataNotFound`] naming the attempted path when
/// either file is absent; callers must stop the run before fitting anything.
pub fn load_dataset(paths: &PipelinePaths) -> Result<Dataset> {
    log::info!("Loading data from {}", paths.data_dir.display());
    let features_path = paths.features_path();
    let targets_path = paths.targets_path();
    for path in [&features_path, &targets_path] {
        if !path.exists() {
            log::error!("Could not find data file at {}", path.display());
            return Err(ImpactError::DataNotFound { path: path.clone() });
        }
    }

    let features = read_feature_csv(&features_path, &TableReaderConfig::default())?;
    let targets = read_target_csv(&targets_path)?;
    let dataset = Dataset::new(features, targets)?;
    dataset.log_input_data_summary();
    Ok(dataset)
}

/// Read a feature table; every non-ignored column must be numeric.
pub fn read_feature_csv<P: AsRef<Path>>(path: P, config: &TableReaderConfig) -> Result<FeatureTable> {
    let mut reader = open_reader(path.as_ref(), config.delimiter)?;
    let headers = reader.headers()?.clone();
    let table = path.as_ref().display().to_string();

    let ignore: HashSet<&str> = config.ignore_columns.iter().map(|c| c.as_str()).collect();
    let feature_indices: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !ignore.contains(h.trim()))
        .map(|(idx, _)| idx)
        .collect();
    if feature_indices.is_empty() {
        return Err(ImpactError::InsufficientData(format!(
            "no feature columns detected in {}",
            table
        )));
    }

    let mut values = Vec::new();
    let mut n_rows = 0;
    for (row_idx, result) in reader.records().enumerate() {
        let record = result?;
        for &idx in &feature_indices {
            values.push(parse_cell(&record, &headers, idx, row_idx, &table)?);
        }
        n_rows += 1;
    }

    let names = feature_indices
        .iter()
        .map(|&idx| headers.get(idx).unwrap_or("").trim().to_string())
        .collect();
    let x = Array2::from_shape_vec((n_rows, feature_indices.len()), values)
        .map_err(|e| ImpactError::InsufficientData(format!("malformed feature matrix: {}", e)))?;
    FeatureTable::new(names, x)
}

/// Read the target table: `impact_rank` plus the four regression columns.
pub fn read_target_csv<P: AsRef<Path>>(path: P) -> Result<TargetTable> {
    let mut reader = open_reader(path.as_ref(), b',')?;
    let headers = reader.headers()?.clone();
    let table = path.as_ref().display().to_string();

    let rank_idx = require_column(&headers, SEVERITY_COLUMN, &table)?;
    let mut numeric_idx = [0usize; 4];
    for target in RegressionTarget::ALL {
        numeric_idx[target.index()] = require_column(&headers, target.column(), &table)?;
    }

    let mut impact_rank = Vec::new();
    let mut numeric: [Vec<f64>; 4] = Default::default();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result?;
        impact_rank.push(record.get(rank_idx).unwrap_or("").trim().to_string());
        for (k, &idx) in numeric_idx.iter().enumerate() {
            numeric[k].push(parse_cell(&record, &headers, idx, row_idx, &table)?);
        }
    }

    Ok(TargetTable {
        impact_rank,
        numeric,
    })
}

fn open_reader(path: &Path, delimiter: u8) -> Result<csv::Reader<std::fs::File>> {
    if !path.exists() {
        return Err(ImpactError::DataNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?)
}

fn require_column(headers: &StringRecord, name: &str, table: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| ImpactError::MissingColumn {
            table: table.to_string(),
            column: name.to_string(),
        })
}

fn parse_cell(
    record: &StringRecord,
    headers: &StringRecord,
    idx: usize,
    row_idx: usize,
    table: &str,
) -> Result<f64> {
    let raw = record.get(idx).unwrap_or("");
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ImpactError::Parse {
            table: table.to_string(),
            row: row_idx + 1,
            column: headers.get(idx).unwrap_or("").to_string(),
            value: raw.to_string(),
        })
}
