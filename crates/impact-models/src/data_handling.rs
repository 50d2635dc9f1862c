//! Feature/target tables and the helpers that split and sample them.
//!
//! Tables are row-aligned: row `i` of the feature table describes the same
//! event as row `i` of the target table.
use std::fmt;

use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{ImpactError, Result};

/// Identifier columns that may be stored alongside features but never feed a model.
pub const IDENTIFIER_COLUMNS: [&str; 2] = ["event_id", "GEOID"];

/// Name of the categorical severity column in the target table.
pub const SEVERITY_COLUMN: &str = "impact_rank";

/// The four numeric outcomes, each modelled independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegressionTarget {
    TotalPopulationAffected,
    TotalFatalities,
    TotalInjuries,
    TotalSocioEconomicLoss,
}

impl RegressionTarget {
    pub const ALL: [RegressionTarget; 4] = [
        RegressionTarget::TotalPopulationAffected,
        RegressionTarget::TotalFatalities,
        RegressionTarget::TotalInjuries,
        RegressionTarget::TotalSocioEconomicLoss,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            RegressionTarget::TotalPopulationAffected => "total_population_affected",
            RegressionTarget::TotalFatalities => "total_fatalities",
            RegressionTarget::TotalInjuries => "total_injuries",
            RegressionTarget::TotalSocioEconomicLoss => "total_socio_economic_loss",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            RegressionTarget::TotalPopulationAffected => 0,
            RegressionTarget::TotalFatalities => 1,
            RegressionTarget::TotalInjuries => 2,
            RegressionTarget::TotalSocioEconomicLoss => 3,
        }
    }
}

impl fmt::Display for RegressionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Named numeric feature matrix (rows are events).
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    pub names: Vec<String>,
    pub x: Array2<f64>,
}

impl FeatureTable {
    pub fn new(names: Vec<String>, x: Array2<f64>) -> Result<Self> {
        if names.len() != x.ncols() {
            return Err(ImpactError::InvalidConfig(format!(
                "{} feature names for {} columns",
                names.len(),
                x.ncols()
            )));
        }
        Ok(Self { names, x })
    }

    /// Build a table from a single row of `(name, value)` pairs.
    pub fn from_row(row: &[(&str, f64)]) -> Self {
        let names = row.iter().map(|(n, _)| n.to_string()).collect();
        let values: Vec<f64> = row.iter().map(|(_, v)| *v).collect();
        let x = Array2::from_shape_vec((1, values.len()), values)
            .unwrap_or_else(|_| Array2::zeros((1, 0)));
        Self { names, x }
    }

    pub fn nrows(&self) -> usize {
        self.x.nrows()
    }

    pub fn select_rows(&self, indices: &[usize]) -> FeatureTable {
        FeatureTable {
            names: self.names.clone(),
            x: self.x.select(Axis(0), indices),
        }
    }

    /// Reorder columns to `order`, ignoring any extra input columns.
    pub fn align_to(&self, order: &[String]) -> Result<Array2<f64>> {
        let mut positions = Vec::with_capacity(order.len());
        let mut missing = Vec::new();
        for name in order {
            match self.names.iter().position(|n| n == name) {
                Some(p) => positions.push(p),
                None => missing.push(name.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(ImpactError::FeatureMismatch { missing });
        }
        Ok(self.x.select(Axis(1), &positions))
    }
}

/// Severity labels plus the four numeric targets, column-major.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetTable {
    pub impact_rank: Vec<String>,
    pub numeric: [Vec<f64>; 4],
}

impl TargetTable {
    pub fn nrows(&self) -> usize {
        self.impact_rank.len()
    }

    pub fn column(&self, target: RegressionTarget) -> &[f64] {
        &self.numeric[target.index()]
    }

    pub fn select_rows(&self, indices: &[usize]) -> TargetTable {
        TargetTable {
            impact_rank: indices.iter().map(|&i| self.impact_rank[i].clone()).collect(),
            numeric: std::array::from_fn(|k| indices.iter().map(|&i| self.numeric[k][i]).collect()),
        }
    }
}

/// Row-aligned feature and target tables.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub features: FeatureTable,
    pub targets: TargetTable,
}

impl Dataset {
    pub fn new(features: FeatureTable, targets: TargetTable) -> Result<Self> {
        if features.nrows() != targets.nrows() {
            return Err(ImpactError::RowCountMismatch {
                features: features.nrows(),
                targets: targets.nrows(),
            });
        }
        Ok(Self { features, targets })
    }

    pub fn log_input_data_summary(&self) {
        log::info!(
            "Loaded {} events with {} feature columns",
            self.features.nrows(),
            self.features.names.len()
        );
        let mut ranks: Vec<&str> = self.targets.impact_rank.iter().map(|s| s.as_str()).collect();
        ranks.sort_unstable();
        ranks.dedup();
        for rank in ranks {
            log::debug!(
                "  impact_rank={}: {} events",
                rank,
                self.targets.impact_rank.iter().filter(|r| *r == rank).count()
            );
        }
    }
}

/// Row indices for a single held-out split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n_rows` with a seeded RNG and hold out `ceil(test_size * n)`
/// rows, keeping at least one row on each side.
pub fn train_test_split(n_rows: usize, test_size: f64, seed: u64) -> Result<TrainTestSplit> {
    if n_rows < 2 {
        return Err(ImpactError::InsufficientData(format!(
            "need at least 2 rows to split, got {}",
            n_rows
        )));
    }
    let n_test = ((test_size * n_rows as f64).ceil() as usize).clamp(1, n_rows - 1);

    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test = indices[..n_test].to_vec();
    let train = indices[n_test..].to_vec();
    log::trace!("Split {} rows into {} train / {} test", n_rows, train.len(), test.len());
    Ok(TrainTestSplit { train, test })
}

/// Seeded sample of at most `max_rows` distinct row indices, in sampled order.
pub fn sample_rows(n_rows: usize, max_rows: usize, seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let amount = max_rows.min(n_rows);
    rand::seq::index::sample(&mut rng, n_rows, amount).into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn split_is_disjoint_and_complete() {
        let split = train_test_split(10, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.train.len(), 8);
        let mut all: Vec<usize> = split.train.iter().chain(split.test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn split_is_seeded() {
        assert_eq!(train_test_split(50, 0.2, 7).unwrap(), train_test_split(50, 0.2, 7).unwrap());
    }

    #[test]
    fn split_keeps_one_row_each_side() {
        let split = train_test_split(2, 0.9, 1).unwrap();
        assert_eq!(split.train.len(), 1);
        assert_eq!(split.test.len(), 1);
        assert!(train_test_split(1, 0.2, 1).is_err());
    }

    #[test]
    fn sample_is_bounded() {
        assert_eq!(sample_rows(5, 1000, 42).len(), 5);
        let s = sample_rows(5000, 1000, 42);
        assert_eq!(s.len(), 1000);
        let mut d = s.clone();
        d.sort_unstable();
        d.dedup();
        assert_eq!(d.len(), 1000);
    }

    #[test]
    fn align_reorders_and_reports_missing() {
        let table = FeatureTable::new(
            vec!["b".into(), "a".into(), "extra".into()],
            array![[2.0, 1.0, 9.0]],
        )
        .unwrap();
        let aligned = table.align_to(&["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(aligned, array![[1.0, 2.0]]);

        let err = table.align_to(&["c".to_string()]).unwrap_err();
        assert!(matches!(err, ImpactError::FeatureMismatch { .. }));
    }

    #[test]
    fn regression_target_columns() {
        let cols: Vec<_> = RegressionTarget::ALL.iter().map(|t| t.column()).collect();
        assert_eq!(
            cols,
            vec![
                "total_population_affected",
                "total_fatalities",
                "total_injuries",
                "total_socio_economic_loss"
            ]
        );
        for (i, t) in RegressionTarget::ALL.iter().enumerate() {
            assert_eq!(t.index(), i);
        }
    }
}
