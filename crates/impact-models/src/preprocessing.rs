//! Small preprocessing utilities shared by the trainers and models.
//!
//! Provides the severity `LabelEncoder`, which must be fit once and reused
//! verbatim at inference, and a mean/std `Scaler` used by the linear model.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{ImpactError, Result};

/// Bijection between severity label strings and dense codes `0..K-1`.
///
/// Classes are kept sorted, so `["low", "medium", "high"]` encodes as
/// `high=0, low=1, medium=2`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<S: AsRef<str>>(labels: &[S]) -> Self {
        let mut classes: Vec<String> = labels.iter().map(|l| l.as_ref().to_string()).collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn encode(&self, label: &str) -> Result<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| ImpactError::UnknownLabel(label.to_string()))
    }

    pub fn transform<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<usize>> {
        labels.iter().map(|l| self.encode(l.as_ref())).collect()
    }

    pub fn decode(&self, code: usize) -> Result<&str> {
        self.classes
            .get(code)
            .map(|s| s.as_str())
            .ok_or(ImpactError::UnknownClassIndex(code))
    }

    pub fn inverse_transform(&self, codes: &[usize]) -> Result<Vec<String>> {
        codes.iter().map(|&c| self.decode(c).map(str::to_string)).collect()
    }
}

/// Simple standard scaler (per-column mean/std).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Scaler {
    /// Minimum stddev to avoid division by zero when transforming.
    const MIN_STD: f64 = 1e-9;

    /// Fit from rows = samples, columns = features.
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(ImpactError::InsufficientData(
                "scaler requires a non-empty matrix".to_string(),
            ));
        }
        let mean: Array1<f64> = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let std = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s < Self::MIN_STD { 1.0 } else { s });
        Ok(Scaler {
            mean: mean.to_vec(),
            std: std.to_vec(),
        })
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut out = x.clone();
        for mut row in out.rows_mut() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = (*v - self.mean[c]) / self.std[c];
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn encoder_is_sorted_bijection() {
        let enc = LabelEncoder::fit(&["low", "low", "high", "medium", "high"]);
        assert_eq!(enc.classes(), &["high", "low", "medium"]);
        let codes = enc.transform(&["low", "medium", "high"]).unwrap();
        assert_eq!(codes, vec![1, 2, 0]);
        assert_eq!(
            enc.inverse_transform(&codes).unwrap(),
            vec!["low", "medium", "high"]
        );
    }

    #[test]
    fn encoder_rejects_unknowns() {
        let enc = LabelEncoder::fit(&["a", "b"]);
        assert!(matches!(enc.encode("c"), Err(ImpactError::UnknownLabel(_))));
        assert!(matches!(enc.decode(2), Err(ImpactError::UnknownClassIndex(2))));
    }

    #[test]
    fn scaler_standardizes_and_handles_constant_columns() {
        let x = array![[1.0, 5.0], [3.0, 5.0]];
        let sc = Scaler::fit(&x).unwrap();
        let t = sc.transform(&x);
        assert!((t[[0, 0]] + 1.0).abs() < 1e-12);
        assert!((t[[1, 0]] - 1.0).abs() < 1e-12);
        assert_eq!(t[[0, 1]], 0.0);
    }
}
