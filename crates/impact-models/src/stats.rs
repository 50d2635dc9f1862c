//! Held-out evaluation metrics used for model selection.
//!
//! Macro-averaged scores follow the usual convention: the average runs over
//! every label present in either `y_true` or `y_pred`, and a class with no
//! predictions (or no support) contributes 0 for the undefined ratio.
use serde::{Deserialize, Serialize};

/// Classification scores recorded for each candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision_macro: f64,
    pub recall_macro: f64,
    pub f1_macro: f64,
}

/// Regression scores recorded for each candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mae: f64,
    pub rmse: f64,
}

impl ClassificationMetrics {
    pub fn evaluate(y_true: &[usize], y_pred: &[usize]) -> Self {
        debug_assert_eq!(
            y_true.len(),
            y_pred.len(),
            "y_true and y_pred must have equal lengths"
        );
        let (precision_macro, recall_macro, f1_macro) = macro_scores(y_true, y_pred);
        Self {
            accuracy: accuracy(y_true, y_pred),
            precision_macro,
            recall_macro,
            f1_macro,
        }
    }
}

impl RegressionMetrics {
    pub fn evaluate(y_true: &[f64], y_pred: &[f64]) -> Self {
        Self {
            mae: mean_absolute_error(y_true, y_pred),
            rmse: root_mean_squared_error(y_true, y_pred),
        }
    }
}

pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

/// Returns `(precision, recall, f1)`, each averaged without class weighting.
pub fn macro_scores(y_true: &[usize], y_pred: &[usize]) -> (f64, f64, f64) {
    let mut labels: Vec<usize> = y_true.iter().chain(y_pred).copied().collect();
    labels.sort_unstable();
    labels.dedup();
    if labels.is_empty() {
        return (0.0, 0.0, 0.0);
    }

    let mut precision_sum = 0.0;
    let mut recall_sum = 0.0;
    let mut f1_sum = 0.0;
    for &label in &labels {
        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut fn_ = 0usize;
        for (&t, &p) in y_true.iter().zip(y_pred) {
            match (t == label, p == label) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
                (false, false) => {}
            }
        }
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        precision_sum += precision;
        recall_sum += recall;
        f1_sum += f1;
    }

    let n = labels.len() as f64;
    (precision_sum / n, recall_sum / n, f1_sum / n)
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

pub fn mean_absolute_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    debug_assert_eq!(y_true.len(), y_pred.len(), "y_true and y_pred must have equal lengths");
    if y_true.is_empty() {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / y_true.len() as f64
}

pub fn root_mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    debug_assert_eq!(y_true.len(), y_pred.len(), "y_true and y_pred must have equal lengths");
    if y_true.is_empty() {
        return 0.0;
    }
    let mse = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64;
    mse.sqrt()
}
