use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{ImpactError, Result};
use crate::models::classifier_trait::Classifier;
use crate::models::utils::softmax_rows;
use crate::preprocessing::Scaler;

/// Stop early once every gradient entry falls below this.
const GRADIENT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogisticRegressionParams {
    pub learning_rate: f64,
    pub max_iter: usize,
    pub l2_penalty: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct LinearState {
    scaler: Scaler,
    /// Shape `(n_features, n_classes)`.
    weights: Array2<f64>,
    bias: Array1<f64>,
}

/// Multinomial logistic regression trained by full-batch gradient descent on
/// standardized features.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogisticRegression {
    params: LogisticRegressionParams,
    state: Option<LinearState>,
}

impl LogisticRegression {
    pub fn new(params: LogisticRegressionParams) -> Self {
        Self {
            params,
            state: None,
        }
    }

    fn margins(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| ImpactError::NotFitted("logistic_regression".to_string()))?;
        Ok(state.scaler.transform(x).dot(&state.weights) + &state.bias)
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()> {
        let (n, d) = x.dim();
        if n == 0 || y.len() != n {
            return Err(ImpactError::InsufficientData(format!(
                "{} rows but {} labels",
                n,
                y.len()
            )));
        }
        let scaler = Scaler::fit(x)?;
        let xs = scaler.transform(x);

        let mut one_hot = Array2::<f64>::zeros((n, n_classes));
        for (i, &label) in y.iter().enumerate() {
            one_hot[[i, label]] = 1.0;
        }

        let mut weights = Array2::<f64>::zeros((d, n_classes));
        let mut bias = Array1::<f64>::zeros(n_classes);
        let lr = self.params.learning_rate;
        let l2 = self.params.l2_penalty;

        let mut iterations = 0;
        for _ in 0..self.params.max_iter {
            iterations += 1;
            let mut proba = xs.dot(&weights) + &bias;
            softmax_rows(&mut proba);
            let error = proba - &one_hot;

            let grad_w = xs.t().dot(&error) / n as f64 + &weights * l2;
            let grad_b = error.sum_axis(Axis(0)) / n as f64;

            weights = weights - &grad_w * lr;
            bias = bias - &grad_b * lr;

            let max_grad = grad_w
                .iter()
                .chain(grad_b.iter())
                .fold(0.0f64, |acc, g| acc.max(g.abs()));
            if max_grad < GRADIENT_TOLERANCE {
                break;
            }
        }
        log::trace!("Logistic regression stopped after {} iterations", iterations);

        self.state = Some(LinearState {
            scaler,
            weights,
            bias,
        });
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let mut proba = self.margins(x)?;
        softmax_rows(&mut proba);
        Ok(proba)
    }

    fn name(&self) -> &str {
        "logistic_regression"
    }
}
