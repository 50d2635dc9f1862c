use ndarray::Array2;

use crate::error::Result;
use crate::models::ensemble::TreeEnsemble;
use crate::models::utils::argmax_rows;

/// Contract shared by every severity classifier.
///
/// Labels are dense codes `0..n_classes` produced by the label encoder. The
/// class count is passed explicitly so probability columns stay aligned with
/// the encoder even when a class is absent from the training split.
pub trait Classifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()>;

    /// Class probabilities, shape `(n_rows, n_classes)`.
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        Ok(argmax_rows(&self.predict_proba(x)?))
    }

    /// Tree structure for attribution, or `None` for non-tree models.
    fn tree_ensemble(&self) -> Option<TreeEnsemble<'_>> {
        None
    }

    fn name(&self) -> &str {
        "classifier"
    }
}

/// Contract shared by the numeric-outcome regressors.
pub trait Regressor {
    fn fit(&mut self, x: &Array2<f64>, y: &[f64]) -> Result<()>;

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>>;

    fn tree_ensemble(&self) -> Option<TreeEnsemble<'_>> {
        None
    }

    fn name(&self) -> &str {
        "regressor"
    }
}
