//! Tree Ensemble Regressors
//!
//! Gradient boosted and random forest regression trees that report
//! per-feature importances after fitting.

mod boosting;
mod forest;
mod sampling;
mod tree;

pub use boosting::{GradientBoostingParams, GradientBoostingRegressor, ImportanceType};
pub use forest::{FeatureRule, MaxFeatures, RandomForestParams, RandomForestRegressor};
pub use tree::{RegressionTree, TreeParams};

use ndarray::{ArrayView1, ArrayView2};
use thiserror::Error;

/// Errors during ensemble training and prediction
#[derive(Debug, Error)]
pub enum EnsembleError {
    #[error("Training data is empty")]
    EmptyDataset,
    #[error("Shape mismatch: {rows} rows but {targets} targets")]
    ShapeMismatch { rows: usize, targets: usize },
    #[error("Feature count mismatch: expected {expected}, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },
    #[error("Training data contains non-finite values")]
    NonFiniteValue,
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("Model has not been fitted")]
    NotFitted,
}

/// Check that a feature matrix and target vector can be trained on
pub(crate) fn check_training_data(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
) -> Result<(), EnsembleError> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(EnsembleError::EmptyDataset);
    }
    if x.nrows() != y.len() {
        return Err(EnsembleError::ShapeMismatch {
            rows: x.nrows(),
            targets: y.len(),
        });
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(EnsembleError::NonFiniteValue);
    }
    Ok(())
}

/// Scale values in place so they sum to one (left untouched if the sum is zero)
pub(crate) fn normalize(values: &mut [f64]) {
    let sum: f64 = values.iter().sum();
    if sum > 0.0 {
        for v in values.iter_mut() {
            *v /= sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1, Array2};

    #[test]
    fn test_check_rejects_empty() {
        let x = Array2::<f64>::zeros((0, 3));
        let y = Array1::<f64>::zeros(0);
        assert!(matches!(
            check_training_data(x.view(), y.view()),
            Err(EnsembleError::EmptyDataset)
        ));
    }

    #[test]
    fn test_check_rejects_shape_mismatch() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let y = array![1.0];
        assert!(matches!(
            check_training_data(x.view(), y.view()),
            Err(EnsembleError::ShapeMismatch { rows: 2, targets: 1 })
        ));
    }

    #[test]
    fn test_check_rejects_nan() {
        let x = array![[1.0, f64::NAN]];
        let y = array![1.0];
        assert!(matches!(
            check_training_data(x.view(), y.view()),
            Err(EnsembleError::NonFiniteValue)
        ));
    }

    #[test]
    fn test_normalize() {
        let mut values = vec![1.0, 3.0];
        normalize(&mut values);
        assert!((values[0] - 0.25).abs() < 1e-12);

        let mut zeros = vec![0.0, 0.0];
        normalize(&mut zeros);
        assert_eq!(zeros, vec![0.0, 0.0]);
    }
}
