//! Gradient Boosted Trees
//!
//! Second-order boosting on squared error, in the style of XGBoost's
//! `gbtree` booster: each round fits a [`RegressionTree`] on the current
//! residual gradients, optionally on a row subsample and a per-tree column
//! subsample, and adds it shrunk by the learning rate.

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sampling::{seeded_rng, subsample};
use crate::tree::{RegressionTree, TreeParams};
use crate::{check_training_data, normalize, EnsembleError};

/// How split statistics are turned into feature importances
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceType {
    /// Average gain of the splits using the feature
    #[default]
    Gain,
    /// Total gain of the splits using the feature
    TotalGain,
    /// Number of splits using the feature
    Weight,
}

/// Gradient boosting hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GradientBoostingParams {
    /// Number of boosting rounds
    pub n_estimators: usize,
    /// Shrinkage applied to each tree
    pub learning_rate: f64,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Minimum hessian sum in a child
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// Minimum loss reduction to split
    pub gamma: f64,
    /// Row fraction sampled per round
    pub subsample: f64,
    /// Column fraction sampled per tree
    pub colsample_bytree: f64,
    /// Importance statistic reported after fitting
    pub importance_type: ImportanceType,
    /// Seed for row/column sampling
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            importance_type: ImportanceType::Gain,
            random_state: None,
        }
    }
}

impl GradientBoostingParams {
    /// Check parameter ranges
    pub fn validate(&self) -> Result<(), EnsembleError> {
        if self.n_estimators == 0 {
            return Err(invalid("n_estimators", "must be at least 1"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(invalid("learning_rate", "must be a positive number"));
        }
        if self.max_depth == 0 {
            return Err(invalid("max_depth", "must be at least 1"));
        }
        if !(self.min_child_weight >= 0.0) {
            return Err(invalid("min_child_weight", "must be non-negative"));
        }
        if !(self.reg_lambda >= 0.0) {
            return Err(invalid("reg_lambda", "must be non-negative"));
        }
        if !(self.gamma >= 0.0) {
            return Err(invalid("gamma", "must be non-negative"));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(invalid("subsample", "must be in (0, 1]"));
        }
        if !(self.colsample_bytree > 0.0 && self.colsample_bytree <= 1.0) {
            return Err(invalid("colsample_bytree", "must be in (0, 1]"));
        }
        Ok(())
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: Some(self.max_depth),
            min_child_weight: self.min_child_weight,
            reg_lambda: self.reg_lambda,
            gamma: self.gamma,
            ..Default::default()
        }
    }
}

fn invalid(name: &'static str, reason: &str) -> EnsembleError {
    EnsembleError::InvalidParameter {
        name,
        reason: reason.to_string(),
    }
}

/// Gradient boosted regression trees
#[derive(Debug, Clone)]
pub struct GradientBoostingRegressor {
    params: GradientBoostingParams,
    base_score: f64,
    trees: Vec<RegressionTree>,
    n_features: usize,
    importances: Option<Vec<f64>>,
}

impl GradientBoostingRegressor {
    /// Create an unfitted regressor
    pub fn new(params: GradientBoostingParams) -> Self {
        Self {
            params,
            base_score: 0.0,
            trees: Vec::new(),
            n_features: 0,
            importances: None,
        }
    }

    /// Hyperparameters in use
    pub fn params(&self) -> &GradientBoostingParams {
        &self.params
    }

    /// Fit on a feature matrix (rows = samples) and target
    pub fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), EnsembleError> {
        check_training_data(x, y)?;
        self.params.validate()?;

        let n_rows = x.nrows();
        let n_features = x.ncols();
        let mut rng = seeded_rng(self.params.random_state);
        let tree_params = self.params.tree_params();

        let base_score = y.mean().unwrap_or(0.0);
        let mut predictions = vec![base_score; n_rows];
        let hess = vec![1.0; n_rows];
        let mut split_counts = vec![0usize; n_features];
        let mut split_gains = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(self.params.n_estimators);

        for round in 0..self.params.n_estimators {
            let grad: Vec<f64> = predictions
                .iter()
                .zip(y.iter())
                .map(|(p, t)| p - t)
                .collect();

            let rows = subsample(&mut rng, n_rows, self.params.subsample);
            let features = subsample(&mut rng, n_features, self.params.colsample_bytree);

            let mut tree =
                RegressionTree::grow(x, &grad, &hess, &rows, &features, &tree_params, &mut rng);
            tree.shrink(self.params.learning_rate);

            for (i, pred) in predictions.iter_mut().enumerate() {
                *pred += tree.predict_row(x.row(i));
            }
            for f in 0..n_features {
                split_counts[f] += tree.split_counts()[f];
                split_gains[f] += tree.split_gains()[f];
            }

            if round % 25 == 0 {
                debug!("Boosting round {}: {} leaves", round, tree.n_leaves());
            }
            trees.push(tree);
        }

        let mut importances: Vec<f64> = match self.params.importance_type {
            ImportanceType::Gain => split_gains
                .iter()
                .zip(&split_counts)
                .map(|(&g, &c)| if c > 0 { g / c as f64 } else { 0.0 })
                .collect(),
            ImportanceType::TotalGain => split_gains,
            ImportanceType::Weight => split_counts.iter().map(|&c| c as f64).collect(),
        };
        normalize(&mut importances);

        debug!(
            "Fitted gradient boosting: {} trees on {} rows x {} features",
            trees.len(),
            n_rows,
            n_features
        );

        self.base_score = base_score;
        self.trees = trees;
        self.n_features = n_features;
        self.importances = Some(importances);
        Ok(())
    }

    /// Predict targets for every row of `x`
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, EnsembleError> {
        if self.importances.is_none() {
            return Err(EnsembleError::NotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(EnsembleError::FeatureCountMismatch {
                expected: self.n_features,
                actual: x.ncols(),
            });
        }
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                self.base_score + self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
            })
            .collect())
    }

    /// Normalized per-feature importances, aligned with the fitted columns
    pub fn feature_importances(&self) -> Result<&[f64], EnsembleError> {
        self.importances.as_deref().ok_or(EnsembleError::NotFitted)
    }

    /// Number of fitted trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// y is linear in column 0; columns 1 and 2 are unrelated
    fn signal_in_first_column(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 3), |(i, j)| match j {
            0 => i as f64,
            1 => (i % 7) as f64,
            _ => ((i * 13) % 5) as f64,
        });
        let y = Array1::from_shape_fn(n, |i| 3.0 * i as f64 + 10.0);
        (x, y)
    }

    fn seeded(n_estimators: usize) -> GradientBoostingParams {
        GradientBoostingParams {
            n_estimators,
            random_state: Some(42),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_params_are_valid() {
        assert!(GradientBoostingParams::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_params() {
        let params = GradientBoostingParams {
            subsample: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(EnsembleError::InvalidParameter { name: "subsample", .. })
        ));

        let params = GradientBoostingParams {
            learning_rate: -0.1,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_params_from_json() {
        let params: GradientBoostingParams = serde_json::from_value(serde_json::json!({
            "n_estimators": 50,
            "learning_rate": 0.05,
            "importance_type": "total_gain"
        }))
        .unwrap();
        assert_eq!(params.n_estimators, 50);
        assert_eq!(params.importance_type, ImportanceType::TotalGain);
        assert_eq!(params.max_depth, 6);

        let unknown = serde_json::from_value::<GradientBoostingParams>(serde_json::json!({
            "n_estimatorz": 50
        }));
        assert!(unknown.is_err());
    }

    #[test]
    fn test_importances_follow_signal() {
        let (x, y) = signal_in_first_column(60);
        let mut model = GradientBoostingRegressor::new(seeded(20));
        model.fit(x.view(), y.view()).unwrap();

        let importances = model.feature_importances().unwrap();
        assert_eq!(importances.len(), 3);
        assert!(importances[0] > importances[1]);
        assert!(importances[0] > importances[2]);
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_reduces_error() {
        let (x, y) = signal_in_first_column(60);
        let mut model = GradientBoostingRegressor::new(seeded(50));
        model.fit(x.view(), y.view()).unwrap();

        let predictions = model.predict(x.view()).unwrap();
        let mse = (&predictions - &y).mapv(|d| d * d).mean().unwrap();
        assert!(mse < 1.0, "mse too high: {}", mse);
        assert_eq!(model.n_trees(), 50);
    }

    #[test]
    fn test_weight_importance_counts_splits() {
        let (x, y) = signal_in_first_column(40);
        let params = GradientBoostingParams {
            importance_type: ImportanceType::Weight,
            ..seeded(5)
        };
        let mut model = GradientBoostingRegressor::new(params);
        model.fit(x.view(), y.view()).unwrap();

        let importances = model.feature_importances().unwrap();
        assert!(importances.iter().all(|&v| v >= 0.0));
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_subsampled_fit_is_reproducible() {
        let (x, y) = signal_in_first_column(50);
        let params = GradientBoostingParams {
            subsample: 0.7,
            colsample_bytree: 0.67,
            ..seeded(10)
        };

        let mut a = GradientBoostingRegressor::new(params.clone());
        let mut b = GradientBoostingRegressor::new(params);
        a.fit(x.view(), y.view()).unwrap();
        b.fit(x.view(), y.view()).unwrap();

        assert_eq!(a.feature_importances().unwrap(), b.feature_importances().unwrap());
    }

    #[test]
    fn test_unfitted_model() {
        let model = GradientBoostingRegressor::new(GradientBoostingParams::default());
        assert!(matches!(model.feature_importances(), Err(EnsembleError::NotFitted)));
        let x = Array2::<f64>::zeros((1, 2));
        assert!(matches!(model.predict(x.view()), Err(EnsembleError::NotFitted)));
    }

    #[test]
    fn test_predict_checks_width() {
        let (x, y) = signal_in_first_column(20);
        let mut model = GradientBoostingRegressor::new(seeded(3));
        model.fit(x.view(), y.view()).unwrap();

        let narrow = Array2::<f64>::zeros((2, 2));
        assert!(matches!(
            model.predict(narrow.view()),
            Err(EnsembleError::FeatureCountMismatch { expected: 3, actual: 2 })
        ));
    }
}
