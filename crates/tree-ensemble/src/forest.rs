//! Random Forest Regressor
//!
//! Bagged CART trees with per-split feature sampling. Importance is mean
//! decrease in impurity: each tree's split gains normalized to one,
//! averaged over the trees that made at least one split.

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sampling::{bootstrap, seeded_rng};
use crate::tree::{RegressionTree, TreeParams};
use crate::{check_training_data, normalize, EnsembleError};

/// Named rules for the number of features tried per split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureRule {
    All,
    Sqrt,
    Log2,
}

/// Number of features tried per split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxFeatures {
    /// Absolute count
    Count(usize),
    /// Fraction of the feature count, in (0, 1]
    Fraction(f64),
    Rule(FeatureRule),
}

impl Default for MaxFeatures {
    fn default() -> Self {
        MaxFeatures::Fraction(1.0)
    }
}

impl MaxFeatures {
    /// Resolve against the number of columns (always at least 1)
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = n_features as f64;
        let k = match *self {
            MaxFeatures::Count(count) => count,
            MaxFeatures::Fraction(fraction) => (fraction * n) as usize,
            MaxFeatures::Rule(FeatureRule::All) => n_features,
            MaxFeatures::Rule(FeatureRule::Sqrt) => n.sqrt() as usize,
            MaxFeatures::Rule(FeatureRule::Log2) => n.log2() as usize,
        };
        k.clamp(1, n_features.max(1))
    }

    fn validate(&self) -> Result<(), EnsembleError> {
        match *self {
            MaxFeatures::Count(0) => Err(invalid("max_features", "count must be at least 1")),
            MaxFeatures::Fraction(f) if !(f > 0.0 && f <= 1.0) => {
                Err(invalid("max_features", "fraction must be in (0, 1]"))
            }
            _ => Ok(()),
        }
    }
}

/// Random forest hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RandomForestParams {
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth of each tree (None = unlimited)
    pub max_depth: Option<usize>,
    /// Minimum rows needed to split a node
    pub min_samples_split: usize,
    /// Minimum rows in each leaf
    pub min_samples_leaf: usize,
    /// Features tried per split
    pub max_features: MaxFeatures,
    /// Train each tree on a bootstrap sample
    pub bootstrap: bool,
    /// Seed for bootstrap and feature sampling
    pub random_state: Option<u64>,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::default(),
            bootstrap: true,
            random_state: None,
        }
    }
}

impl RandomForestParams {
    /// Check parameter ranges
    pub fn validate(&self) -> Result<(), EnsembleError> {
        if self.n_estimators == 0 {
            return Err(invalid("n_estimators", "must be at least 1"));
        }
        if self.max_depth == Some(0) {
            return Err(invalid("max_depth", "must be at least 1"));
        }
        if self.min_samples_split < 2 {
            return Err(invalid("min_samples_split", "must be at least 2"));
        }
        if self.min_samples_leaf == 0 {
            return Err(invalid("min_samples_leaf", "must be at least 1"));
        }
        self.max_features.validate()
    }
}

fn invalid(name: &'static str, reason: &str) -> EnsembleError {
    EnsembleError::InvalidParameter {
        name,
        reason: reason.to_string(),
    }
}

/// Random forest of regression trees
#[derive(Debug, Clone)]
pub struct RandomForestRegressor {
    params: RandomForestParams,
    base_score: f64,
    trees: Vec<RegressionTree>,
    n_features: usize,
    importances: Option<Vec<f64>>,
}

impl RandomForestRegressor {
    /// Create an unfitted forest
    pub fn new(params: RandomForestParams) -> Self {
        Self {
            params,
            base_score: 0.0,
            trees: Vec::new(),
            n_features: 0,
            importances: None,
        }
    }

    /// Hyperparameters in use
    pub fn params(&self) -> &RandomForestParams {
        &self.params
    }

    /// Fit on a feature matrix (rows = samples) and target
    pub fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), EnsembleError> {
        check_training_data(x, y)?;
        self.params.validate()?;

        let n_rows = x.nrows();
        let n_features = x.ncols();
        let mut rng = seeded_rng(self.params.random_state);
        let seeds: Vec<u64> = (0..self.params.n_estimators).map(|_| rng.gen()).collect();

        // CART on squared error around the target mean: leaves hold `mean(leaf) - base_score`
        let base_score = y.mean().unwrap_or(0.0);
        let grad: Vec<f64> = y.iter().map(|v| base_score - v).collect();
        let hess = vec![1.0; n_rows];
        let features: Vec<usize> = (0..n_features).collect();
        let tree_params = TreeParams {
            max_depth: self.params.max_depth,
            min_samples_split: self.params.min_samples_split,
            min_samples_leaf: self.params.min_samples_leaf,
            max_features: Some(self.params.max_features.resolve(n_features)),
            ..Default::default()
        };
        let use_bootstrap = self.params.bootstrap;

        let trees: Vec<RegressionTree> = seeds
            .par_iter()
            .map(|&seed| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let rows = if use_bootstrap {
                    bootstrap(&mut rng, n_rows)
                } else {
                    (0..n_rows).collect()
                };
                RegressionTree::grow(x, &grad, &hess, &rows, &features, &tree_params, &mut rng)
            })
            .collect();

        let mut importances = vec![0.0; n_features];
        let mut contributing = 0usize;
        for tree in trees.iter().filter(|t| !t.is_stump()) {
            let mut tree_importances = tree.split_gains().to_vec();
            normalize(&mut tree_importances);
            for (total, v) in importances.iter_mut().zip(tree_importances) {
                *total += v;
            }
            contributing += 1;
        }
        if contributing > 0 {
            for v in importances.iter_mut() {
                *v /= contributing as f64;
            }
        }
        normalize(&mut importances);

        debug!(
            "Fitted random forest: {} trees ({} split) on {} rows x {} features",
            trees.len(),
            contributing,
            n_rows,
            n_features
        );

        self.base_score = base_score;
        self.trees = trees;
        self.n_features = n_features;
        self.importances = Some(importances);
        Ok(())
    }

    /// Predict targets for every row of `x` (mean over trees)
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
        let n_trees = self.trees.len() as f64;
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                self.base_score
                    + self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees
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
