//! Feature Selector Implementation

use std::collections::BTreeSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::HyperparameterConfig;
use crate::dataset::{FeatureMatrix, TargetVector};
use crate::error::SelectionError;
use crate::model::{ModelRegistry, GRADIENT_BOOSTING, RANDOM_FOREST};
use crate::ranking::ImportanceRanking;

/// Top features of both models and their consensus sets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    /// Ranked top-N of the gradient boosting model
    pub gradient_boosting: Vec<String>,
    /// Ranked top-N of the random forest model
    pub random_forest: Vec<String>,
    /// Features selected by both models
    pub common: BTreeSet<String>,
    /// Features selected by either model
    pub all: BTreeSet<String>,
}

impl SelectionResult {
    /// Combine two top-N lists into consensus sets
    pub fn from_selections(gradient_boosting: Vec<String>, random_forest: Vec<String>) -> Self {
        let gb: BTreeSet<String> = gradient_boosting.iter().cloned().collect();
        let rf: BTreeSet<String> = random_forest.iter().cloned().collect();

        Self {
            common: gb.intersection(&rf).cloned().collect(),
            all: gb.union(&rf).cloned().collect(),
            gradient_boosting,
            random_forest,
        }
    }
}

/// Ranks features by model importance and selects the strongest ones
#[derive(Debug, Clone)]
pub struct FeatureSelector {
    config: HyperparameterConfig,
    registry: ModelRegistry,
}

impl FeatureSelector {
    /// Selector over the built-in model kinds
    pub fn new(config: HyperparameterConfig) -> Self {
        Self::with_registry(config, ModelRegistry::default())
    }

    /// Selector over a custom set of model kinds
    pub fn with_registry(config: HyperparameterConfig, registry: ModelRegistry) -> Self {
        Self { config, registry }
    }

    /// Hyperparameters in use
    pub fn config(&self) -> &HyperparameterConfig {
        &self.config
    }

    /// Registered model kinds
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Fit `model_kind` and rank every column by its importance
    pub fn rank(
        &self,
        matrix: &FeatureMatrix,
        target: &TargetVector,
        model_kind: &str,
    ) -> Result<ImportanceRanking, SelectionError> {
        validate_inputs(matrix, target)?;

        let constructor = self
            .registry
            .get(model_kind)
            .ok_or_else(|| SelectionError::UnsupportedModel(model_kind.to_string()))?;
        let model_config = self.config.get(model_kind)?;
        let mut model = constructor(model_config)?;

        let start = Instant::now();
        model
            .fit(matrix.values(), target.values())
            .map_err(|source| SelectionError::Training {
                kind: model_kind.to_string(),
                source,
            })?;
        debug!(
            "Fitted {} on {} rows x {} columns in {}ms",
            model_kind,
            matrix.n_rows(),
            matrix.n_columns(),
            start.elapsed().as_millis()
        );

        let importances = model.importances();
        if importances.len() != matrix.n_columns() {
            return Err(SelectionError::InternalConsistency {
                expected: matrix.n_columns(),
                actual: importances.len(),
            });
        }

        Ok(ImportanceRanking::new(matrix.names(), &importances))
    }

    /// Names of the `top_n` most important columns for `model_kind`.
    ///
    /// Returns every column when `top_n` exceeds the column count.
    pub fn rank_and_select(
        &self,
        matrix: &FeatureMatrix,
        target: &TargetVector,
        model_kind: &str,
        top_n: usize,
    ) -> Result<Vec<String>, SelectionError> {
        if top_n == 0 {
            return Err(SelectionError::InvalidInput(
                "top_n must be at least 1".to_string(),
            ));
        }
        Ok(self.rank(matrix, target, model_kind)?.top_n(top_n))
    }

    /// Top features of both built-in models plus their intersection and union
    pub fn consensus_select(
        &self,
        matrix: &FeatureMatrix,
        target: &TargetVector,
        top_n: usize,
    ) -> Result<SelectionResult, SelectionError> {
        let gradient_boosting = self.rank_and_select(matrix, target, GRADIENT_BOOSTING, top_n)?;
        let random_forest = self.rank_and_select(matrix, target, RANDOM_FOREST, top_n)?;

        let result = SelectionResult::from_selections(gradient_boosting, random_forest);

        info!("Gradient boosting selected {} features", result.gradient_boosting.len());
        info!("Random forest selected {} features", result.random_forest.len());
        info!("Common features: {}", result.common.len());
        info!("Total unique features: {}", result.all.len());

        Ok(result)
    }
}

fn validate_inputs(matrix: &FeatureMatrix, target: &TargetVector) -> Result<(), SelectionError> {
    if matrix.n_columns() == 0 {
        return Err(SelectionError::InvalidInput(
            "feature matrix has no columns".to_string(),
        ));
    }
    if matrix.n_rows() == 0 {
        return Err(SelectionError::InvalidInput(
            "feature matrix has no rows".to_string(),
        ));
    }
    if matrix.n_rows() != target.len() {
        return Err(SelectionError::InvalidInput(format!(
            "feature matrix has {} rows but target has {} values",
            matrix.n_rows(),
            target.len()
        )));
    }
    if !matrix.is_finite() || !target.is_finite() {
        return Err(SelectionError::InvalidInput(
            "inputs contain NaN or infinite values".to_string(),
        ));
    }
    Ok(())
}
