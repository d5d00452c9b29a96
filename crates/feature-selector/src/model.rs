//! Importance Models and Registry

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ndarray::{ArrayView1, ArrayView2};
use tree_ensemble::{
    GradientBoostingParams, GradientBoostingRegressor, RandomForestParams, RandomForestRegressor,
};

use crate::config::ModelConfig;
use crate::error::{BoxError, SelectionError};

/// Registry key of the gradient boosting model
pub const GRADIENT_BOOSTING: &str = "gradient_boosting";
/// Registry key of the random forest model
pub const RANDOM_FOREST: &str = "random_forest";

/// A regressor that reports per-column importances after fitting
pub trait ImportanceModel: Send {
    /// Train on a feature matrix (rows = samples) and its targets
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), BoxError>;

    /// Importance scores aligned with the fitted columns (empty before fit)
    fn importances(&self) -> Vec<f64>;
}

/// Builds an unfitted model from its hyperparameters
pub type ModelConstructor =
    Arc<dyn Fn(&ModelConfig) -> Result<Box<dyn ImportanceModel>, SelectionError> + Send + Sync>;

/// Gradient boosted trees
pub struct GradientBoostingModel {
    inner: GradientBoostingRegressor,
}

impl GradientBoostingModel {
    /// Build from a hyperparameter mapping; unknown or out-of-range values are rejected
    pub fn from_config(config: &ModelConfig) -> Result<Self, SelectionError> {
        let params: GradientBoostingParams = config
            .parse()
            .map_err(|e| SelectionError::configuration(GRADIENT_BOOSTING, e))?;
        params
            .validate()
            .map_err(|e| SelectionError::configuration(GRADIENT_BOOSTING, e))?;
        Ok(Self {
            inner: GradientBoostingRegressor::new(params),
        })
    }
}

impl ImportanceModel for GradientBoostingModel {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), BoxError> {
        self.inner.fit(x, y)?;
        Ok(())
    }

    fn importances(&self) -> Vec<f64> {
        self.inner
            .feature_importances()
            .map(<[f64]>::to_vec)
            .unwrap_or_default()
    }
}

/// Random forest
pub struct RandomForestModel {
    inner: RandomForestRegressor,
}

impl RandomForestModel {
    /// Build from a hyperparameter mapping; unknown or out-of-range values are rejected
    pub fn from_config(config: &ModelConfig) -> Result<Self, SelectionError> {
        let params: RandomForestParams = config
            .parse()
            .map_err(|e| SelectionError::configuration(RANDOM_FOREST, e))?;
        params
            .validate()
            .map_err(|e| SelectionError::configuration(RANDOM_FOREST, e))?;
        Ok(Self {
            inner: RandomForestRegressor::new(params),
        })
    }
}

impl ImportanceModel for RandomForestModel {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), BoxError> {
        self.inner.fit(x, y)?;
        Ok(())
    }

    fn importances(&self) -> Vec<f64> {
        self.inner
            .feature_importances()
            .map(<[f64]>::to_vec)
            .unwrap_or_default()
    }
}

/// Model constructors keyed by model kind
#[derive(Clone)]
pub struct ModelRegistry {
    constructors: HashMap<String, ModelConstructor>,
}

impl ModelRegistry {
    /// Registry with no model kinds
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Register (or replace) a model kind
    pub fn register<F>(&mut self, kind: impl Into<String>, constructor: F)
    where
        F: Fn(&ModelConfig) -> Result<Box<dyn ImportanceModel>, SelectionError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors.insert(kind.into(), Arc::new(constructor));
    }

    /// Constructor for a model kind
    pub fn get(&self, kind: &str) -> Option<&ModelConstructor> {
        self.constructors.get(kind)
    }

    /// Whether a model kind is registered
    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    /// Registered model kinds in sorted order
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl Default for ModelRegistry {
    /// Registry with the built-in gradient boosting and random forest kinds
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(GRADIENT_BOOSTING, |config| {
            Ok(Box::new(GradientBoostingModel::from_config(config)?) as Box<dyn ImportanceModel>)
        });
        registry.register(RANDOM_FOREST, |config| {
            Ok(Box::new(RandomForestModel::from_config(config)?) as Box<dyn ImportanceModel>)
        });
        registry
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    #[test]
    fn test_default_kinds() {
        let registry = ModelRegistry::default();
        assert_eq!(registry.kinds(), vec![GRADIENT_BOOSTING, RANDOM_FOREST]);
        assert!(registry.contains(RANDOM_FOREST));
        assert!(!registry.contains("svm"));
    }

    #[test]
    fn test_unknown_parameter_is_configuration_error() {
        let config = ModelConfig::new().with("n_estimatorz", 10);
        assert!(matches!(
            GradientBoostingModel::from_config(&config),
            Err(SelectionError::Configuration { kind, .. }) if kind == GRADIENT_BOOSTING
        ));
    }

    #[test]
    fn test_out_of_range_parameter_is_configuration_error() {
        let config = ModelConfig::new().with("min_samples_leaf", 0);
        assert!(matches!(
            RandomForestModel::from_config(&config),
            Err(SelectionError::Configuration { kind, .. }) if kind == RANDOM_FOREST
        ));
    }

    #[test]
    fn test_importances_empty_before_fit() {
        let model = RandomForestModel::from_config(&ModelConfig::new()).unwrap();
        assert!(model.importances().is_empty());
    }

    #[test]
    fn test_registry_builds_working_model() {
        let registry = ModelRegistry::default();
        let constructor = registry.get(GRADIENT_BOOSTING).unwrap();
        let config = ModelConfig::new()
            .with("n_estimators", 5)
            .with("random_state", 3);
        let mut model = constructor(&config).unwrap();

        let x = Array2::from_shape_fn((12, 2), |(i, j)| (i * (j + 1)) as f64);
        let y = Array1::from_shape_fn(12, |i| i as f64);
        model.fit(x.view(), y.view()).unwrap();

        assert_eq!(model.importances().len(), 2);
    }

    #[test]
    fn test_fit_error_is_boxed() {
        let mut model = RandomForestModel::from_config(&ModelConfig::new()).unwrap();
        let x = Array2::<f64>::zeros((3, 2));
        let y = Array1::<f64>::zeros(2);
        let err = model.fit(x.view(), y.view()).unwrap_err();
        assert!(err.to_string().contains("Shape mismatch"));
    }
}
