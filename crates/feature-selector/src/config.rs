//! Model Hyperparameter Configuration
//!
//! Hyperparameters are a mapping of model kind to a mapping of parameter
//! name to value, typically loaded from `model_config.yaml`:
//!
//! ```yaml
//! gradient_boosting:
//!   n_estimators: 200
//!   learning_rate: 0.05
//! random_forest:
//!   n_estimators: 100
//!   random_state: 42
//! ```
//!
//! Environment variables of the form `RUL_MODEL_<KIND>__<PARAM>` override file
//! values, e.g. `RUL_MODEL_RANDOM_FOREST__N_ESTIMATORS=200`. Top-level entries
//! that are not parameter tables are skipped with a warning.

use std::collections::BTreeMap;
use std::path::Path;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::SelectionError;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "RUL_MODEL";

/// Hyperparameters for one model kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelConfig(Map<String, Value>);

impl ModelConfig {
    /// Empty parameter mapping (model defaults)
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Raw parameter value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Number of parameters set
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no parameter is set
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Deserialize into a typed parameter struct
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.0.clone()))
    }
}

impl From<Map<String, Value>> for ModelConfig {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Hyperparameters for every configured model kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HyperparameterConfig {
    models: BTreeMap<String, ModelConfig>,
}

impl HyperparameterConfig {
    /// Empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a file (format chosen by extension) plus environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SelectionError> {
        let path = path.as_ref();
        info!("Loading model configuration from {}", path.display());

        let settings = Config::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config = Self::from_settings(settings)?;
        debug!("Configured model kinds: {:?}", config.kinds());
        Ok(config)
    }

    /// Parse configuration text in the given format (no environment overrides)
    pub fn parse(contents: &str, format: FileFormat) -> Result<Self, SelectionError> {
        let settings = Config::builder()
            .add_source(File::from_str(contents, format))
            .build()?;
        Ok(Self::from_settings(settings)?)
    }

    fn from_settings(settings: Config) -> Result<Self, ConfigError> {
        let raw: BTreeMap<String, Value> = settings.try_deserialize()?;
        let models = raw
            .into_iter()
            .filter_map(|(kind, value)| match value {
                Value::Object(params) => Some((kind, ModelConfig::from(params))),
                other => {
                    warn!(
                        "Ignoring configuration entry {}: expected a parameter table, got {}",
                        kind, other
                    );
                    None
                }
            })
            .collect();
        Ok(Self { models })
    }

    /// Build from in-memory model configs
    pub fn from_models<I, K>(models: I) -> Self
    where
        I: IntoIterator<Item = (K, ModelConfig)>,
        K: Into<String>,
    {
        Self {
            models: models.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Add or replace a model kind's parameters
    pub fn insert(&mut self, kind: impl Into<String>, config: ModelConfig) {
        self.models.insert(kind.into(), config);
    }

    /// Parameters for a model kind
    pub fn get(&self, kind: &str) -> Result<&ModelConfig, SelectionError> {
        self.models
            .get(kind)
            .ok_or_else(|| SelectionError::configuration(kind, "no hyperparameters configured"))
    }

    /// Configured model kinds in sorted order
    pub fn kinds(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }
}
