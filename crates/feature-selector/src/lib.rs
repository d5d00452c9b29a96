//! RUL Feature Selection
//!
//! Ranks sensor features by the importances of tree-ensemble regressors and
//! selects the consensus set used to train remaining-useful-life models.

mod config;
mod dataset;
mod error;
mod model;
mod ranking;
mod selector;

pub use self::config::{HyperparameterConfig, ModelConfig, ENV_PREFIX};
pub use dataset::{FeatureMatrix, TargetVector};
pub use error::{BoxError, SelectionError};
pub use model::{
    GradientBoostingModel, ImportanceModel, ModelConstructor, ModelRegistry, RandomForestModel,
    GRADIENT_BOOSTING, RANDOM_FOREST,
};
pub use ranking::{FeatureImportance, ImportanceRanking};
pub use selector::{FeatureSelector, SelectionResult};

pub use ::config::FileFormat;
