//! Selection Error Types

use thiserror::Error;

/// Boxed error returned by model collaborators
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur during feature selection
#[derive(Debug, Error)]
pub enum SelectionError {
    /// Empty matrix, shape mismatch, bad `top_n` or non-finite values
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Model kind not present in the registry
    #[error("Unsupported model kind: {0}")]
    UnsupportedModel(String),

    /// Missing or malformed hyperparameters for a model kind
    #[error("Configuration error for {kind}: {reason}")]
    Configuration { kind: String, reason: String },

    /// Configuration source could not be read or parsed
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    /// Model fit failed
    #[error("Training {kind} failed: {source}")]
    Training {
        kind: String,
        #[source]
        source: BoxError,
    },

    /// Model reported importances that do not line up with the columns
    #[error("Importance vector has {actual} entries for {expected} columns")]
    InternalConsistency { expected: usize, actual: usize },
}

impl SelectionError {
    pub(crate) fn configuration(kind: &str, reason: impl ToString) -> Self {
        SelectionError::Configuration {
            kind: kind.to_string(),
            reason: reason.to_string(),
        }
    }
}
