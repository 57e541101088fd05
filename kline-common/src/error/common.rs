//! Common error types shared across crates.

use thiserror::Error;

/// Configuration-related errors.
///
/// Use this for configuration loading, parsing, and validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// Required field is missing
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Field has invalid value
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// Invalid configuration combination
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigurationError {
    /// Create an InvalidValue error
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigurationError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
