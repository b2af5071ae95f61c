//! Error types for configuration validation.

use thiserror::Error;

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration problems detected before the pipeline starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required value was not supplied.
    #[error("missing required configuration '{field}'")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },
    /// A value was supplied but failed validation.
    #[error("invalid configuration '{field}': {reason}")]
    InvalidField {
        /// Field that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when it is safe to echo.
        value: Option<String>,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: &'static str, value: &str) -> Self {
        Self::InvalidField {
            field,
            reason,
            value: Some(value.to_string()),
        }
    }

    /// Name of the field the error refers to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::MissingField { field } | Self::InvalidField { field, .. } => field,
        }
    }
}
