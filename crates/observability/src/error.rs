//! Errors raised while configuring the observability layer itself.
//!
//! Errors returned by wrapped handlers never surface here: they are converted
//! into responses by [`crate::handler`].

use thiserror::Error;

/// Top-level error type of the `observability` crate.
#[derive(Debug, Error)]
pub enum ObservabilityError {
    /// A caller-supplied argument was unusable (e.g. a blank DSN).
    #[error("{0}")]
    InvalidArgument(String),

    /// A configuration option had the wrong type or an out-of-range value.
    #[error("invalid value for option `{key}`: {reason}")]
    InvalidOption { key: String, reason: String },

    /// The DSN could not be parsed by the SDK.
    #[error("invalid Sentry DSN: {0}")]
    InvalidDsn(#[from] sentry::types::ParseDsnError),

    /// An optional integration required by the caller was not compiled in.
    #[error("the {integration} integration is not available: {hint}")]
    IntegrationUnavailable {
        integration: &'static str,
        hint: &'static str,
    },

    /// Environment settings could not be loaded.
    #[error("failed to load settings: {0}")]
    Settings(#[from] config::ConfigError),
}

impl ObservabilityError {
    pub(crate) fn invalid_option(key: &str, reason: impl Into<String>) -> Self {
        ObservabilityError::InvalidOption {
            key: key.to_owned(),
            reason: reason.into(),
        }
    }
}
