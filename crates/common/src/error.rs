//! Error types raised by wrapped request handlers.
//!
//! The exception-handling wrapper in the `observability` crate classifies a
//! [`HandlerError`] into an HTTP response:
//! - [`HandlerError::Validation`] / [`HandlerError::Value`] → 400
//! - [`HandlerError::App`] → the error's own status code
//! - [`HandlerError::Data`] → 400
//! - [`HandlerError::Unexpected`] → 500

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status code carried by an [`AppError`] built with [`Default`].
pub const DEFAULT_APP_STATUS: u16 = 500;

/// Detail text carried by an [`AppError`] built with [`Default`].
pub const DEFAULT_APP_DETAIL: &str = "Unexpected error";

/// Any error a wrapped handler may return.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Input failed structured validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A value could not be interpreted (bad JSON, unparsable number, ...).
    #[error("{0}")]
    Value(String),

    /// Application error that decides its own status code and detail.
    #[error(transparent)]
    App(#[from] AppError),

    /// The persistence layer rejected a statement or its parameters.
    #[error(transparent)]
    Data(#[from] DataError),

    /// Anything else.
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Value`].
    pub fn value(message: impl Into<String>) -> Self {
        HandlerError::Value(message.into())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        HandlerError::Value(e.to_string())
    }
}

/// Application-specific error carrying an HTTP status code and a detail
/// message safe to return to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{detail}")]
pub struct AppError {
    pub status_code: u16,
    pub detail: String,
}

impl AppError {
    pub fn new(status_code: u16, detail: impl Into<String>) -> Self {
        Self {
            status_code,
            detail: detail.into(),
        }
    }

    /// `404` with the given detail.
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(404, detail)
    }

    /// `409` with the given detail.
    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::new(409, detail)
    }
}

impl Default for AppError {
    fn default() -> Self {
        Self::new(DEFAULT_APP_STATUS, DEFAULT_APP_DETAIL)
    }
}

/// One failed field check inside a [`ValidationError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Dot-separated location of the offending field.
    pub field: String,
    pub message: String,
}

/// Structured validation failure for a named model.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub struct ValidationError {
    pub model: String,
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            errors: Vec::new(),
        }
    }

    /// Record a failed check on `field`.
    pub fn with_field(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.errors.len() == 1 { "error" } else { "errors" };
        write!(f, "{} validation {noun} for {}", self.errors.len(), self.model)?;
        for e in &self.errors {
            write!(f, "\n{}\n  {}", e.field, e.message)?;
        }
        Ok(())
    }
}

/// Error reported by the persistence layer for an invalid statement or
/// invalid statement parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct DataError {
    /// The offending statement, when known.
    pub statement: Option<String>,
    pub message: String,
}

impl DataError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            statement: None,
            message: message.into(),
        }
    }

    pub fn with_statement(mut self, statement: impl Into<String>) -> Self {
        self.statement = Some(statement.into());
        self
    }
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.statement {
            Some(stmt) => write!(f, "{} [SQL: {stmt}]", self.message),
            None => f.write_str(&self.message),
        }
    }
}
