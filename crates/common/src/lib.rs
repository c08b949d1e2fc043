//! Shared error taxonomy and wire types used across `sentry-observability` crates.

pub mod error;
pub mod protocol;

pub use error::{AppError, DataError, FieldError, HandlerError, ValidationError};
