//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use observability::Observability;

use crate::functions::FunctionRegistry;

/// Application state shared across all request handlers.
///
/// Both fields are `Arc`-backed so Axum can clone the state per request.
#[derive(Clone)]
pub struct AppState {
    /// Wrapped functions, looked up by the `:function` path segment.
    pub functions: Arc<FunctionRegistry>,
    /// Error-tracking handle; reported on `/health`.
    pub observability: Observability,
}

impl AppState {
    /// Create a new [`AppState`] from a populated registry.
    pub fn new(functions: FunctionRegistry, observability: Observability) -> Self {
        Self {
            functions: Arc::new(functions),
            observability,
        }
    }
}

#[cfg(test)]
impl Default for AppState {
    /// Built-in functions with error reporting disabled, suitable for tests.
    fn default() -> Self {
        let observability = Observability::disabled("functions-host", "test");
        let functions = FunctionRegistry::builtin(&observability)
            .expect("function runtime integration is compiled in");
        Self::new(functions, observability)
    }
}
