//! JSON bodies served by the function host outside of wrapped handlers.

use serde::{Deserialize, Serialize};

/// Standard error body for requests that never reach a wrapped handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"not_found"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the process is serving.
    pub status: String,
    /// Service name reported with every captured event.
    pub service: String,
    /// Whether an error-tracking client is active.
    pub error_reporting: bool,
    /// Names of the registered functions, sorted.
    pub functions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_new() {
        let e = ErrorResponse::new("not_found", "unknown function: nope");
        assert_eq!(e.code, "not_found");
        assert!(e.message.contains("nope"));
    }

    #[test]
    fn health_response_serialises_field_names() {
        let h = HealthResponse {
            status: "ok".into(),
            service: "orders".into(),
            error_reporting: false,
            functions: vec!["echo".into()],
        };
        let v = serde_json::to_value(&h).unwrap();
        assert_eq!(v["error_reporting"], false);
        assert_eq!(v["functions"][0], "echo");
    }
}
