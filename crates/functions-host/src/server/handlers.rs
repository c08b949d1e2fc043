//! Axum request handlers for all host endpoints.

use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::protocol::{ErrorResponse, HealthResponse};
use observability::{Arguments, Function, FunctionContext, HttpRequest};
use tracing::{error, warn};
use uuid::Uuid;

use super::{middleware::MAX_BODY_BYTES, state::AppState};

/// `ANY /api/:function`: invoke a registered function.
///
/// The function receives the request as its first positional argument and a
/// [`FunctionContext`] with a fresh invocation id as the `context` keyword
/// argument. It runs on the blocking pool; a panic becomes a `500`.
pub async fn invoke(
    State(state): State<AppState>,
    Path(function): Path<String>,
    request: Request<Body>,
) -> Response {
    let Some(func) = state.functions.get(&function) else {
        let err = ErrorResponse::new("not_found", format!("unknown function: {function}"));
        return (StatusCode::NOT_FOUND, Json(err)).into_response();
    };

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(b) => b,
        Err(e) => {
            warn!(function = %function, error = %e, "failed to read request body");
            let err = ErrorResponse::new("bad_request", "request body could not be read");
            return (StatusCode::BAD_REQUEST, Json(err)).into_response();
        }
    };

    let req = HttpRequest::from_parts(&parts, body).with_route_param("function", function.as_str());
    let context = FunctionContext::new(func.name(), Uuid::new_v4().to_string());
    let args = Arguments::new().arg(req).kwarg("context", context);

    match tokio::task::spawn_blocking(move || func.call(&args)).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            error!(function = %function, error = %e, "function did not complete");
            let err = ErrorResponse::new("internal_error", "function failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(err)).into_response()
        }
    }
}

/// `GET /health`: liveness check listing registered functions.
pub async fn health(State(state): State<AppState>) -> Response {
    let body = HealthResponse {
        status: "ok".into(),
        service: state.observability.service_name().to_owned(),
        error_reporting: state.observability.is_enabled(),
        functions: state.functions.names(),
    };
    (StatusCode::OK, Json(body)).into_response()
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}
