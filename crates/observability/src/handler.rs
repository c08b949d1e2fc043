//! Exception-handling wrapper for HTTP function handlers.
//!
//! [`Observability::handle_exceptions`] wraps a handler returning
//! `Result<HttpResponse, HandlerError>` into an [`ExceptionHandled`] whose
//! [`call`](ExceptionHandled::call) always produces an [`HttpResponse`].
//!
//! Per call the wrapper:
//! 1. recovers request/context metadata from the arguments,
//! 2. names the transaction on a hub forked for this call,
//! 3. pushes a scope tagged with that metadata and runs the handler in it,
//!    capturing any error (or panic) before the scope is popped,
//! 4. classifies the error into a status, body and log severity.

use std::any::{type_name, Any};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use common::HandlerError;
use sentry::integrations::panic::PanicIntegration;
use sentry::{protocol::Context, Hub, Scope};
use tracing::{error, warn};

use crate::client::Observability;
use crate::error::ObservabilityError;
use crate::invocation::{Arguments, Invocation};
use crate::runtime::{self, HttpResponse};

/// Log level a classified error is reported at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// Response and log line derived from a handler error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub status_code: u16,
    pub body: String,
    /// Content type override; `None` keeps the runtime default.
    pub mimetype: Option<&'static str>,
    pub severity: Severity,
    pub log_message: String,
}

/// Map a handler error to its response.
///
/// | Error | Status | Body |
/// |---|---|---|
/// | `Validation`, `Value` | 400 | the error text (JSON content type) |
/// | `App` | the error's status | the error's detail |
/// | `Data` | 400 | `[<service>] Invalid input format: <error>` |
/// | `Unexpected` | 500 | `[<service>] Unexpected error: <error>` |
pub fn classify(err: &HandlerError, service_name: &str) -> Classified {
    match err {
        HandlerError::Validation(_) | HandlerError::Value(_) => Classified {
            status_code: 400,
            body: err.to_string(),
            mimetype: Some("application/json"),
            severity: Severity::Warning,
            log_message: format!("[{service_name}] {err}"),
        },
        HandlerError::App(app) => Classified {
            status_code: app.status_code,
            body: app.detail.clone(),
            mimetype: None,
            severity: Severity::Warning,
            log_message: format!("[{service_name}] {}", app.detail),
        },
        HandlerError::Data(data) => Classified {
            status_code: 400,
            body: format!("[{service_name}] Invalid input format: {data}"),
            mimetype: None,
            severity: Severity::Warning,
            log_message: format!("[{service_name}] Invalid input: {data}"),
        },
        HandlerError::Unexpected(e) => Classified {
            status_code: 500,
            body: format!("[{service_name}] Unexpected error: {e}"),
            mimetype: None,
            severity: Severity::Error,
            log_message: format!("[{service_name}] {e}"),
        },
    }
}

impl Classified {
    fn log(&self) {
        match self.severity {
            Severity::Warning => warn!(status = self.status_code, "{}", self.log_message),
            Severity::Error => error!(status = self.status_code, "{}", self.log_message),
        }
    }

    pub fn into_response(self) -> HttpResponse {
        let response = HttpResponse::new(self.body, self.status_code);
        match self.mimetype {
            Some(mimetype) => response.with_mimetype(mimetype),
            None => response,
        }
    }
}

/// A handler wrapped by [`Observability::handle_exceptions`].
pub struct ExceptionHandled<F> {
    handler: F,
    name: String,
    observability: Observability,
}

/// Object-safe view of a wrapped handler, for registries.
pub trait Function: Send + Sync {
    fn name(&self) -> &str;
    fn call(&self, args: &Arguments) -> HttpResponse;
}

impl Observability {
    /// Wrap `handler`, naming it after the function's own name.
    ///
    /// Closures are named `{{closure}}`; use
    /// [`handle_exceptions_named`](Self::handle_exceptions_named) for them.
    ///
    /// # Errors
    ///
    /// Returns [`ObservabilityError::IntegrationUnavailable`] if the function
    /// runtime integration is not compiled in.
    pub fn handle_exceptions<F>(&self, handler: F) -> Result<ExceptionHandled<F>, ObservabilityError>
    where
        F: Fn(&Arguments) -> Result<HttpResponse, HandlerError>,
    {
        self.handle_exceptions_named(short_type_name::<F>(), handler)
    }

    /// Wrap `handler` under an explicit name.
    ///
    /// # Errors
    ///
    /// See [`handle_exceptions`](Self::handle_exceptions).
    pub fn handle_exceptions_named<F>(
        &self,
        name: impl Into<String>,
        handler: F,
    ) -> Result<ExceptionHandled<F>, ObservabilityError>
    where
        F: Fn(&Arguments) -> Result<HttpResponse, HandlerError>,
    {
        runtime::ensure_installed()?;
        Ok(ExceptionHandled {
            handler,
            name: name.into(),
            observability: self.clone(),
        })
    }
}

impl<F> ExceptionHandled<F>
where
    F: Fn(&Arguments) -> Result<HttpResponse, HandlerError>,
{
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the handler. Errors are captured, logged and returned as responses.
    pub fn call(&self, args: &Arguments) -> HttpResponse {
        let invocation = Invocation::extract(args, &self.name);
        let transaction = invocation.transaction_name();
        let environment = self.observability.environment();
        let hub = Arc::new(Hub::new_from_top(self.observability.hub()));

        Hub::run(hub.clone(), || {
            hub.configure_scope(|scope| scope.set_transaction(Some(transaction.as_str())));

            let result = hub.with_scope(
                |scope| enrich_scope(scope, &invocation, environment),
                || match panic::catch_unwind(AssertUnwindSafe(|| (self.handler)(args))) {
                    Ok(result) => {
                        if let Err(err) = &result {
                            hub.capture_error(err);
                        }
                        result
                    }
                    Err(payload) => {
                        let err = HandlerError::Unexpected(anyhow::anyhow!(
                            "{}",
                            panic_message(payload.as_ref())
                        ));
                        // The SDK's panic hook has already reported it on this hub.
                        if !reports_panics(&hub) {
                            hub.capture_error(&err);
                        }
                        Err(err)
                    }
                },
            );

            result.unwrap_or_else(|err| {
                let classified = classify(&err, self.observability.service_name());
                classified.log();
                classified.into_response()
            })
        })
    }
}

impl<F> Function for ExceptionHandled<F>
where
    F: Fn(&Arguments) -> Result<HttpResponse, HandlerError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, args: &Arguments) -> HttpResponse {
        ExceptionHandled::call(self, args)
    }
}

impl<F> std::fmt::Debug for ExceptionHandled<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExceptionHandled")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn enrich_scope(scope: &mut Scope, invocation: &Invocation<'_>, environment: &str) {
    for (key, value) in invocation.tags() {
        scope.set_tag(key, value);
    }
    // Best effort: a request that cannot be described must not fail the call.
    if let Ok(Some(block)) = invocation.request_context(environment) {
        scope.set_context("http", Context::Other(block));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "handler panicked"
    }
}

fn reports_panics(hub: &Hub) -> bool {
    hub.with_integration::<PanicIntegration, _, _>(|_| true)
}

/// Last path segment of `F`'s type name, without generic arguments.
fn short_type_name<F>() -> String {
    let full = type_name::<F>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_owned()
}

#[cfg(all(test, feature = "functions"))]
mod tests {
    use super::*;
    use common::{AppError, DataError, ValidationError};
    use http::{header, HeaderValue, Method};
    use sentry::test::TestTransport;

    use crate::invocation::{TAG_FUNCTION_NAME, TAG_HTTP_METHOD, TAG_HTTP_ROUTE, TAG_INVOCATION_ID};
    use crate::runtime::{FunctionContext, HttpRequest};

    fn observability() -> (Observability, Arc<TestTransport>) {
        let transport = TestTransport::new();
        let options = sentry::ClientOptions {
            dsn: Some("https://public@sentry.invalid/1".parse().unwrap()),
            transport: Some(Arc::new(transport.clone())),
            ..Default::default()
        };
        let hub = Arc::new(Hub::new(
            Some(Arc::new(sentry::Client::from(options))),
            Arc::new(Scope::default()),
        ));
        (Observability::with_hub(hub, "orders", "test"), transport)
    }

    fn request_args() -> Arguments {
        Arguments::new()
            .arg(HttpRequest::new(Method::GET, "https://api.example.com/api/items?id=7"))
            .kwarg("context", FunctionContext::new("get_item", "inv-42"))
    }

    fn list_items(_args: &Arguments) -> Result<HttpResponse, HandlerError> {
        Ok(HttpResponse::new("[]", 200).with_mimetype("application/json"))
    }

    fn failing(err: fn() -> HandlerError) -> impl Fn(&Arguments) -> Result<HttpResponse, HandlerError> {
        move |_: &Arguments| Err(err())
    }

    #[test]
    fn success_returns_response_untouched_without_report() {
        let (obs, transport) = observability();
        let wrapped = obs.handle_exceptions(list_items).unwrap();
        let resp = wrapped.call(&request_args());
        assert_eq!(resp, list_items(&Arguments::new()).unwrap());
        assert!(transport.fetch_and_clear_events().is_empty());
    }

    #[test]
    fn wrapped_fn_is_named_after_the_function() {
        let (obs, _) = observability();
        assert_eq!(obs.handle_exceptions(list_items).unwrap().name(), "list_items");
    }

    #[test]
    fn value_error_is_400_with_error_text() {
        let (obs, transport) = observability();
        let wrapped = obs
            .handle_exceptions_named("parse", failing(|| HandlerError::value("invalid literal for int(): 'x'")))
            .unwrap();
        let resp = wrapped.call(&request_args());
        assert_eq!(resp.status_code, 400);
        assert_eq!(resp.text(), "invalid literal for int(): 'x'");
        assert_eq!(resp.mimetype, "application/json");
        assert_eq!(transport.fetch_and_clear_events().len(), 1);
    }

    #[test]
    fn validation_error_is_400() {
        let (obs, _) = observability();
        let wrapped = obs
            .handle_exceptions_named(
                "create",
                failing(|| ValidationError::new("Item").with_field("name", "field required").into()),
            )
            .unwrap();
        let resp = wrapped.call(&request_args());
        assert_eq!(resp.status_code, 400);
        assert!(resp.text().starts_with("1 validation error for Item"));
    }

    #[test]
    fn app_error_uses_its_own_status_and_detail() {
        let (obs, transport) = observability();
        let wrapped = obs
            .handle_exceptions_named("get", failing(|| AppError::not_found("not found").into()))
            .unwrap();
        let resp = wrapped.call(&request_args());
        assert_eq!(resp.status_code, 404);
        assert_eq!(resp.text(), "not found");
        assert_eq!(resp.mimetype, runtime::DEFAULT_MIMETYPE);
        assert_eq!(transport.fetch_and_clear_events().len(), 1);
    }

    #[test]
    fn default_app_error_is_500() {
        let (obs, _) = observability();
        let wrapped = obs
            .handle_exceptions_named("get", failing(|| AppError::default().into()))
            .unwrap();
        let resp = wrapped.call(&Arguments::new());
        assert_eq!(resp.status_code, 500);
        assert_eq!(resp.text(), "Unexpected error");
    }

    #[test]
    fn data_error_is_400_naming_the_service() {
        let (obs, _) = observability();
        let wrapped = obs
            .handle_exceptions_named(
                "get",
                failing(|| DataError::new("invalid input syntax for type uuid").into()),
            )
            .unwrap();
        let resp = wrapped.call(&request_args());
        assert_eq!(resp.status_code, 400);
        assert_eq!(
            resp.text(),
            "[orders] Invalid input format: invalid input syntax for type uuid"
        );
    }

    #[test]
    fn unexpected_error_is_500_naming_the_service() {
        let (obs, transport) = observability();
        let wrapped = obs
            .handle_exceptions_named("get", failing(|| anyhow::anyhow!("connection reset").into()))
            .unwrap();
        let resp = wrapped.call(&request_args());
        assert_eq!(resp.status_code, 500);
        assert_eq!(resp.text(), "[orders] Unexpected error: connection reset");
        assert_eq!(transport.fetch_and_clear_events().len(), 1);
    }

    #[test]
    fn panic_is_captured_and_becomes_500() {
        let (obs, transport) = observability();
        let wrapped = obs
            .handle_exceptions_named("first_item", |args: &Arguments| {
                let items: Vec<HttpResponse> = Vec::new();
                Ok(items[args.len()].clone())
            })
            .unwrap();
        let resp = wrapped.call(&request_args());
        assert_eq!(resp.status_code, 500);
        assert!(
            resp.text().starts_with("[orders] Unexpected error: index out of bounds"),
            "got: {}",
            resp.text()
        );

        let events = transport.fetch_and_clear_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].tags[TAG_HTTP_METHOD], "GET");
        assert_eq!(events[0].transaction.as_deref(), Some("GET /api/items"));
    }

    #[test]
    fn panic_with_formatted_message_keeps_the_text() {
        let (obs, _) = observability();
        let wrapped = obs
            .handle_exceptions_named("get", |_: &Arguments| -> Result<HttpResponse, HandlerError> {
                panic!("storage {} offline", "eu-1")
            })
            .unwrap();
        let resp = wrapped.call(&Arguments::new());
        assert_eq!(resp.text(), "[orders] Unexpected error: storage eu-1 offline");
    }

    #[test]
    fn captured_event_carries_scope_metadata() {
        let (obs, transport) = observability();
        let wrapped = obs
            .handle_exceptions_named("get", failing(|| anyhow::anyhow!("boom").into()))
            .unwrap();
        wrapped.call(&request_args());

        let events = transport.fetch_and_clear_events();
        let event = &events[0];
        assert_eq!(event.transaction.as_deref(), Some("GET /api/items"));
        assert_eq!(event.tags[TAG_HTTP_METHOD], "GET");
        assert_eq!(event.tags[TAG_HTTP_ROUTE], "/api/items");
        assert_eq!(event.tags[TAG_FUNCTION_NAME], "get_item");
        assert_eq!(event.tags[TAG_INVOCATION_ID], "inv-42");
        match event.contexts.get("http") {
            Some(Context::Other(block)) => {
                assert_eq!(block["query_string"]["id"], "7");
                assert_eq!(block["env"]["ENV"], "test");
            }
            other => panic!("expected http context, got {other:?}"),
        }
    }

    #[test]
    fn transaction_falls_back_to_handler_name() {
        let (obs, transport) = observability();
        let wrapped = obs
            .handle_exceptions_named("nightly_job", failing(|| anyhow::anyhow!("boom").into()))
            .unwrap();
        wrapped.call(&Arguments::new().arg(String::from("payload")));

        let events = transport.fetch_and_clear_events();
        assert_eq!(events[0].transaction.as_deref(), Some("func nightly_job"));
        assert!(!events[0].tags.contains_key(TAG_HTTP_METHOD));
        assert!(!events[0].tags.contains_key(TAG_INVOCATION_ID));
        assert!(!events[0].contexts.contains_key("http"));
    }

    #[test]
    fn enrichment_failure_does_not_abort_the_call() {
        let (obs, transport) = observability();
        let wrapped = obs
            .handle_exceptions_named("get", failing(|| AppError::conflict("exists").into()))
            .unwrap();
        let req = HttpRequest::new(Method::GET, "https://h/api/items").with_header(
            header::HeaderName::from_static("x-bin"),
            HeaderValue::from_bytes(&[0xff]).unwrap(),
        );
        let resp = wrapped.call(&Arguments::new().arg(req));
        assert_eq!(resp.status_code, 409);

        let events = transport.fetch_and_clear_events();
        assert!(!events[0].contexts.contains_key("http"));
        assert_eq!(events[0].tags[TAG_HTTP_METHOD], "GET");
    }

    #[test]
    fn scope_does_not_leak_after_call() {
        let (obs, transport) = observability();
        let wrapped = obs
            .handle_exceptions_named("get", failing(|| anyhow::anyhow!("boom").into()))
            .unwrap();
        wrapped.call(&request_args());
        transport.fetch_and_clear_events();

        obs.hub().capture_message("after", sentry::Level::Info);
        let events = transport.fetch_and_clear_events();
        assert!(events[0].tags.is_empty());
        assert_eq!(events[0].transaction, None);
    }

    #[test]
    fn classify_table() {
        let c = classify(&HandlerError::value("bad"), "svc");
        assert_eq!((c.status_code, c.severity), (400, Severity::Warning));
        assert_eq!(c.log_message, "[svc] bad");

        let c = classify(&DataError::new("bad uuid").into(), "svc");
        assert_eq!(c.log_message, "[svc] Invalid input: bad uuid");

        let c = classify(&anyhow::anyhow!("boom").into(), "svc");
        assert_eq!((c.status_code, c.severity), (500, Severity::Error));
        assert_eq!(c.log_message, "[svc] boom");
    }

    #[test]
    fn short_type_name_strips_path_and_generics() {
        assert_eq!(short_type_name::<String>(), "String");
        assert_eq!(short_type_name::<Vec<u8>>(), "Vec");
    }
}

#[cfg(all(test, not(feature = "functions")))]
mod without_runtime_tests {
    use super::*;

    fn list_items(_args: &Arguments) -> Result<HttpResponse, HandlerError> {
        Ok(HttpResponse::new("[]", 200))
    }

    #[test]
    fn wrapping_fails_without_runtime_integration() {
        let obs = Observability::disabled("orders", "test");
        assert!(matches!(
            obs.handle_exceptions(list_items),
            Err(ObservabilityError::IntegrationUnavailable { .. })
        ));
        assert!(matches!(
            obs.handle_exceptions_named("list", list_items),
            Err(ObservabilityError::IntegrationUnavailable { .. })
        ));
    }

    #[test]
    fn classification_does_not_need_the_runtime() {
        let c = classify(&HandlerError::value("bad"), "svc");
        assert_eq!((c.status_code, c.severity), (400, Severity::Warning));
    }
}
