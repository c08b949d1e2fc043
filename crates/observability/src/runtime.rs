//! Request, response and invocation-context types of the HTTP function
//! runtime that wrapped handlers are written against.
//!
//! With the `functions` feature (enabled by default) requests can be built
//! from axum requests and responses convert into axum responses.

use std::collections::BTreeMap;

use bytes::Bytes;
use common::HandlerError;
use http::{header::HeaderName, HeaderMap, HeaderValue, Method};
use serde::de::DeserializeOwned;

use crate::error::ObservabilityError;
use crate::invocation::InvocationContext;

/// Content type of responses that do not set one.
pub const DEFAULT_MIMETYPE: &str = "text/plain";

/// Fail unless the function runtime integration was compiled in.
///
/// # Errors
///
/// Returns [`ObservabilityError::IntegrationUnavailable`] when the crate was
/// built without the `functions` feature.
pub fn ensure_installed() -> Result<(), ObservabilityError> {
    if cfg!(feature = "functions") {
        Ok(())
    } else {
        Err(ObservabilityError::IntegrationUnavailable {
            integration: "functions",
            hint: "enable the `functions` feature of the `observability` crate",
        })
    }
}

/// Incoming HTTP request handed to a function.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: Method,
    /// Full request URL including the query string.
    pub url: String,
    /// Decoded query parameters. Later duplicates win.
    pub params: BTreeMap<String, String>,
    /// Parameters captured from the route template.
    pub route_params: BTreeMap<String, String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpRequest {
    /// Build a request for `url`, decoding its query string into
    /// [`HttpRequest::params`].
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        let url = url.into();
        let params = url
            .split_once('?')
            .map(|(_, query)| query.split('#').next().unwrap_or_default())
            .and_then(|query| serde_urlencoded::from_str::<Vec<(String, String)>>(query).ok())
            .map(|pairs| pairs.into_iter().collect())
            .unwrap_or_default();
        Self {
            method,
            url,
            params,
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_route_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.route_params.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn get_body(&self) -> &[u8] {
        &self.body
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Value`] if the body is not valid JSON for `T`.
    pub fn get_json<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Response returned by a function.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub body: Bytes,
    pub status_code: u16,
    pub mimetype: String,
    pub headers: HeaderMap,
}

impl HttpResponse {
    pub fn new(body: impl Into<Bytes>, status_code: u16) -> Self {
        Self {
            body: body.into(),
            status_code,
            mimetype: DEFAULT_MIMETYPE.into(),
            headers: HeaderMap::new(),
        }
    }

    /// `200` response with `value` serialised as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Value`] if `value` cannot be serialised.
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self, HandlerError> {
        Ok(Self::new(serde_json::to_vec(value)?, 200).with_mimetype("application/json"))
    }

    pub fn with_mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.mimetype = mimetype.into();
        self
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }

    /// Body as UTF-8 text, lossily decoded.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Invocation metadata supplied by the runtime alongside the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionContext {
    pub function_name: String,
    pub invocation_id: String,
    pub function_directory: Option<String>,
}

impl FunctionContext {
    pub fn new(function_name: impl Into<String>, invocation_id: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            invocation_id: invocation_id.into(),
            function_directory: None,
        }
    }
}

impl InvocationContext for FunctionContext {
    fn function_name(&self) -> Option<&str> {
        Some(self.function_name.as_str())
    }

    fn invocation_id(&self) -> Option<&str> {
        Some(self.invocation_id.as_str())
    }
}

#[cfg(feature = "functions")]
mod axum_adapter {
    use axum::response::{IntoResponse, Response};
    use bytes::Bytes;
    use http::{header::CONTENT_TYPE, request::Parts, HeaderValue, StatusCode};

    use super::{HttpRequest, HttpResponse};

    impl HttpRequest {
        /// Build a request from the parts of an incoming axum request.
        ///
        /// Origin-form URIs are resolved against the `Host` header so that
        /// [`HttpRequest::url`] is always absolute when a host is known.
        pub fn from_parts(parts: &Parts, body: Bytes) -> Self {
            let host = parts
                .headers
                .get(http::header::HOST)
                .and_then(|h| h.to_str().ok());
            let url = match (parts.uri.scheme_str(), host) {
                (None, Some(host)) => format!("http://{host}{}", parts.uri),
                _ => parts.uri.to_string(),
            };
            let mut req = HttpRequest::new(parts.method.clone(), url);
            req.headers = parts.headers.clone();
            req.body = body;
            req
        }
    }

    impl IntoResponse for HttpResponse {
        fn into_response(self) -> Response {
            let status =
                StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let mut response = (status, self.body).into_response();
            let headers = response.headers_mut();
            headers.extend(self.headers);
            if let Ok(mimetype) = HeaderValue::from_str(&self.mimetype) {
                headers.insert(CONTENT_TYPE, mimetype);
            }
            response
        }
    }
}
