//! Handler arguments and the per-call metadata recovered from them.
//!
//! A wrapped handler receives [`Arguments`]: positional values followed by
//! named values. [`Invocation::extract`] scans them once, in that order, and
//! uses the [`Argument`] capability predicates to find the request and the
//! invocation context. When several arguments match, the last one wins. This
//! is a known limitation for handlers that take more than one request.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::runtime::{FunctionContext, HttpRequest};

pub const TAG_HTTP_METHOD: &str = "http.method";
pub const TAG_HTTP_ROUTE: &str = "http.route";
pub const TAG_HTTP_URL: &str = "http.url";
pub const TAG_FUNCTION_NAME: &str = "azure.function";
pub const TAG_INVOCATION_ID: &str = "azure.invocation_id";

/// Anything carrying a function name and an invocation id.
pub trait InvocationContext: Send + Sync {
    fn function_name(&self) -> Option<&str>;
    fn invocation_id(&self) -> Option<&str>;
}

/// A value that can be passed to a wrapped handler.
///
/// The `as_*` methods are capability checks: a type answers `Some` for the
/// roles it can play. Plain values answer `None` to both.
pub trait Argument: Any + Send + Sync {
    fn as_request(&self) -> Option<&HttpRequest> {
        None
    }

    fn as_context(&self) -> Option<&dyn InvocationContext> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

impl Argument for HttpRequest {
    fn as_request(&self) -> Option<&HttpRequest> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Argument for FunctionContext {
    fn as_context(&self) -> Option<&dyn InvocationContext> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

macro_rules! plain_argument {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Argument for $ty {
                fn as_any(&self) -> &dyn Any {
                    self
                }
            }
        )*
    };
}

plain_argument!(String, Value, bytes::Bytes, bool, i64, u64, f64);

/// Arguments of one handler call: positional values, then named values.
#[derive(Default)]
pub struct Arguments {
    positional: Vec<Box<dyn Argument>>,
    keyword: Vec<(String, Box<dyn Argument>)>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg<A: Argument>(mut self, value: A) -> Self {
        self.positional.push(Box::new(value));
        self
    }

    /// Set a named argument, replacing an earlier one with the same name.
    pub fn kwarg<A: Argument>(mut self, name: impl Into<String>, value: A) -> Self {
        let name = name.into();
        let value: Box<dyn Argument> = Box::new(value);
        match self.keyword.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.keyword.push((name, value)),
        }
        self
    }

    /// Positional argument `index`, if it exists and has type `T`.
    pub fn positional<T: Argument>(&self, index: usize) -> Option<&T> {
        self.positional.get(index)?.as_any().downcast_ref()
    }

    /// Named argument `name`, if it exists and has type `T`.
    pub fn keyword<T: Argument>(&self, name: &str) -> Option<&T> {
        self.keyword
            .iter()
            .find(|(n, _)| n == name)?
            .1
            .as_any()
            .downcast_ref()
    }

    /// First argument of type `T`, positional before named.
    pub fn find<T: Argument>(&self) -> Option<&T> {
        self.iter().find_map(|arg| arg.as_any().downcast_ref())
    }

    /// All values, positional first, each group in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Argument> {
        self.positional
            .iter()
            .map(|a| a.as_ref())
            .chain(self.keyword.iter().map(|(_, a)| a.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.keyword.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arguments")
            .field("positional", &self.positional.len())
            .field(
                "keyword",
                &self.keyword.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Failure while building the `http` scope context.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("header `{0}` is not valid UTF-8")]
    Header(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Metadata recovered from one call's arguments.
#[derive(Clone, Copy)]
pub struct Invocation<'a> {
    request: Option<&'a HttpRequest>,
    context: Option<&'a dyn InvocationContext>,
    handler_name: &'a str,
}

impl<'a> Invocation<'a> {
    /// Scan `args` for the request and the invocation context.
    ///
    /// `handler_name` is used when no context supplies a function name.
    pub fn extract(args: &'a Arguments, handler_name: &'a str) -> Self {
        let mut request = None;
        let mut context = None;
        for arg in args.iter() {
            if let Some(r) = arg.as_request() {
                request = Some(r);
            }
            if let Some(c) = arg.as_context() {
                context = Some(c);
            }
        }
        Self {
            request,
            context,
            handler_name,
        }
    }

    pub fn request(&self) -> Option<&'a HttpRequest> {
        self.request
    }

    pub fn method(&self) -> Option<&'a str> {
        self.request.map(|r| r.method.as_str())
    }

    pub fn url(&self) -> Option<&'a str> {
        self.request.map(|r| r.url.as_str()).filter(|u| !u.is_empty())
    }

    /// Path component of the URL, without query string or fragment.
    pub fn path(&self) -> Option<String> {
        url_path(self.url()?)
    }

    /// The context's function name, or the wrapped handler's own name.
    pub fn function_name(&self) -> &'a str {
        self.context
            .and_then(|c| c.function_name())
            .filter(|n| !n.is_empty())
            .unwrap_or(self.handler_name)
    }

    pub fn invocation_id(&self) -> Option<&'a str> {
        self.context
            .and_then(|c| c.invocation_id())
            .filter(|id| !id.is_empty())
    }

    /// `"<METHOD> <PATH>"` when both are known, otherwise `"func <name>"`.
    pub fn transaction_name(&self) -> String {
        match (self.method(), self.path()) {
            (Some(method), Some(path)) => format!("{method} {path}"),
            _ => format!("func {}", self.function_name()),
        }
    }

    /// Scope tags for every recovered, non-empty value.
    pub fn tags(&self) -> Vec<(&'static str, String)> {
        let function_name = Some(self.function_name()).filter(|n| !n.is_empty());
        [
            (TAG_HTTP_METHOD, self.method().map(str::to_owned)),
            (TAG_HTTP_ROUTE, self.path()),
            (TAG_HTTP_URL, self.url().map(str::to_owned)),
            (TAG_FUNCTION_NAME, function_name.map(str::to_owned)),
            (TAG_INVOCATION_ID, self.invocation_id().map(str::to_owned)),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
    }

    /// The `http` context block, or `None` when no request was recovered.
    ///
    /// # Errors
    ///
    /// Fails if a header value is not UTF-8 or the parameters cannot be
    /// represented as JSON.
    pub fn request_context(
        &self,
        environment: &str,
    ) -> Result<Option<BTreeMap<String, Value>>, EnrichmentError> {
        let Some(req) = self.request else {
            return Ok(None);
        };

        let mut headers = serde_json::Map::new();
        for name in req.headers.keys() {
            let values = req
                .headers
                .get_all(name)
                .iter()
                .map(|v| v.to_str())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| EnrichmentError::Header(name.to_string()))?;
            headers.insert(name.to_string(), Value::from(values.join(", ")));
        }

        let mut block = BTreeMap::new();
        block.insert("method".to_owned(), Value::from(req.method.as_str()));
        block.insert("url".to_owned(), Value::from(req.url.as_str()));
        block.insert("query_string".to_owned(), serde_json::to_value(&req.params)?);
        block.insert("headers".to_owned(), Value::Object(headers));
        block.insert("env".to_owned(), serde_json::json!({ "ENV": environment }));
        Ok(Some(block))
    }
}

impl fmt::Debug for Invocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("method", &self.method())
            .field("url", &self.url())
            .field("function_name", &self.function_name())
            .field("invocation_id", &self.invocation_id())
            .finish()
    }
}

fn url_path(url: &str) -> Option<String> {
    let path = match url.parse::<http::Uri>() {
        Ok(uri) => {
            // `Uri::path` reports "/" for an authority with no path at all.
            let after_authority = match uri.authority() {
                Some(authority) => url
                    .split_once("://")
                    .and_then(|(_, rest)| rest.strip_prefix(authority.as_str()))
                    .unwrap_or_default(),
                None => url,
            };
            if !after_authority.starts_with('/') {
                return None;
            }
            uri.path().to_owned()
        }
        Err(_) if url.starts_with('/') => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_owned(),
        Err(_) => return None,
    };
    Some(path).filter(|p| !p.is_empty())
}
