//! Built-in functions served by the host and the registry that holds them.
//!
//! Every function is registered through
//! [`Observability::handle_exceptions`], so errors they return reach callers
//! as classified responses.

use std::collections::BTreeMap;
use std::sync::Arc;

use common::{AppError, DataError, HandlerError, ValidationError};
use observability::{
    Arguments, Function, HttpRequest, HttpResponse, Observability, ObservabilityError,
};
use serde::{Deserialize, Serialize};

/// Wrapped functions keyed by name.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, Arc<dyn Function>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in functions wrapped by `observability`.
    ///
    /// # Errors
    ///
    /// Fails if the function runtime integration is unavailable.
    pub fn builtin(observability: &Observability) -> Result<Self, ObservabilityError> {
        let mut registry = Self::new();
        registry.register(observability.handle_exceptions(echo)?);
        registry.register(observability.handle_exceptions(get_item)?);
        registry.register(observability.handle_exceptions(create_item)?);
        Ok(registry)
    }

    /// Add `function`, replacing any function with the same name.
    pub fn register(&mut self, function: impl Function + 'static) {
        self.functions
            .insert(function.name().to_owned(), Arc::new(function));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.functions.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Built-in functions
// ---------------------------------------------------------------------------

/// A catalogue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    pub name: String,
    pub price: f64,
}

/// Body of `POST /api/create_item`.
#[derive(Debug, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub price: f64,
}

const CATALOGUE: &[(u64, &str, f64)] = &[(1, "widget", 9.99), (2, "gadget", 24.5)];

const SELECT_ITEM: &str = "SELECT id, name, price FROM items WHERE id = $1";

fn catalogue() -> impl Iterator<Item = Item> {
    CATALOGUE.iter().map(|&(id, name, price)| Item {
        id,
        name: name.to_owned(),
        price,
    })
}

fn request(args: &Arguments) -> Result<&HttpRequest, HandlerError> {
    args.find::<HttpRequest>()
        .ok_or_else(|| HandlerError::value("an HTTP request argument is required"))
}

/// Return the request body unchanged.
pub fn echo(args: &Arguments) -> Result<HttpResponse, HandlerError> {
    let req = request(args)?;
    if req.body.is_empty() {
        return Err(HandlerError::value("request body is empty"));
    }
    let mimetype = req
        .headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(observability::runtime::DEFAULT_MIMETYPE);
    Ok(HttpResponse::new(req.body.clone(), 200).with_mimetype(mimetype))
}

/// Look up an item by the `id` query parameter.
pub fn get_item(args: &Arguments) -> Result<HttpResponse, HandlerError> {
    let req = request(args)?;
    let raw = req
        .params
        .get("id")
        .ok_or_else(|| ValidationError::new("GetItem").with_field("id", "field required"))?;
    let id: u64 = raw.parse().map_err(|_| {
        DataError::new(format!("invalid input syntax for type bigint: \"{raw}\""))
            .with_statement(SELECT_ITEM)
    })?;
    let item = catalogue()
        .find(|item| item.id == id)
        .ok_or_else(|| AppError::not_found("not found"))?;
    HttpResponse::json(&item)
}

/// Validate a new item and return it with its assigned id.
pub fn create_item(args: &Arguments) -> Result<HttpResponse, HandlerError> {
    let new: NewItem = request(args)?.get_json()?;

    let mut invalid = ValidationError::new("NewItem");
    if new.name.trim().is_empty() {
        invalid = invalid.with_field("name", "must not be blank");
    }
    if !new.price.is_finite() || new.price < 0.0 {
        invalid = invalid.with_field("price", "must be a non-negative number");
    }
    if !invalid.is_empty() {
        return Err(invalid.into());
    }

    if catalogue().any(|item| item.name == new.name) {
        return Err(AppError::conflict(format!("item {} already exists", new.name)).into());
    }

    let item = Item {
        id: CATALOGUE.len() as u64 + 1,
        name: new.name,
        price: new.price,
    };
    Ok(HttpResponse::json(&item)?.with_status(201))
}
