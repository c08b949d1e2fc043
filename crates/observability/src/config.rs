//! Canonical SDK configuration.
//!
//! [`build_config`] produces the option mapping every service passes to the
//! Sentry client. It never initialises the SDK; see
//! [`crate::Observability::init`] for that.

use std::borrow::Cow;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::ObservabilityError;

/// Transaction sample rate used when the caller does not pick one.
pub const DEFAULT_TRACE_SAMPLE_RATE: f64 = 1.0;

/// Optional inputs to [`build_config`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigOptions {
    pub traces_sample_rate: f64,
    pub environment: Option<String>,
    pub service_name: Option<String>,
    pub debug: Option<bool>,
    /// Passthrough options, merged last.
    pub extra: Map<String, Value>,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            traces_sample_rate: DEFAULT_TRACE_SAMPLE_RATE,
            environment: None,
            service_name: None,
            debug: None,
            extra: Map::new(),
        }
    }
}

impl ConfigOptions {
    pub fn traces_sample_rate(mut self, rate: f64) -> Self {
        self.traces_sample_rate = rate;
        self
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    /// Add a passthrough option. Overrides a built-in key of the same name.
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Immutable option mapping ready to hand to the SDK.
///
/// Always contains a trimmed, non-blank `dsn` and a `traces_sample_rate`
/// unless a passthrough option replaced them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SdkConfig(Map<String, Value>);

/// Build the canonical SDK configuration.
///
/// Optional fields are only present when supplied: `environment` and
/// `server_name` when non-empty, `debug` whenever it was set (including
/// `false`). Entries in [`ConfigOptions::extra`] are applied last.
///
/// # Errors
///
/// Returns [`ObservabilityError::InvalidArgument`] if `dsn` is blank after
/// trimming, or if the traces sample rate is NaN or infinite.
pub fn build_config(dsn: &str, options: ConfigOptions) -> Result<SdkConfig, ObservabilityError> {
    let dsn = dsn.trim();
    if dsn.is_empty() {
        return Err(ObservabilityError::InvalidArgument(
            "The Sentry DSN cannot be empty".into(),
        ));
    }

    if !options.traces_sample_rate.is_finite() {
        return Err(ObservabilityError::InvalidArgument(
            "The traces sample rate must be a finite number".into(),
        ));
    }

    let mut config = Map::new();
    config.insert("dsn".into(), Value::from(dsn));
    config.insert(
        "traces_sample_rate".into(),
        Value::from(options.traces_sample_rate),
    );

    if let Some(environment) = options.environment.filter(|e| !e.is_empty()) {
        config.insert("environment".into(), Value::from(environment));
    }
    if let Some(service_name) = options.service_name.filter(|s| !s.is_empty()) {
        config.insert("server_name".into(), Value::from(service_name));
    }
    if let Some(debug) = options.debug {
        config.insert("debug".into(), Value::Bool(debug));
    }

    config.extend(options.extra);
    Ok(SdkConfig(config))
}

impl SdkConfig {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// The configured DSN, if it is still a string.
    pub fn dsn(&self) -> Option<&str> {
        self.0.get("dsn").and_then(Value::as_str)
    }

    pub fn traces_sample_rate(&self) -> Option<f64> {
        self.0.get("traces_sample_rate").and_then(Value::as_f64)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    /// Translate the mapping into [`sentry::ClientOptions`].
    ///
    /// Unsupported keys are logged and skipped.
    ///
    /// # Errors
    ///
    /// Fails if a known key has the wrong type, a rate lies outside `[0, 1]`,
    /// or the DSN does not parse.
    pub fn to_client_options(&self) -> Result<sentry::ClientOptions, ObservabilityError> {
        let mut options = sentry::ClientOptions::default();
        for (key, value) in &self.0 {
            match key.as_str() {
                "dsn" => options.dsn = Some(expect_str(key, value)?.parse()?),
                "traces_sample_rate" => options.traces_sample_rate = expect_rate(key, value)?,
                "sample_rate" => options.sample_rate = expect_rate(key, value)?,
                "environment" => options.environment = Some(owned_str(key, value)?),
                "server_name" => options.server_name = Some(owned_str(key, value)?),
                "release" => options.release = Some(owned_str(key, value)?),
                "debug" => options.debug = expect_bool(key, value)?,
                "attach_stacktrace" => options.attach_stacktrace = expect_bool(key, value)?,
                "send_default_pii" => options.send_default_pii = expect_bool(key, value)?,
                "max_breadcrumbs" => {
                    options.max_breadcrumbs = value
                        .as_u64()
                        .and_then(|n| usize::try_from(n).ok())
                        .ok_or_else(|| {
                            ObservabilityError::invalid_option(key, "expected a non-negative integer")
                        })?;
                }
                other => warn!(option = other, "ignoring unsupported Sentry option"),
            }
        }
        Ok(options)
    }
}

fn expect_str<'a>(key: &str, value: &'a Value) -> Result<&'a str, ObservabilityError> {
    value
        .as_str()
        .ok_or_else(|| ObservabilityError::invalid_option(key, "expected a string"))
}

fn owned_str(key: &str, value: &Value) -> Result<Cow<'static, str>, ObservabilityError> {
    expect_str(key, value).map(|s| Cow::Owned(s.to_owned()))
}

fn expect_bool(key: &str, value: &Value) -> Result<bool, ObservabilityError> {
    value
        .as_bool()
        .ok_or_else(|| ObservabilityError::invalid_option(key, "expected a boolean"))
}

fn expect_rate(key: &str, value: &Value) -> Result<f32, ObservabilityError> {
    value
        .as_f64()
        .filter(|rate| (0.0..=1.0).contains(rate))
        .map(|rate| rate as f32)
        .ok_or_else(|| ObservabilityError::invalid_option(key, "expected a number between 0 and 1"))
}
