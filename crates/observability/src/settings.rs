//! Process-wide settings read from environment variables at startup.

use serde::Deserialize;

use crate::config::{build_config, ConfigOptions, SdkConfig};
use crate::error::ObservabilityError;

/// Observability settings shared by every wrapped handler in the process.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Name reported as `server_name` and used to prefix log lines.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// DSN of the error-tracking project. Reporting is disabled when unset.
    #[serde(default)]
    pub sentry_dsn: Option<String>,

    /// Raw `SENTRY_DEBUG` value; see [`Settings::debug`].
    #[serde(default = "default_sentry_debug")]
    pub sentry_debug: String,

    /// Deployment environment (e.g. `"production"`).
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Transaction sample rate used by [`crate::Observability::init`].
    #[serde(default = "default_traces_sample_rate")]
    pub sentry_traces_sample_rate: f64,
}

fn default_service_name() -> String {
    "unknown".into()
}
fn default_sentry_debug() -> String {
    "False".into()
}
fn default_environment() -> String {
    "local".into()
}
fn default_traces_sample_rate() -> f64 {
    0.2
}

/// Interpret an environment flag: `"1"`, `"true"` and `"yes"` (any case) are
/// true, everything else is false.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            sentry_dsn: None,
            sentry_debug: default_sentry_debug(),
            environment: default_environment(),
            sentry_traces_sample_rate: default_traces_sample_rate(),
        }
    }
}

impl Settings {
    /// Load settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ObservabilityError::Settings`] if a variable cannot be
    /// deserialised (e.g. a non-numeric sample rate).
    pub fn from_env() -> Result<Self, ObservabilityError> {
        Self::from_source(config::Environment::default())
    }

    /// Load settings from an explicit environment source.
    pub fn from_source(source: config::Environment) -> Result<Self, ObservabilityError> {
        let settings: Settings = config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Whether SDK debug mode was requested.
    pub fn debug(&self) -> bool {
        parse_flag(&self.sentry_debug)
    }

    /// The configured DSN, if set to a non-blank value.
    pub fn dsn(&self) -> Option<&str> {
        self.sentry_dsn
            .as_deref()
            .map(str::trim)
            .filter(|dsn| !dsn.is_empty())
    }

    /// Startup SDK configuration, or `None` when no DSN is configured.
    pub fn sdk_config(&self) -> Result<Option<SdkConfig>, ObservabilityError> {
        let Some(dsn) = self.dsn() else {
            return Ok(None);
        };
        let options = ConfigOptions::default()
            .traces_sample_rate(self.sentry_traces_sample_rate)
            .debug(self.debug())
            .environment(self.environment.clone())
            .service_name(self.service_name.clone());
        build_config(dsn, options).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_vars(vars: &[(&str, &str)]) -> Settings {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_source(config::Environment::default().source(Some(map))).unwrap()
    }

    #[test]
    fn defaults_are_correct() {
        let s = from_vars(&[]);
        assert_eq!(s.service_name, "unknown");
        assert_eq!(s.sentry_dsn, None);
        assert!(!s.debug());
        assert_eq!(s.environment, "local");
        assert_eq!(s.sentry_traces_sample_rate, 0.2);
    }

    #[test]
    fn reads_environment_variables() {
        let s = from_vars(&[
            ("SERVICE_NAME", "orders"),
            ("SENTRY_DSN", "https://public@sentry.example.com/1"),
            ("SENTRY_DEBUG", "YES"),
            ("ENVIRONMENT", "production"),
            ("SENTRY_TRACES_SAMPLE_RATE", "0.5"),
        ]);
        assert_eq!(s.service_name, "orders");
        assert_eq!(s.dsn(), Some("https://public@sentry.example.com/1"));
        assert!(s.debug());
        assert_eq!(s.environment, "production");
        assert_eq!(s.sentry_traces_sample_rate, 0.5);
    }

    #[test]
    fn flag_truth_table() {
        for v in ["1", "true", "TRUE", "True", "yes", "Yes"] {
            assert!(parse_flag(v), "{v} should be true");
        }
        for v in ["0", "false", "False", "no", "", "on", "2"] {
            assert!(!parse_flag(v), "{v} should be false");
        }
    }

    #[test]
    fn sdk_config_is_none_without_dsn() {
        assert!(Settings::default().sdk_config().unwrap().is_none());
        let blank = Settings {
            sentry_dsn: Some("   ".into()),
            ..Settings::default()
        };
        assert!(blank.sdk_config().unwrap().is_none());
    }

    #[test]
    fn sdk_config_carries_startup_options() {
        let s = Settings {
            sentry_dsn: Some("https://public@sentry.example.com/1".into()),
            service_name: "orders".into(),
            ..Settings::default()
        };
        let cfg = s.sdk_config().unwrap().unwrap();
        assert_eq!(cfg.traces_sample_rate(), Some(0.2));
        assert_eq!(cfg.get("server_name"), Some(&serde_json::json!("orders")));
        assert_eq!(cfg.get("environment"), Some(&serde_json::json!("local")));
        assert_eq!(cfg.get("debug"), Some(&serde_json::json!(false)));
    }
}
