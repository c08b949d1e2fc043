//! Configuration loading and validation for the function host.
//!
//! Error-tracking settings are loaded separately by
//! [`observability::Settings::from_env`].

use anyhow::{Context, Result};
use serde::Deserialize;

/// Validated host configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port the HTTP server listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds to wait for queued error reports on shutdown.
    #[serde(default = "default_shutdown_flush_secs")]
    pub shutdown_flush_secs: u64,
}

fn default_port() -> u16 {
    7071
}
fn default_log_level() -> String {
    "info".into()
}
fn default_shutdown_flush_secs() -> u64 {
    2
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build function host configuration")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise function host configuration")?;

        c.validate()?;
        Ok(c)
    }

    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("PORT must be a non-zero TCP port");
        }
        if self.log_level.trim().is_empty() {
            anyhow::bail!("LOG_LEVEL must not be empty");
        }
        Ok(())
    }
}
