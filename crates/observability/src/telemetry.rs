//! Tracing subscriber setup for services using this crate.
//!
//! Structured JSON logs go to stdout. A `sentry-tracing` layer records
//! `info!` and above as breadcrumbs on the current hub. It never creates
//! events: handler errors are already captured by [`crate::handler`].

use anyhow::{Context, Result};
use sentry_tracing::EventFilter;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `log_level` when set. SDK-internal logs
/// are capped at `warn`.
///
/// # Errors
///
/// Returns an error if the subscriber has already been set.
pub fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level))
        .add_directive("sentry=warn".parse().context("invalid sentry log directive")?);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .with(sentry_tracing::layer().event_filter(breadcrumb_filter))
        .try_init()
        .context("failed to initialise tracing subscriber")
}

fn breadcrumb_filter(metadata: &tracing::Metadata<'_>) -> EventFilter {
    match *metadata.level() {
        Level::ERROR | Level::WARN | Level::INFO => EventFilter::Breadcrumb,
        _ => EventFilter::Ignore,
    }
}
