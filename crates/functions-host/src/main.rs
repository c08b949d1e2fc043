//! `functions-host`: binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] and error-tracking [`Settings`] from
//!    environment variables.
//! 2. Initialise structured logging.
//! 3. Initialise the error-tracking SDK (at most once per process).
//! 4. Wrap the built-in functions and register them.
//! 5. Build the Axum router and serve until Ctrl-C, then flush pending reports.

mod config;
mod functions;
mod server;

use std::time::Duration;

use anyhow::Result;
use observability::{Observability, Settings};
use tracing::info;

use config::Config;
use functions::FunctionRegistry;
use server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Logging is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e}");
        e
    })?;
    let settings = Settings::from_env().map_err(|e| {
        eprintln!("ERROR: error-tracking settings invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    observability::telemetry::init_tracing(&cfg.log_level)?;

    // -----------------------------------------------------------------------
    // 3. Error tracking
    // -----------------------------------------------------------------------
    let observability = Observability::init(&settings)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = cfg.port,
        service = %settings.service_name,
        environment = %settings.environment,
        "functions-host starting"
    );

    // -----------------------------------------------------------------------
    // 4. Functions
    // -----------------------------------------------------------------------
    let functions = FunctionRegistry::builtin(&observability)?;
    info!(functions = ?functions.names(), "functions registered");

    // -----------------------------------------------------------------------
    // 5. HTTP server
    // -----------------------------------------------------------------------
    let state = AppState::new(functions, observability.clone());
    let router = server::router::build(state);

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if !observability.flush(Duration::from_secs(cfg.shutdown_flush_secs)) {
        tracing::warn!("timed out flushing pending error reports");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
