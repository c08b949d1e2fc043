//! [`Observability`]: explicitly initialised handle to the error-tracking SDK.

use std::sync::Arc;
use std::time::Duration;

use sentry::{ClientInitGuard, Hub, Scope};
use tracing::{debug, info};

use crate::error::ObservabilityError;
use crate::settings::Settings;

/// Returns `true` if an enabled client is bound to the current hub.
///
/// [`Observability::init`] uses this to initialise the SDK at most once.
pub fn is_initialized() -> bool {
    Hub::current().client().is_some_and(|c| c.is_enabled())
}

/// Handle passed to the exception-handling wrapper.
///
/// Cheap to clone. Holds the SDK guard when this handle performed the
/// initialisation, so the client is flushed when the last clone is dropped.
#[derive(Clone)]
pub struct Observability {
    inner: Arc<Inner>,
}

struct Inner {
    hub: Arc<Hub>,
    service_name: String,
    environment: String,
    _guard: Option<ClientInitGuard>,
}

impl Observability {
    /// Initialise the SDK from `settings` unless a client is already active.
    ///
    /// Without a DSN the handle is still usable: captures become no-ops.
    ///
    /// # Errors
    ///
    /// Fails if the startup configuration cannot be built or converted.
    pub fn init(settings: &Settings) -> Result<Self, ObservabilityError> {
        let guard = if is_initialized() {
            debug!("error-tracking client already active, skipping initialisation");
            None
        } else if let Some(config) = settings.sdk_config()? {
            let guard = sentry::init(config.to_client_options()?);
            info!(
                service = %settings.service_name,
                environment = %settings.environment,
                "error reporting enabled"
            );
            Some(guard)
        } else {
            info!("SENTRY_DSN not set, error reporting disabled");
            None
        };

        Ok(Self::build(
            Hub::current(),
            settings.service_name.clone(),
            settings.environment.clone(),
            guard,
        ))
    }

    /// Bind a handle to an existing hub without touching global SDK state.
    pub fn with_hub(
        hub: Arc<Hub>,
        service_name: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self::build(hub, service_name.into(), environment.into(), None)
    }

    /// A handle with no client: captures are dropped.
    pub fn disabled(service_name: impl Into<String>, environment: impl Into<String>) -> Self {
        let hub = Arc::new(Hub::new(None, Arc::new(Scope::default())));
        Self::with_hub(hub, service_name, environment)
    }

    fn build(
        hub: Arc<Hub>,
        service_name: String,
        environment: String,
        guard: Option<ClientInitGuard>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                hub,
                service_name,
                environment,
                _guard: guard,
            }),
        }
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.inner.hub
    }

    pub fn service_name(&self) -> &str {
        &self.inner.service_name
    }

    pub fn environment(&self) -> &str {
        &self.inner.environment
    }

    /// Whether events captured through this handle are actually sent.
    pub fn is_enabled(&self) -> bool {
        self.inner.hub.client().is_some_and(|c| c.is_enabled())
    }

    /// Wait up to `timeout` for queued events to be sent.
    pub fn flush(&self, timeout: Duration) -> bool {
        self.inner
            .hub
            .client()
            .map_or(true, |c| c.flush(Some(timeout)))
    }
}

impl std::fmt::Debug for Observability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observability")
            .field("service_name", &self.inner.service_name)
            .field("environment", &self.inner.environment)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_without_client_is_disabled() {
        let obs = Observability::disabled("orders", "test");
        assert!(!obs.is_enabled());
        assert_eq!(obs.service_name(), "orders");
        assert_eq!(obs.environment(), "test");
        assert!(obs.flush(Duration::from_millis(10)));
    }

    #[test]
    fn init_without_dsn_leaves_sdk_uninitialised() {
        let empty = Arc::new(Hub::new(None, Arc::new(Default::default())));
        Hub::run(empty, || {
            let obs = Observability::init(&Settings::default()).unwrap();
            assert!(!obs.is_enabled());
            assert!(!is_initialized());
        });
    }

    #[test]
    fn init_skips_when_client_already_active() {
        sentry::test::with_captured_events(|| {
            assert!(is_initialized());
            let settings = Settings {
                sentry_dsn: Some("https://public@sentry.example.com/1".into()),
                ..Settings::default()
            };
            let obs = Observability::init(&settings).unwrap();
            assert!(obs.is_enabled());
            assert!(obs.inner._guard.is_none());
        });
    }
}
