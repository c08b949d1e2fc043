//! Limits applied by the router's middleware layers.

use std::time::Duration;

/// Default per-request timeout applied to all routes.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest request body buffered for a function invocation.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;
