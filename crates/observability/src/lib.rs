//! Helpers for initialising Sentry consistently across services and for
//! wrapping HTTP function handlers so that every error they return is
//! captured, classified, logged and converted into a response.
//!
//! # Typical use
//!
//! ```no_run
//! use observability::{Arguments, HttpResponse, Observability, Settings};
//! use common::HandlerError;
//!
//! fn hello(_args: &Arguments) -> Result<HttpResponse, HandlerError> {
//!     Ok(HttpResponse::new("hello", 200))
//! }
//!
//! # fn main() -> Result<(), observability::ObservabilityError> {
//! let settings = Settings::from_env()?;
//! let observability = Observability::init(&settings)?;
//! let hello = observability.handle_exceptions(hello)?;
//! let response = hello.call(&Arguments::new());
//! assert_eq!(response.status_code, 200);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod invocation;
pub mod runtime;
pub mod settings;
pub mod telemetry;

pub use client::{is_initialized, Observability};
pub use config::{build_config, ConfigOptions, SdkConfig, DEFAULT_TRACE_SAMPLE_RATE};
pub use error::ObservabilityError;
pub use handler::{classify, Classified, ExceptionHandled, Function, Severity};
pub use invocation::{Argument, Arguments, Invocation, InvocationContext};
pub use runtime::{FunctionContext, HttpRequest, HttpResponse};
pub use settings::Settings;
