//! Logging bootstrap and span helpers.
//!
//! Every keel component logs through `tracing`. Binaries call
//! [`init_logging`] once at startup; libraries only emit events.

use std::str::FromStr;
use std::sync::Once;

use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::Error;

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(Error::InvalidInput(format!(
                "unknown log format '{other}' (expected 'json' or 'pretty')"
            ))),
        }
    }
}

/// Initializes the logging subsystem.
///
/// Safe to call more than once; later calls are no-ops. `RUST_LOG` controls
/// levels and defaults to `info`.
///
/// ```rust
/// use keel_core::observability::{init_logging, LogFormat};
///
/// init_logging(LogFormat::Pretty);
/// ```
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Span for an async-operation call.
///
/// ```rust
/// use keel_core::observability::operation_span;
///
/// let span = operation_span(
///     "queue_async_operation",
///     "/planes/radius/local/providers/Applications.Core/environments/env0",
///     "00000000-0000-0000-0000-000000000001",
/// );
/// let _guard = span.enter();
/// ```
#[must_use]
pub fn operation_span(operation: &str, resource_id: &str, operation_id: &str) -> Span {
    tracing::info_span!(
        "async_operation",
        op = operation,
        resource_id = resource_id,
        operation_id = operation_id,
    )
}

/// Span for a dequeue loop.
#[must_use]
pub fn dequeue_span(queue: &str) -> Span {
    tracing::info_span!("dequeue", queue = queue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Json);
    }

    #[test]
    fn parses_log_format() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" pretty ".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn spans_accept_events() {
        let span = operation_span("get", "/planes/radius/local", "op-1");
        let _guard = span.enter();
        tracing::info!("inside operation span");

        let span = dequeue_span("keel-operations");
        let _guard = span.enter();
        tracing::debug!("inside dequeue span");
    }
}
