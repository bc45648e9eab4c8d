//! Logging initialization
//!
//! Configures `tracing-subscriber` from the resolved log level and format.
//! All log output goes to stderr so reports on stdout stay machine-readable.

use crate::core::config::LogFormat;
use crate::core::error::{AuditError, AuditResult};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
/// `RUST_LOG` takes precedence over `level` when it is set.
pub fn init_tracing(level: &str, format: LogFormat) -> AuditResult<()> {
  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

  match format {
    LogFormat::Json => tracing_subscriber::registry()
      .with(env_filter)
      .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
      .try_init()
      .map_err(|e| AuditError::message(format!("failed to initialize JSON tracing subscriber: {}", e))),
    LogFormat::Text => tracing_subscriber::registry()
      .with(env_filter)
      .with(
        tracing_subscriber::fmt::layer()
          .with_target(false)
          .with_writer(std::io::stderr),
      )
      .try_init()
      .map_err(|e| AuditError::message(format!("failed to initialize tracing subscriber: {}", e))),
  }
}
