//! # Observability
//!
//! Logging setup for the auth-recovery binaries.
//!
//! Binaries call `observability::init()` once at startup and use standard
//! `tracing` macros everywhere else. Library crates never install a subscriber.
//!
//! ## Usage
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init("auth-recovery-sim");
//!     tracing::info!("service started");
//! }
//! ```
//!
//! Or with configuration:
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "auth-recovery-sim".into(),
//!     default_level: "debug".into(),
//!     format: observability::LogFormat::Json,
//!     ..Default::default()
//! });
//! ```
//!
//! `RUST_LOG` always overrides `default_level`.

use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Output format for log lines on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Single-line human-readable output.
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, logged once when the subscriber is installed.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    pub format: LogFormat,

    /// Include the module path of each event.
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            format: LogFormat::Compact,
            with_target: true,
        }
    }
}

/// Initialize logging with default settings.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with custom configuration. A second call is a no-op.
pub fn init_with_config(config: LogConfig) {
    if try_init_with_config(&config).is_ok() {
        tracing::debug!(
            service = %config.service_name,
            pid = std::process::id(),
            "Logging initialized"
        );
    }
}

/// Initialize logging, failing if a global subscriber is already set.
pub fn try_init_with_config(config: &LogConfig) -> Result<(), TryInitError> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = env_filter(&config.default_level, rust_log.as_deref());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target)
        .with_writer(std::io::stderr);

    match config.format {
        LogFormat::Compact => builder.compact().finish().try_init(),
        LogFormat::Json => builder.json().finish().try_init(),
    }
}

/// Filter from `RUST_LOG` when it parses, otherwise from `default_level`.
fn env_filter(default_level: &str, rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_new(default_level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Re-export tracing macros for convenience.
/// Services can use `observability::info!()` or `tracing::info!()`.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.service_name, "unknown");
        assert_eq!(config.default_level, "info");
        assert_eq!(config.format, LogFormat::Compact);
        assert!(config.with_target);
    }

    #[test]
    fn test_filter_prefers_rust_log() {
        let filter = env_filter("info", Some("auth_recovery=trace"));
        assert_eq!(filter.to_string(), "auth_recovery=trace");
    }

    #[test]
    fn test_filter_falls_back_to_default_level() {
        assert_eq!(env_filter("debug", None).to_string(), "debug");
        assert_eq!(env_filter("warn", Some("auth_recovery=loud")).to_string(), "warn");
    }

    #[test]
    fn test_filter_ignores_invalid_default() {
        assert_eq!(env_filter("auth_recovery=loud", None).to_string(), "info");
    }

    #[test]
    fn test_second_init_is_rejected() {
        let config = LogConfig::default();
        let _ = try_init_with_config(&config);
        assert!(try_init_with_config(&config).is_err());
    }
}
