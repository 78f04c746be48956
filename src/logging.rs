//! Logging setup for Keel.
//!
//! Keel's crates emit `tracing` events and never install a subscriber
//! themselves. Applications either install their own, or call [`init`] with the
//! `logging` feature enabled to get one configured from the environment:
//!
//! - `KEEL_DEBUG=true|1|yes` - log at `debug`
//! - `KEEL_LOG_LEVEL=trace|debug|info|warn|error` - explicit level
//! - `KEEL_LOG_FORMAT=json|pretty|compact` - output format (default: json)
//!
//! ```rust,no_run
//! keel::logging::init();
//! ```

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line human readable output.
    Pretty,
    /// Single-line human readable output.
    Compact,
}

impl LogFormat {
    /// Parse a format name; unknown names fall back to JSON.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "pretty" => Self::Pretty,
            "compact" => Self::Compact,
            _ => Self::Json,
        }
    }

    /// The format name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
            Self::Compact => "compact",
        }
    }
}

fn truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

/// Resolve the log level from raw `KEEL_DEBUG` and `KEEL_LOG_LEVEL` values.
///
/// Returns `None` when neither asks for logging.
pub fn resolve_level(debug: Option<&str>, level: Option<&str>) -> Option<&'static str> {
    let debug = debug.is_some_and(truthy);
    let fallback = if debug { "debug" } else { "warn" };

    match level {
        Some(level) => {
            let level = level.to_ascii_lowercase();
            Some(
                LEVELS
                    .iter()
                    .copied()
                    .find(|l| *l == level)
                    .unwrap_or(fallback),
            )
        }
        None if debug => Some("debug"),
        None => None,
    }
}

/// Whether `KEEL_DEBUG` is set.
pub fn is_debug_enabled() -> bool {
    env::var("KEEL_DEBUG").is_ok_and(|v| truthy(&v))
}

/// The level [`init`] would use, or `None` when logging is not requested.
pub fn log_level() -> Option<&'static str> {
    let debug = env::var("KEEL_DEBUG").ok();
    let level = env::var("KEEL_LOG_LEVEL").ok();
    resolve_level(debug.as_deref(), level.as_deref())
}

/// The format from `KEEL_LOG_FORMAT`.
pub fn log_format() -> LogFormat {
    env::var("KEEL_LOG_FORMAT")
        .map(|f| LogFormat::parse(&f))
        .unwrap_or_default()
}

/// Install a global subscriber configured from the environment.
///
/// Does nothing unless `KEEL_DEBUG` or `KEEL_LOG_LEVEL` is set, or when the
/// `logging` feature is disabled. Later calls are no-ops.
pub fn init() {
    INIT.call_once(|| {
        let Some(level) = log_level() else {
            return;
        };

        #[cfg(feature = "logging")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let filter = EnvFilter::try_new(format!(
                "keel={level},keel_schema={level},keel_migrate={level}"
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            let format = log_format();
            let registry = tracing_subscriber::registry().with(filter);
            let installed = match format {
                LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
                LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
                LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
            };

            if installed.is_ok() {
                tracing::info!(level, format = format.as_str(), "keel logging initialized");
            }
        }

        #[cfg(not(feature = "logging"))]
        let _ = level;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_level() {
        assert_eq!(resolve_level(None, None), None);
        assert_eq!(resolve_level(Some("no"), None), None);
        assert_eq!(resolve_level(Some("TRUE"), None), Some("debug"));
        assert_eq!(resolve_level(Some("1"), Some("trace")), Some("trace"));
        assert_eq!(resolve_level(None, Some("Info")), Some("info"));
        assert_eq!(resolve_level(None, Some("loud")), Some("warn"));
        assert_eq!(resolve_level(Some("yes"), Some("loud")), Some("debug"));
    }

    #[test]
    fn test_log_format() {
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("COMPACT"), LogFormat::Compact);
        assert_eq!(LogFormat::parse("xml"), LogFormat::Json);
        assert_eq!(LogFormat::default().as_str(), "json");
    }
}
