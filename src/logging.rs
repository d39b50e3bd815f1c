//! Logging setup for embedders of the registry.
//!
//! The library itself only emits `tracing` events as `[component] event`
//! lines; components are `registry`, `index`, `merge`, `watcher`, `create`.
//! Hosts without a subscriber of their own can install one from the
//! `[logging]` settings:
//!
//! ```toml
//! [logging]
//! default = "warn"
//!
//! [logging.modules]
//! "file_templates::watcher" = "debug"
//! ```
//!
//! `RUST_LOG` replaces the configured filter entirely.

use std::sync::Once;

use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// `HH:MM:SS.mmm` local timestamps.
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Build the filter directive string from configuration.
fn filter_directives(config: &LoggingConfig) -> String {
    let mut filter_str = config.default.clone();
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();
    for (module, level) in modules {
        filter_str.push_str(&format!(",{module}={level}"));
    }
    filter_str
}

/// Initialize logging with configuration.
///
/// Safe to call multiple times (only first call takes effect). The `RUST_LOG`
/// environment variable takes precedence over config settings. Installation
/// is skipped quietly when the host already set a global subscriber.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(filter_directives(config))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(filter);

        let _ = tracing_subscriber::registry().with(fmt_layer).try_init();
    });
}

/// Initialize logging with default configuration (`warn`).
pub fn init() {
    init_with_config(&LoggingConfig::default());
}

/// Log an event with component context.
///
/// # Examples
/// ```ignore
/// log_event!("watcher", "watching", "{}", path.display());
/// log_event!("registry", "initialized");
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:expr, $event:expr) => {
        tracing::info!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

/// Debug-only event logging.
///
/// # Examples
/// ```ignore
/// debug_event!("index", "duplicate", "{}", path.display());
/// ```
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_filter_directives() {
        let mut modules = HashMap::new();
        modules.insert("file_templates::watcher".to_string(), "trace".to_string());
        modules.insert("file_templates::merge".to_string(), "debug".to_string());
        let config = LoggingConfig {
            default: "warn".to_string(),
            modules,
        };
        assert_eq!(
            filter_directives(&config),
            "warn,file_templates::merge=debug,file_templates::watcher=trace"
        );
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init();
        init();
        tracing::debug!("still alive");
    }
}
