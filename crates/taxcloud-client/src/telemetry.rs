//! # Logging
//!
//! Everything the integration logs goes to the `taxcloud` tracing target.
//!
//! ## Log Levels
//! - `RUST_LOG=debug` - Show debug messages, request payloads included
//! - `RUST_LOG=taxcloud=trace` - Trace for the integration only
//! - Default: `warn` globally, `[logging] level` for `taxcloud`
//!
//! With `[logging] enabled = false` the `taxcloud` target is switched off
//! even when `RUST_LOG` asks for it.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

/// Tracing target of every integration log line.
pub const TARGET: &str = "taxcloud";

/// Filter directives for `settings`, layered over `env` (the `RUST_LOG` value).
pub fn filter_directives(settings: &LoggingSettings, env: Option<&str>) -> String {
    let level = if settings.enabled {
        settings.level.trim().to_lowercase()
    } else {
        "off".to_string()
    };

    match env.map(str::trim).filter(|s| !s.is_empty()) {
        Some(env) if settings.enabled => env.to_string(),
        Some(env) => format!("{env},{TARGET}=off"),
        None => format!("warn,{TARGET}={level}"),
    }
}

/// Installs the global fmt subscriber.
///
/// Returns `false` when a subscriber was already installed (tests, or a host
/// that set up its own).
pub fn init(settings: &LoggingSettings) -> bool {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directives = filter_directives(settings, env.as_deref());
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
