//! Logging initialization
//!
//! - Respects the RUST_LOG environment variable, which always wins
//! - Falls back to the configured filter, then to "info"
//! - Optional JSON output behind the `json-logging` feature
//!
//! # Usage
//! ```rust,no_run
//! use modhost::utils::init_logging;
//!
//! init_logging(None); // Uses RUST_LOG or defaults to "info"
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::utils::env::env_is_set;

/// Filter used when neither RUST_LOG nor a configured filter is present
pub const DEFAULT_FILTER: &str = "info";

fn env_filter(filter: Option<&str>) -> EnvFilter {
    if env_is_set("RUST_LOG") {
        return EnvFilter::from_default_env();
    }
    EnvFilter::new(filter.unwrap_or(DEFAULT_FILTER))
}

/// Initialize human-readable logging on stderr
///
/// # Arguments
/// * `filter` - Optional log filter from config (e.g. "debug",
///   "modhost::module=trace"); ignored when RUST_LOG is set
pub fn init_logging(filter: Option<&str>) {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(!env_is_set("NO_COLOR")),
        )
        .with(env_filter(filter))
        .init();
}

/// Initialize logging with JSON output (for log aggregation)
#[cfg(feature = "json-logging")]
pub fn init_json_logging(filter: Option<&str>) {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(env_filter(filter))
        .init();
}

/// Initialize logging from the optional `[logging]` config section
pub fn init_logging_from_config(config: Option<&LoggingConfig>) {
    let filter = config.and_then(|c| c.filter.as_deref());

    if config.is_some_and(|c| c.json_format) {
        #[cfg(feature = "json-logging")]
        {
            init_json_logging(filter);
        }
        #[cfg(not(feature = "json-logging"))]
        {
            // Fall back to regular logging if json-logging feature not enabled
            init_logging(filter);
        }
    } else {
        init_logging(filter);
    }
}
