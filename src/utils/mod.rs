//! Utility modules shared by the host and the CLI

pub mod env;
pub mod logging;

pub use env::{env_is_set, env_opt};
#[cfg(feature = "json-logging")]
pub use logging::init_json_logging;
pub use logging::{init_logging, init_logging_from_config};
