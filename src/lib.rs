//! modhost - dynamic module loading and lifecycle management
//!
//! Discovers module packages (zip archives or exploded directories), loads
//! each one into an isolated loading context, and drives the
//! load → enable → disable lifecycle. Contexts resolve symbols exported by
//! other loaded modules through a shared, first-writer-wins registry.
//!
//! ```rust,no_run
//! use modhost::config::HostConfig;
//! use modhost::module::{EntryPoints, Module, ModuleManager};
//!
//! #[derive(Default)]
//! struct Greeter;
//!
//! impl Module for Greeter {}
//!
//! let mut entry_points = EntryPoints::new();
//! entry_points.register_default::<Greeter>("greeter.Main");
//!
//! let manager = ModuleManager::from_config(&HostConfig::default(), entry_points);
//! manager.auto_load_modules()?;
//! manager.enable_modules();
//! manager.clear_modules();
//! # Ok::<(), modhost::module::ModuleError>(())
//! ```

pub mod config;
pub mod module;
pub mod utils;

pub use config::{HostConfig, LoggingConfig, ModuleConfig};
pub use module::{LoadedModule, Module, ModuleError, ModuleManager, ModuleState};
