//! Module registry and discovery
//!
//! Handles package discovery and descriptor parsing.

pub mod descriptor;
pub mod discovery;

pub use descriptor::{sanitize_name, ModuleDescriptor, DEFAULT_VERSION};
pub use discovery::PackageDiscovery;
