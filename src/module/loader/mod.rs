//! Module loading system
//!
//! Handles package validation, isolated loading contexts, and module
//! instantiation.

pub mod context;
pub mod entry_points;
pub mod factory;
#[allow(clippy::module_inception)]
pub mod loader;
pub mod package;
pub mod symbols;

pub use context::{LoadingContext, SymbolSpace};
pub use entry_points::EntryPoints;
pub use factory::LoaderFactory;
pub use loader::{ModuleLoader, PackageLoader};
pub use package::{PackageFormat, DEFAULT_DESCRIPTOR_ENTRY};
pub use symbols::{ContextId, ModuleFactory, SharedSymbolRegistry, Symbol};
