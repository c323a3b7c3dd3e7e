//! Module system
//!
//! Loads packaged modules into isolated loading contexts and drives their
//! lifecycle.
//!
//! ## Architecture
//!
//! - **Isolation**: every module gets its own loading context holding the
//!   symbols it defines
//! - **Sharing**: a context resolves names it does not define through a shared
//!   registry and then through the other active contexts
//! - **Teardown**: disabling a module withdraws its context and purges every
//!   shared entry it supplied

pub mod instance;
pub mod loader;
pub mod manager;
pub mod registry;
pub mod traits;

pub use instance::LoadedModule;
pub use loader::{
    ContextId, EntryPoints, LoaderFactory, LoadingContext, ModuleLoader, PackageFormat,
    PackageLoader, SharedSymbolRegistry, Symbol, SymbolSpace,
};
pub use manager::{ErrorHandler, ModuleManager};
pub use registry::{sanitize_name, ModuleDescriptor, PackageDiscovery};
pub use traits::{DescriptorError, LifecycleHook, Module, ModuleError, ModuleState};
