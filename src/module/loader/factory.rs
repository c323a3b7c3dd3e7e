//! Loader chain
//!
//! Picks the loader responsible for a package: the first registered loader
//! whose format check accepts it.

use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::config::ModuleConfig;
use crate::module::loader::context::SymbolSpace;
use crate::module::loader::entry_points::EntryPoints;
use crate::module::loader::loader::{ModuleLoader, PackageLoader};

/// Ordered, immutable-after-construction list of loaders
#[derive(Default, Clone)]
pub struct LoaderFactory {
    loaders: Vec<Arc<dyn ModuleLoader>>,
}

impl LoaderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default chain built from `config.loaders`, all sharing one symbol space
    pub fn with_defaults(entry_points: Arc<EntryPoints>, config: &ModuleConfig) -> Self {
        let space = SymbolSpace::new();
        let mut factory = Self::new();
        for format in &config.loaders {
            let loader = PackageLoader::new(*format, Arc::clone(&entry_points), Arc::clone(&space))
                .with_descriptor_entry(config.descriptor_entry.clone());
            factory.register(Arc::new(loader));
        }
        factory
    }

    pub fn with_loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.register(loader);
        self
    }

    /// Append a loader; earlier loaders take precedence
    pub fn register(&mut self, loader: Arc<dyn ModuleLoader>) {
        debug!("Registered module loader {}", loader.name());
        self.loaders.push(loader);
    }

    /// First loader claiming `package`
    pub fn validate(&self, package: &Path) -> Option<Arc<dyn ModuleLoader>> {
        self.loaders
            .iter()
            .find(|loader| loader.validate(package))
            .cloned()
    }

    pub fn loaders(&self) -> &[Arc<dyn ModuleLoader>] {
        &self.loaders
    }

    /// Shut down every loader, tearing down all remaining contexts
    pub fn shutdown(&self) {
        for loader in &self.loaders {
            loader.shutdown();
        }
    }
}

impl std::fmt::Debug for LoaderFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.loaders.iter().map(|loader| loader.name()))
            .finish()
    }
}
