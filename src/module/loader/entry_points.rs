//! Entry point table
//!
//! Maps the `main` identifier of a descriptor to the code that builds the
//! module. The host fills the table before any package is loaded.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::module::loader::symbols::Symbol;
use crate::module::traits::Module;

/// Host-provided entry points, keyed by identifier
#[derive(Debug, Default, Clone)]
pub struct EntryPoints {
    symbols: BTreeMap<String, Symbol>,
}

impl EntryPoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a zero-argument constructor under `id`
    pub fn register<M, F>(&mut self, id: impl Into<String>, constructor: F) -> &mut Self
    where
        M: Module + 'static,
        F: Fn() -> anyhow::Result<M> + Send + Sync + 'static,
    {
        let factory = move || constructor().map(|module| Box::new(module) as Box<dyn Module>);
        self.symbols
            .insert(id.into(), Symbol::Factory(Arc::new(factory)));
        self
    }

    /// Register a module type built through `Default`
    pub fn register_default<M>(&mut self, id: impl Into<String>) -> &mut Self
    where
        M: Module + Default + 'static,
    {
        self.register(id, || Ok(M::default()))
    }

    /// Bind an arbitrary symbol under `id`
    ///
    /// Loading a package whose entry point names such a symbol fails with an
    /// instantiation error unless the symbol is a factory.
    pub fn define(&mut self, id: impl Into<String>, symbol: Symbol) -> &mut Self {
        self.symbols.insert(id.into(), symbol);
        self
    }

    pub fn get(&self, id: &str) -> Option<Symbol> {
        self.symbols.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.symbols.contains_key(id)
    }

    /// Registered identifiers in sorted order
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
