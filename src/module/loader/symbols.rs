//! Symbols and the shared symbol registry
//!
//! A symbol is anything one module can hand to another by name: a resource
//! shipped in its package, a runtime value defined by its code, or a module
//! constructor. The shared registry caches the symbols that have already
//! been resolved across loading contexts.

use dashmap::DashMap;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::module::traits::Module;

/// Zero-argument module constructor
pub type ModuleFactory = Arc<dyn Fn() -> anyhow::Result<Box<dyn Module>> + Send + Sync>;

/// A named definition visible through a loading context
#[derive(Clone)]
pub enum Symbol {
    /// Raw package entry
    Resource(Arc<[u8]>),
    /// Runtime definition made by module code
    Value(Arc<dyn Any + Send + Sync>),
    /// Module constructor
    Factory(ModuleFactory),
}

impl Symbol {
    /// Wrap a runtime value
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        Symbol::Value(Arc::new(value))
    }

    /// Wrap package bytes
    pub fn resource(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Symbol::Resource(Arc::from(bytes))
    }

    /// Typed view of a `Value` symbol
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Symbol::Value(value) => Arc::clone(value).downcast::<T>().ok(),
            _ => None,
        }
    }

    pub fn as_resource(&self) -> Option<&[u8]> {
        match self {
            Symbol::Resource(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Symbol::Resource(_) => "resource",
            Symbol::Value(_) => "value",
            Symbol::Factory(_) => "factory",
        }
    }

    /// Whether both symbols refer to the very same definition
    pub fn same_definition(&self, other: &Symbol) -> bool {
        match (self, other) {
            (Symbol::Resource(a), Symbol::Resource(b)) => Arc::ptr_eq(a, b),
            (Symbol::Value(a), Symbol::Value(b)) => {
                std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
            }
            (Symbol::Factory(a), Symbol::Factory(b)) => {
                std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Resource(bytes) => write!(f, "Resource({} bytes)", bytes.len()),
            Symbol::Value(_) => f.write_str("Value(..)"),
            Symbol::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Unique identity of one loading context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(Uuid);

impl ContextId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct SharedEntry {
    symbol: Symbol,
    owner: ContextId,
}

/// First-writer-wins cache of cross-context resolutions
///
/// Insertion is a single per-key compare-and-set on a sharded map, so point
/// lookups and inserts never take a global lock.
#[derive(Default)]
pub struct SharedSymbolRegistry {
    entries: DashMap<String, SharedEntry>,
}

impl SharedSymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached symbol and the context that supplied it
    pub fn get(&self, name: &str) -> Option<(Symbol, ContextId)> {
        self.entries
            .get(name)
            .map(|entry| (entry.symbol.clone(), entry.owner))
    }

    pub fn owner_of(&self, name: &str) -> Option<ContextId> {
        self.entries.get(name).map(|entry| entry.owner)
    }

    /// Insert unless the name is already cached; returns the resident entry.
    pub fn insert_if_absent(
        &self,
        name: &str,
        symbol: Symbol,
        owner: ContextId,
    ) -> (Symbol, ContextId) {
        let entry = self
            .entries
            .entry(name.to_string())
            .or_insert_with(|| SharedEntry { symbol, owner });
        (entry.symbol.clone(), entry.owner)
    }

    /// Remove `name` only if `owner` still owns it
    pub fn withdraw(&self, name: &str, owner: ContextId) -> bool {
        self.entries
            .remove_if(name, |_, entry| entry.owner == owner)
            .is_some()
    }

    /// Drop every entry owned by `owner`, returning how many were removed
    pub fn purge_owner(&self, owner: ContextId) -> usize {
        let mut purged = 0;
        self.entries.retain(|_, entry| {
            let keep = entry.owner != owner;
            if !keep {
                purged += 1;
            }
            keep
        });
        purged
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
