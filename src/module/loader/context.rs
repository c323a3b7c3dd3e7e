//! Isolated loading contexts
//!
//! Every loaded module owns one context: a private table of the symbols it
//! defines. A context resolves names it does not define by consulting the
//! shared registry first and then the other active contexts of its symbol
//! space, caching whatever it finds.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::module::loader::symbols::{ContextId, SharedSymbolRegistry, Symbol};
use crate::module::registry::descriptor::ModuleDescriptor;
use crate::module::traits::ModuleError;

/// Shared registry plus the set of active contexts
///
/// One space is created when the host starts and shared by all of its
/// loaders. It lives until [`SymbolSpace::shutdown`] on full shutdown.
#[derive(Default)]
pub struct SymbolSpace {
    shared: SharedSymbolRegistry,
    /// Copy-on-write: scans iterate an immutable snapshot in activation order
    active: RwLock<Arc<Vec<Arc<ContextInner>>>>,
}

impl SymbolSpace {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn shared(&self) -> &SharedSymbolRegistry {
        &self.shared
    }

    pub fn active_count(&self) -> usize {
        self.active.read().len()
    }

    /// Names of the modules whose contexts are active, in activation order
    pub fn active_modules(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .map(|ctx| ctx.descriptor.name().to_string())
            .collect()
    }

    /// Descriptor of the module that would supply `name` to an outside lookup
    ///
    /// The owner of a shared entry answers first, then the first active
    /// context defining the name. Nothing is cached and no counter moves.
    pub fn provider_of(&self, name: &str) -> Option<Arc<ModuleDescriptor>> {
        let active = self.snapshot();
        if let Some(owner) = self.shared.owner_of(name) {
            if let Some(ctx) = active.iter().find(|ctx| ctx.id == owner) {
                return Some(Arc::clone(&ctx.descriptor));
            }
        }
        active
            .iter()
            .find(|ctx| ctx.locals.read().contains_key(name))
            .map(|ctx| Arc::clone(&ctx.descriptor))
    }

    /// Tear down every active context and empty the shared registry
    pub fn shutdown(&self) -> usize {
        let contexts = self.snapshot();
        for inner in contexts.iter() {
            LoadingContext {
                inner: Arc::clone(inner),
            }
            .teardown();
        }
        self.shared.clear();
        contexts.len()
    }

    fn snapshot(&self) -> Arc<Vec<Arc<ContextInner>>> {
        let active = self.active.read();
        Arc::clone(&*active)
    }

    fn register(&self, context: &Arc<ContextInner>) -> bool {
        let mut active = self.active.write();
        if active.iter().any(|ctx| ctx.id == context.id) {
            return false;
        }
        let mut next = Vec::with_capacity(active.len() + 1);
        next.extend(active.iter().cloned());
        next.push(Arc::clone(context));
        *active = Arc::new(next);
        true
    }

    fn unregister(&self, id: ContextId) -> bool {
        let mut active = self.active.write();
        if !active.iter().any(|ctx| ctx.id == id) {
            return false;
        }
        let next: Vec<_> = active.iter().filter(|ctx| ctx.id != id).cloned().collect();
        *active = Arc::new(next);
        true
    }
}

struct ContextInner {
    id: ContextId,
    descriptor: Arc<ModuleDescriptor>,
    locals: RwLock<HashMap<String, Symbol>>,
    space: Arc<SymbolSpace>,
    active: AtomicBool,
    lookups_served: AtomicU64,
}

/// Per-module namespace handle
///
/// Cloning yields another handle to the same context.
#[derive(Clone)]
pub struct LoadingContext {
    inner: Arc<ContextInner>,
}

impl LoadingContext {
    /// Create an inactive context in `space`
    pub fn new(descriptor: Arc<ModuleDescriptor>, space: Arc<SymbolSpace>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                id: ContextId::new(),
                descriptor,
                locals: RwLock::new(HashMap::new()),
                space,
                active: AtomicBool::new(false),
                lookups_served: AtomicU64::new(0),
            }),
        }
    }

    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    /// Descriptor of the module owning this context
    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.inner.descriptor
    }

    pub fn space(&self) -> &Arc<SymbolSpace> {
        &self.inner.space
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// How many times sibling contexts queried this context's local table
    pub fn lookups_served(&self) -> u64 {
        self.inner.lookups_served.load(Ordering::SeqCst)
    }

    /// Define a local symbol; the first definition of a name wins
    pub fn define_local(&self, name: impl Into<String>, symbol: Symbol) -> bool {
        let mut locals = self.inner.locals.write();
        match locals.entry(name.into()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(symbol);
                true
            }
        }
    }

    pub fn lookup_local(&self, name: &str) -> Option<Symbol> {
        self.inner.locals.read().get(name).cloned()
    }

    /// Sorted names of the locally defined symbols
    pub fn local_symbols(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.locals.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Resolve a name visible to this module
    ///
    /// Order: local table, shared registry, then the local tables of the
    /// other active contexts in activation order. A hit from another context
    /// is cached in the shared registry under that context's ownership.
    pub fn resolve(&self, name: &str) -> Result<Symbol, ModuleError> {
        if let Some(symbol) = self.lookup_local(name) {
            return Ok(symbol);
        }

        let space = &self.inner.space;
        if let Some((symbol, _)) = space.shared.get(name) {
            return Ok(symbol);
        }

        for sibling in space.snapshot().iter() {
            if sibling.id == self.inner.id {
                continue;
            }
            let Some(symbol) = supply(sibling, name) else {
                continue;
            };

            let (resident, owner) = space.shared.insert_if_absent(name, symbol, sibling.id);
            // The supplier may have been torn down between the lookup and the
            // insert; its purge could then have missed this entry.
            if owner == sibling.id && !sibling.active.load(Ordering::SeqCst) {
                space.shared.withdraw(name, owner);
                continue;
            }

            debug!(
                "Module {} resolved `{}` from module {}",
                self.inner.descriptor.name(),
                name,
                sibling.descriptor.name()
            );
            return Ok(resident);
        }

        Err(ModuleError::SymbolResolution(name.to_string()))
    }

    /// Make this context visible to other contexts' lookups
    pub fn activate(&self) -> bool {
        if self.inner.active.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.inner.space.register(&self.inner);
        true
    }

    /// Withdraw from the active set and purge shared entries owned here.
    ///
    /// Idempotent: returns false when the context was not active.
    pub fn teardown(&self) -> bool {
        if !self.inner.active.swap(false, Ordering::SeqCst) {
            return false;
        }
        let space = &self.inner.space;
        space.unregister(self.inner.id);
        let purged = space.shared.purge_owner(self.inner.id);
        debug!(
            "Tore down context of module {} ({} shared symbols purged)",
            self.inner.descriptor.name(),
            purged
        );
        true
    }
}

/// Answer a sibling's lookup from `context`'s own local table only
fn supply(context: &ContextInner, name: &str) -> Option<Symbol> {
    context.lookups_served.fetch_add(1, Ordering::SeqCst);
    if !context.active.load(Ordering::SeqCst) {
        return None;
    }
    context.locals.read().get(name).cloned()
}

impl PartialEq for LoadingContext {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for LoadingContext {}

impl fmt::Debug for LoadingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadingContext")
            .field("id", &self.inner.id)
            .field("module", &self.inner.descriptor.name())
            .field("active", &self.is_active())
            .finish()
    }
}
