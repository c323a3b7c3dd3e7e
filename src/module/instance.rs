//! Loaded module records

use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::module::loader::context::LoadingContext;
use crate::module::loader::ModuleLoader;
use crate::module::registry::descriptor::ModuleDescriptor;
use crate::module::traits::{Module, ModuleState};

/// State and instance, guarded together so that checking the state and
/// running the matching hook form one critical section.
pub(crate) struct Lifecycle {
    pub(crate) state: ModuleState,
    pub(crate) instance: Box<dyn Module>,
}

/// A module instantiated by a loader
pub struct LoadedModule {
    descriptor: Arc<ModuleDescriptor>,
    source: PathBuf,
    loader: Arc<dyn ModuleLoader>,
    context: LoadingContext,
    lifecycle: Mutex<Lifecycle>,
}

impl LoadedModule {
    pub(crate) fn new(
        descriptor: Arc<ModuleDescriptor>,
        source: PathBuf,
        loader: Arc<dyn ModuleLoader>,
        context: LoadingContext,
        instance: Box<dyn Module>,
    ) -> Self {
        Self {
            descriptor,
            source,
            loader,
            context,
            lifecycle: Mutex::new(Lifecycle {
                state: ModuleState::Loaded,
                instance,
            }),
        }
    }

    /// Sanitized module name (registry key)
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    /// Package the module was loaded from
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Loader that instantiated the module and drives its hooks
    pub fn loader(&self) -> &Arc<dyn ModuleLoader> {
        &self.loader
    }

    pub fn context(&self) -> &LoadingContext {
        &self.context
    }

    pub fn state(&self) -> ModuleState {
        self.lifecycle.lock().state
    }

    pub fn is_enabled(&self) -> bool {
        self.state() == ModuleState::Enabled
    }

    pub(crate) fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock()
    }
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("name", &self.descriptor.name())
            .field("version", &self.descriptor.version())
            .field("source", &self.source)
            .field("loader", &self.loader.name())
            .field("context", &self.context.id())
            .finish()
    }
}
