//! Module loader implementation
//!
//! Handles package validation, module instantiation inside an isolated
//! loading context, and enable/disable hook invocation.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, info_span, Span};

use crate::module::instance::LoadedModule;
use crate::module::loader::context::{LoadingContext, SymbolSpace};
use crate::module::loader::entry_points::EntryPoints;
use crate::module::loader::package::{Package, PackageFormat, DEFAULT_DESCRIPTOR_ENTRY};
use crate::module::loader::symbols::Symbol;
use crate::module::registry::descriptor::ModuleDescriptor;
use crate::module::traits::{LifecycleHook, Module, ModuleError, ModuleState};

/// A strategy for one package format
///
/// Implementations must be safe to query from several threads; the state of
/// an individual module is only touched under its lifecycle lock.
pub trait ModuleLoader: Send + Sync {
    /// Short loader name used in logs and error reports
    fn name(&self) -> &str;

    /// Whether `package` has this loader's format. Never mutates shared state.
    fn validate(&self, package: &Path) -> bool;

    /// Parse the package descriptor without instantiating anything
    fn describe(&self, package: &Path) -> Result<ModuleDescriptor, ModuleError>;

    /// Instantiate the module in `package` and run its `on_load` hook
    fn load_module(self: Arc<Self>, package: &Path) -> Result<LoadedModule, ModuleError>;

    /// Enable `module`; `Ok(false)` when the transition is a no-op
    fn enable_module(&self, module: &LoadedModule) -> Result<bool, ModuleError>;

    /// Disable `module` and tear down its context; `Ok(false)` when not enabled
    fn disable_module(&self, module: &LoadedModule) -> Result<bool, ModuleError>;

    /// Tear down every context still active in this loader's symbol space
    fn shutdown(&self);
}

/// Loader for zip archives and exploded directories
pub struct PackageLoader {
    name: String,
    format: PackageFormat,
    descriptor_entry: String,
    entry_points: Arc<EntryPoints>,
    space: Arc<SymbolSpace>,
}

impl PackageLoader {
    pub fn new(
        format: PackageFormat,
        entry_points: Arc<EntryPoints>,
        space: Arc<SymbolSpace>,
    ) -> Self {
        Self {
            name: format.as_str().to_string(),
            format,
            descriptor_entry: DEFAULT_DESCRIPTOR_ENTRY.to_string(),
            entry_points,
            space,
        }
    }

    /// Use a descriptor entry other than `module.properties`
    pub fn with_descriptor_entry(mut self, entry: impl Into<String>) -> Self {
        self.descriptor_entry = entry.into();
        self
    }

    pub fn format(&self) -> PackageFormat {
        self.format
    }

    pub fn descriptor_entry(&self) -> &str {
        &self.descriptor_entry
    }

    pub fn space(&self) -> &Arc<SymbolSpace> {
        &self.space
    }

    fn check_owner(&self, module: &LoadedModule) -> Result<(), ModuleError> {
        let owner = Arc::as_ptr(module.loader()) as *const ();
        if std::ptr::eq(owner, self as *const Self as *const ()) {
            return Ok(());
        }
        Err(ModuleError::ForeignModule {
            module: module.name().to_string(),
            owner: module.loader().name().to_string(),
            loader: self.name.clone(),
        })
    }

    /// Build the module instance named by the descriptor's entry point.
    ///
    /// The context's own table is consulted before the host entry points.
    fn instantiate(&self, context: &LoadingContext) -> Result<Box<dyn Module>, ModuleError> {
        let descriptor = context.descriptor();
        let entry_point = descriptor.entry_point();
        let failure = |reason: String| ModuleError::Instantiation {
            module: descriptor.name().to_string(),
            entry_point: entry_point.to_string(),
            reason,
        };

        let symbol = context
            .lookup_local(entry_point)
            .or_else(|| self.entry_points.get(entry_point))
            .ok_or_else(|| failure("entry point not found".to_string()))?;

        match symbol {
            Symbol::Factory(factory) => factory().map_err(|e| failure(format!("{:#}", e))),
            other => Err(failure(format!(
                "entry point is a {}, not a module factory",
                other.kind()
            ))),
        }
    }
}

/// Span entered around every hook, so module log lines carry the module name
fn module_span(descriptor: &ModuleDescriptor, hook: LifecycleHook) -> Span {
    info_span!("module", name = %descriptor.name(), hook = %hook)
}

impl ModuleLoader for PackageLoader {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, package: &Path) -> bool {
        self.format.matches(package, &self.descriptor_entry)
    }

    fn describe(&self, package: &Path) -> Result<ModuleDescriptor, ModuleError> {
        Package::open(self.format, package)?.descriptor(&self.descriptor_entry)
    }

    fn load_module(self: Arc<Self>, package: &Path) -> Result<LoadedModule, ModuleError> {
        debug!("Loader {} opening package {:?}", self.name, package);
        let mut opened = Package::open(self.format, package)?;
        let descriptor = Arc::new(opened.descriptor(&self.descriptor_entry)?);

        let context = LoadingContext::new(Arc::clone(&descriptor), Arc::clone(&self.space));
        let resources = opened.resources(&self.descriptor_entry)?;
        let resource_count = resources.len();
        for (name, bytes) in resources {
            context.define_local(name, Symbol::resource(bytes));
        }

        let mut instance = self.instantiate(&context)?;
        let loaded =
            module_span(&descriptor, LifecycleHook::Load).in_scope(|| instance.on_load(&context));
        if let Err(e) = loaded {
            context.teardown();
            return Err(ModuleError::hook(descriptor.name(), LifecycleHook::Load, e));
        }
        context.activate();

        info!(
            "Loaded module {} from {:?} ({} resources, loader {})",
            descriptor.full_name(),
            package,
            resource_count,
            self.name
        );

        let source = package.to_path_buf();
        let loader: Arc<dyn ModuleLoader> = self;
        Ok(LoadedModule::new(descriptor, source, loader, context, instance))
    }

    fn enable_module(&self, module: &LoadedModule) -> Result<bool, ModuleError> {
        self.check_owner(module)?;

        let mut lifecycle = module.lifecycle();
        if !lifecycle.state.can_transition_to(ModuleState::Enabled) {
            debug!("Module {} is already enabled", module.name());
            return Ok(false);
        }

        let context = module.context();
        let reactivated = context.activate();
        let enabled = module_span(module.descriptor(), LifecycleHook::Enable)
            .in_scope(|| lifecycle.instance.on_enable(context));
        if let Err(e) = enabled {
            // A disabled module stays torn down.
            if reactivated {
                context.teardown();
            }
            return Err(ModuleError::hook(module.name(), LifecycleHook::Enable, e));
        }

        lifecycle.state = ModuleState::Enabled;
        info!("Enabled module {}", module.descriptor().full_name());
        Ok(true)
    }

    fn disable_module(&self, module: &LoadedModule) -> Result<bool, ModuleError> {
        self.check_owner(module)?;

        let mut lifecycle = module.lifecycle();
        if !lifecycle.state.can_transition_to(ModuleState::Disabled) {
            debug!("Module {} is not enabled", module.name());
            return Ok(false);
        }

        let result = module_span(module.descriptor(), LifecycleHook::Disable)
            .in_scope(|| lifecycle.instance.on_disable(module.context()));
        lifecycle.state = ModuleState::Disabled;
        module.context().teardown();
        drop(lifecycle);

        info!("Disabled module {}", module.descriptor().full_name());
        result.map_err(|e| ModuleError::hook(module.name(), LifecycleHook::Disable, e))?;
        Ok(true)
    }

    fn shutdown(&self) {
        let torn_down = self.space.shutdown();
        if torn_down > 0 {
            debug!("Loader {} tore down {} contexts", self.name, torn_down);
        }
    }
}
