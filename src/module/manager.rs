//! Module manager for orchestrating all modules
//!
//! Single source of truth for what is currently loaded. Handles package
//! loading, bulk enable/disable, unloading, and full shutdown.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::HostConfig;
use crate::module::instance::LoadedModule;
use crate::module::loader::{EntryPoints, LoaderFactory};
use crate::module::registry::{sanitize_name, PackageDiscovery};
use crate::module::traits::ModuleError;

/// Receives every failure caught during batch operations
pub type ErrorHandler = Arc<dyn Fn(&ModuleError) + Send + Sync>;

#[derive(Default)]
struct ModuleRegistry {
    /// Sanitized name -> module
    by_name: HashMap<String, Arc<LoadedModule>>,
    /// Registration order
    ordered: Vec<Arc<LoadedModule>>,
}

impl ModuleRegistry {
    fn insert(&mut self, module: Arc<LoadedModule>) {
        self.by_name
            .insert(module.name().to_string(), Arc::clone(&module));
        self.ordered.push(module);
    }

    fn remove(&mut self, name: &str) -> Option<Arc<LoadedModule>> {
        let module = self.by_name.remove(name)?;
        self.ordered.retain(|m| !Arc::ptr_eq(m, &module));
        Some(module)
    }

    fn contains(&self, module: &LoadedModule) -> bool {
        self.by_name
            .get(module.name())
            .is_some_and(|registered| std::ptr::eq(Arc::as_ptr(registered), module))
    }
}

/// Module manager coordinates all loaded modules
pub struct ModuleManager {
    factory: LoaderFactory,
    /// Directory scanned by `auto_load_modules`
    modules_dir: PathBuf,
    registry: Mutex<ModuleRegistry>,
    error_handler: ErrorHandler,
}

impl ModuleManager {
    pub fn new<P: AsRef<Path>>(factory: LoaderFactory, modules_dir: P) -> Self {
        Self {
            factory,
            modules_dir: modules_dir.as_ref().to_path_buf(),
            registry: Mutex::new(ModuleRegistry::default()),
            error_handler: Arc::new(|e: &ModuleError| warn!("Module operation failed: {}", e)),
        }
    }

    /// Manager with the default loader chain described by `config`
    pub fn from_config(config: &HostConfig, entry_points: EntryPoints) -> Self {
        let factory = LoaderFactory::with_defaults(Arc::new(entry_points), &config.modules);
        Self::new(factory, &config.modules.modules_dir)
    }

    /// Replace the handler that receives batch-operation failures
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ModuleError) + Send + Sync + 'static,
    {
        self.error_handler = Arc::new(handler);
        self
    }

    pub fn factory(&self) -> &LoaderFactory {
        &self.factory
    }

    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }

    fn report(&self, error: &ModuleError) {
        (self.error_handler)(error);
    }

    /// Load a single package and register the resulting module.
    ///
    /// A package whose module name is already registered is rejected before
    /// it is instantiated. Hooks run without the registry lock held, so
    /// `on_load` may query the manager.
    pub fn load_module<P: AsRef<Path>>(&self, package: P) -> Result<Arc<LoadedModule>, ModuleError> {
        let package = package.as_ref();

        let loader = self
            .factory
            .validate(package)
            .ok_or_else(|| ModuleError::validation(package, "no loader accepts this package"))?;

        let descriptor = loader.describe(package)?;
        if self.registry.lock().by_name.contains_key(descriptor.name()) {
            return Err(ModuleError::DuplicateModule(descriptor.name().to_string()));
        }

        debug!("Loading {} with loader {}", descriptor.full_name(), loader.name());
        let module = Arc::new(loader.load_module(package)?);

        let mut registry = self.registry.lock();
        // Another load of the same name may have won while this one ran, or
        // the package changed on disk since it was described.
        if registry.by_name.contains_key(module.name()) {
            drop(registry);
            module.context().teardown();
            return Err(ModuleError::DuplicateModule(module.name().to_string()));
        }
        registry.insert(Arc::clone(&module));
        Ok(module)
    }

    /// Load every package found directly inside `dir`.
    ///
    /// Failures are forwarded to the error handler; the modules that loaded
    /// are returned in enumeration order.
    pub fn load_modules<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<Arc<LoadedModule>>, ModuleError> {
        let packages = PackageDiscovery::new(dir).discover()?;
        Ok(self.load_packages(&packages))
    }

    /// Load the configured modules directory, creating it when missing
    pub fn auto_load_modules(&self) -> Result<Vec<Arc<LoadedModule>>, ModuleError> {
        let packages = PackageDiscovery::new(&self.modules_dir)
            .create_missing(true)
            .discover()?;
        Ok(self.load_packages(&packages))
    }

    fn load_packages(&self, packages: &[PathBuf]) -> Vec<Arc<LoadedModule>> {
        let mut loaded = Vec::with_capacity(packages.len());
        for package in packages {
            match self.load_module(package) {
                Ok(module) => loaded.push(module),
                Err(e) => self.report(&e),
            }
        }
        info!("Loaded {} of {} packages", loaded.len(), packages.len());
        loaded
    }

    /// Enable one module through its owning loader
    pub fn enable_module(&self, module: &LoadedModule) -> Result<bool, ModuleError> {
        module.loader().enable_module(module)
    }

    /// Disable one module through its owning loader
    pub fn disable_module(&self, module: &LoadedModule) -> Result<bool, ModuleError> {
        module.loader().disable_module(module)
    }

    /// Enable all modules in registration order
    pub fn enable_modules(&self) {
        for module in self.modules() {
            if let Err(e) = self.enable_module(&module) {
                self.report(&e);
            }
        }
    }

    /// Disable all modules in reverse registration order
    pub fn disable_modules(&self) {
        for module in self.modules().iter().rev() {
            if let Err(e) = self.disable_module(module) {
                self.report(&e);
            }
        }
    }

    /// Disable, tear down and deregister one module
    pub fn unload_module(&self, name: &str) -> Result<Arc<LoadedModule>, ModuleError> {
        let key = sanitize_name(name);
        let module = self
            .registry
            .lock()
            .remove(&key)
            .ok_or_else(|| ModuleError::NotFound(key.clone()))?;

        if let Err(e) = self.disable_module(&module) {
            self.report(&e);
        }
        module.context().teardown();
        info!("Unloaded module {}", module.descriptor().full_name());
        Ok(module)
    }

    /// Disable everything, tear down every context and empty the registry.
    ///
    /// The registry is emptied in one step before any hook runs; hooks see an
    /// empty manager. Always completes; disable failures go to the error
    /// handler.
    pub fn clear_modules(&self) {
        let cleared = {
            let mut registry = self.registry.lock();
            registry.by_name.clear();
            std::mem::take(&mut registry.ordered)
        };

        for module in cleared.iter().rev() {
            if let Err(e) = module.loader().disable_module(module) {
                self.report(&e);
            }
            module.context().teardown();
        }
        self.factory.shutdown();
        info!("Cleared {} modules", cleared.len());
    }

    /// Look up a module by name; spaces and underscores are interchangeable
    pub fn get_module(&self, name: &str) -> Option<Arc<LoadedModule>> {
        self.registry.lock().by_name.get(&sanitize_name(name)).cloned()
    }

    /// Snapshot of the registered modules in registration order
    pub fn modules(&self) -> Vec<Arc<LoadedModule>> {
        self.registry.lock().ordered.clone()
    }

    pub fn module_count(&self) -> usize {
        self.registry.lock().ordered.len()
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.get_module(name).is_some_and(|module| module.is_enabled())
    }

    /// Whether `module` is the registered instance and is enabled
    pub fn is_module_enabled(&self, module: &LoadedModule) -> bool {
        self.registry.lock().contains(module) && module.is_enabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModuleConfig;
    use crate::module::loader::DEFAULT_DESCRIPTOR_ENTRY;
    use crate::module::traits::{LifecycleHook, Module, ModuleState};
    use crate::module::LoadingContext;
    use std::fs;
    use tempfile::TempDir;

    struct Quiet;

    impl Module for Quiet {}

    struct Grumpy;

    impl Module for Grumpy {
        fn on_disable(&mut self, _context: &LoadingContext) -> anyhow::Result<()> {
            anyhow::bail!("not leaving")
        }
    }

    fn entry_points() -> EntryPoints {
        let mut entry_points = EntryPoints::new();
        entry_points
            .register("quiet.Main", || Ok(Quiet))
            .register("grumpy.Main", || Ok(Grumpy));
        entry_points
    }

    fn package(dir: &Path, folder: &str, name: &str, main: &str) -> PathBuf {
        let root = dir.join(folder);
        fs::create_dir_all(&root).unwrap();
        fs::write(
            root.join(DEFAULT_DESCRIPTOR_ENTRY),
            format!("name={}\nmain={}", name, main),
        )
        .unwrap();
        root
    }

    fn manager(errors: Arc<Mutex<Vec<String>>>) -> ModuleManager {
        let factory = LoaderFactory::with_defaults(Arc::new(entry_points()), &ModuleConfig::default());
        ModuleManager::new(factory, "modules")
            .with_error_handler(move |e| errors.lock().push(e.to_string()))
    }

    #[test]
    fn test_sanitized_lookup() {
        let temp = TempDir::new().unwrap();
        let path = package(temp.path(), "pkg", "My Module", "quiet.Main");
        let manager = manager(Arc::default());

        let module = manager.load_module(&path).unwrap();
        assert_eq!(module.name(), "My_Module");
        assert!(manager.get_module("My Module").is_some());
        assert!(manager.get_module("My_Module").is_some());
        assert_eq!(manager.module_count(), 1);
    }

    #[test]
    fn test_duplicate_rejected() {
        let temp = TempDir::new().unwrap();
        let first = package(temp.path(), "a", "twin", "quiet.Main");
        let second = package(temp.path(), "b", "twin", "quiet.Main");
        let manager = manager(Arc::default());

        manager.load_module(&first).unwrap();
        let err = manager.load_module(&second).unwrap_err();
        assert!(matches!(err, ModuleError::DuplicateModule(ref name) if name == "twin"));
        assert_eq!(manager.module_count(), 1);
        assert_eq!(manager.get_module("twin").unwrap().source(), first.as_path());
    }

    #[test]
    fn test_unclaimed_package() {
        let temp = TempDir::new().unwrap();
        let stray = temp.path().join("notes.txt");
        fs::write(&stray, "hello").unwrap();
        let manager = manager(Arc::default());

        assert!(matches!(
            manager.load_module(&stray),
            Err(ModuleError::Validation { .. })
        ));
    }

    #[test]
    fn test_unload_module() {
        let temp = TempDir::new().unwrap();
        let path = package(temp.path(), "pkg", "leaving", "quiet.Main");
        let manager = manager(Arc::default());

        let module = manager.load_module(&path).unwrap();
        manager.enable_module(&module).unwrap();
        let unloaded = manager.unload_module("leaving").unwrap();

        assert_eq!(unloaded.state(), ModuleState::Disabled);
        assert!(!unloaded.context().is_active());
        assert_eq!(manager.module_count(), 0);
        assert!(!manager.is_module_enabled(&module));
        assert!(matches!(
            manager.unload_module("leaving"),
            Err(ModuleError::NotFound(_))
        ));

        // Name is free again
        manager.load_module(&path).unwrap();
    }

    #[test]
    fn test_clear_completes_despite_failures() {
        let temp = TempDir::new().unwrap();
        package(temp.path(), "1-quiet", "quiet", "quiet.Main");
        package(temp.path(), "2-grumpy", "grumpy", "grumpy.Main");
        let errors: Arc<Mutex<Vec<String>>> = Arc::default();
        let manager = manager(Arc::clone(&errors));

        let loaded = manager.load_modules(temp.path()).unwrap();
        assert_eq!(loaded.len(), 2);
        manager.enable_modules();
        assert!(manager.is_enabled("grumpy"));

        manager.clear_modules();
        assert_eq!(manager.module_count(), 0);
        assert!(loaded.iter().all(|m| m.state() == ModuleState::Disabled));
        assert!(loaded.iter().all(|m| !m.context().is_active()));

        let errors = errors.lock();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains(&LifecycleHook::Disable.to_string()));
    }

    #[test]
    fn test_is_module_enabled_requires_registration() {
        let temp = TempDir::new().unwrap();
        let path = package(temp.path(), "pkg", "solo", "quiet.Main");
        let registered = manager(Arc::default());
        let other = manager(Arc::default());

        let module = registered.load_module(&path).unwrap();
        registered.enable_module(&module).unwrap();
        assert!(registered.is_module_enabled(&module));
        assert!(!other.is_module_enabled(&module));
    }

    #[test]
    fn test_auto_load_creates_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("modules");
        let factory = LoaderFactory::with_defaults(Arc::new(entry_points()), &ModuleConfig::default());
        let manager = ModuleManager::new(factory, &dir);

        assert!(manager.auto_load_modules().unwrap().is_empty());
        assert!(dir.is_dir());
        assert!(manager.load_modules(temp.path().join("absent")).is_err());
    }
}
