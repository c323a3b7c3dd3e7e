//! Shared fixture for module system integration tests
//!
//! Builds archive and directory packages in a temporary modules directory and
//! provides test modules that record every hook they run.

#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use modhost::config::ModuleConfig;
use modhost::module::{
    EntryPoints, LifecycleHook, LoaderFactory, LoadingContext, Module, ModuleError, ModuleManager,
    Symbol,
};
use parking_lot::Mutex;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub type Journal = Arc<Mutex<Vec<String>>>;

/// Resource listing `key=value` symbols a module defines during `on_load`
pub const EXPORTS_ENTRY: &str = "exports.txt";
/// Resource listing symbol names a module resolves during `on_enable`
pub const IMPORTS_ENTRY: &str = "imports.txt";

/// Test module driven entirely by its package contents
///
/// Every hook appends `"<module>:<hook>"` to the journal. Resolutions made
/// during `on_enable` append `"<module> saw <key>=<value>"` or
/// `"<module> missing <key>"`.
pub struct TestModule {
    journal: Journal,
    fail: Option<LifecycleHook>,
}

impl TestModule {
    fn record(&self, context: &LoadingContext, hook: LifecycleHook) -> anyhow::Result<()> {
        self.journal
            .lock()
            .push(format!("{}:{}", context.descriptor().name(), hook));
        if self.fail == Some(hook) {
            anyhow::bail!("{} deliberately failed", hook);
        }
        Ok(())
    }

    fn resource_lines(context: &LoadingContext, entry: &str) -> Vec<String> {
        context
            .lookup_local(entry)
            .and_then(|symbol| symbol.as_resource().map(|bytes| bytes.to_vec()))
            .map(|bytes| {
                String::from_utf8_lossy(&bytes)
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Module for TestModule {
    fn on_load(&mut self, context: &LoadingContext) -> anyhow::Result<()> {
        for line in Self::resource_lines(context, EXPORTS_ENTRY) {
            if let Some((key, value)) = line.split_once('=') {
                context.define_local(key.trim(), Symbol::value(value.trim().to_string()));
            }
        }
        self.record(context, LifecycleHook::Load)
    }

    fn on_enable(&mut self, context: &LoadingContext) -> anyhow::Result<()> {
        let name = context.descriptor().name().to_string();
        for key in Self::resource_lines(context, IMPORTS_ENTRY) {
            let line = match context.resolve(&key) {
                Ok(symbol) => match symbol.downcast::<String>() {
                    Some(value) => format!("{} saw {}={}", name, key, value),
                    None => format!("{} saw {} ({})", name, key, symbol.kind()),
                },
                Err(_) => format!("{} missing {}", name, key),
            };
            self.journal.lock().push(line);
        }
        self.record(context, LifecycleHook::Enable)
    }

    fn on_disable(&mut self, context: &LoadingContext) -> anyhow::Result<()> {
        self.record(context, LifecycleHook::Disable)
    }
}

/// Test fixture for module system tests
pub struct ModuleTestFixture {
    /// Temporary directory for test data
    pub temp_dir: TempDir,
    /// Directory packages are written to
    pub modules_dir: PathBuf,
    pub journal: Journal,
    pub errors: Arc<Mutex<Vec<String>>>,
}

impl ModuleTestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let modules_dir = temp_dir.path().join("modules");
        fs::create_dir_all(&modules_dir).unwrap();
        Self {
            temp_dir,
            modules_dir,
            journal: Arc::default(),
            errors: Arc::default(),
        }
    }

    /// Entry points: `test.Module`, plus `test.FailOnLoad`, `test.FailOnEnable`
    /// and `test.FailOnDisable`
    pub fn entry_points(&self) -> EntryPoints {
        let mut entry_points = EntryPoints::new();
        for (id, fail) in [
            ("test.Module", None),
            ("test.FailOnLoad", Some(LifecycleHook::Load)),
            ("test.FailOnEnable", Some(LifecycleHook::Enable)),
            ("test.FailOnDisable", Some(LifecycleHook::Disable)),
        ] {
            let journal = Arc::clone(&self.journal);
            entry_points.register(id, move || {
                Ok(TestModule {
                    journal: Arc::clone(&journal),
                    fail,
                })
            });
        }
        entry_points
    }

    /// Manager over the default loader chain that collects reported errors
    pub fn manager(&self) -> ModuleManager {
        self.manager_with_config(&ModuleConfig::default())
    }

    pub fn manager_with_config(&self, config: &ModuleConfig) -> ModuleManager {
        self.manager_from(self.entry_points(), config)
    }

    /// Manager over caller-supplied entry points
    pub fn manager_from(&self, entry_points: EntryPoints, config: &ModuleConfig) -> ModuleManager {
        let factory = LoaderFactory::with_defaults(Arc::new(entry_points), config);
        let errors = Arc::clone(&self.errors);
        ModuleManager::new(factory, &self.modules_dir)
            .with_error_handler(move |e: &ModuleError| errors.lock().push(e.to_string()))
    }

    /// Write a zip package `file_name` holding `module.properties` and `resources`
    pub fn archive_package(
        &self,
        file_name: &str,
        descriptor: &str,
        resources: &[(&str, &str)],
    ) -> PathBuf {
        let path = self.modules_dir.join(file_name);
        write_archive(
            &path,
            std::iter::once(("module.properties", descriptor)).chain(resources.iter().copied()),
        );
        path
    }

    /// Write an exploded directory package
    pub fn directory_package(
        &self,
        dir_name: &str,
        descriptor: &str,
        resources: &[(&str, &str)],
    ) -> PathBuf {
        let root = self.modules_dir.join(dir_name);
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("module.properties"), descriptor).unwrap();
        for (name, contents) in resources {
            let path = root.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, contents).unwrap();
        }
        root
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().clone()
    }

    /// Journal lines produced by one hook, in order
    pub fn hook_calls(&self, hook: LifecycleHook) -> Vec<String> {
        let suffix = format!(":{}", hook);
        self.journal()
            .into_iter()
            .filter_map(|line| line.strip_suffix(&suffix).map(str::to_string))
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }
}

/// Descriptor text for a module called `name` built by `main`
pub fn descriptor(name: &str, main: &str) -> String {
    format!("name={}\nmain={}\n", name, main)
}

pub fn write_archive<'a>(path: &Path, entries: impl IntoIterator<Item = (&'a str, &'a str)>) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    for (name, contents) in entries {
        writer.start_file(name, SimpleFileOptions::default()).unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}
