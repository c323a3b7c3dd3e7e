//! Module discovery
//!
//! Scans a modules directory and lists the candidate packages in it.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::module::traits::ModuleError;

/// Module package scanner
pub struct PackageDiscovery {
    /// Base directory to scan for packages
    modules_dir: PathBuf,
    /// Create the directory instead of failing when it does not exist
    create_missing: bool,
}

impl PackageDiscovery {
    pub fn new<P: AsRef<Path>>(modules_dir: P) -> Self {
        Self {
            modules_dir: modules_dir.as_ref().to_path_buf(),
            create_missing: false,
        }
    }

    /// Create a missing modules directory (and report no packages) on scan
    pub fn create_missing(mut self, create: bool) -> Self {
        self.create_missing = create;
        self
    }

    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }

    /// Immediate entries of the modules directory, sorted by file name.
    ///
    /// Entries are not filtered here; a loader decides whether each one is a
    /// package it understands.
    pub fn discover(&self) -> Result<Vec<PathBuf>, ModuleError> {
        info!("Discovering modules in {:?}", self.modules_dir);

        if !self.modules_dir.exists() && self.create_missing {
            debug!("Modules directory does not exist, creating: {:?}", self.modules_dir);
            fs::create_dir_all(&self.modules_dir).map_err(|e| {
                ModuleError::validation(
                    &self.modules_dir,
                    format!("failed to create modules directory: {}", e),
                )
            })?;
            return Ok(Vec::new());
        }

        if !self.modules_dir.is_dir() {
            return Err(ModuleError::validation(
                &self.modules_dir,
                "modules directory is not a directory",
            ));
        }

        let entries = fs::read_dir(&self.modules_dir).map_err(|e| {
            ModuleError::validation(
                &self.modules_dir,
                format!("failed to read modules directory: {}", e),
            )
        })?;

        let mut packages = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                ModuleError::validation(
                    &self.modules_dir,
                    format!("failed to read directory entry: {}", e),
                )
            })?;
            packages.push(entry.path());
        }
        packages.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        debug!("Found {} candidate packages", packages.len());
        Ok(packages)
    }
}
