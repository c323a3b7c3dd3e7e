//! Configuration management for modhost
//!
//! Handles configuration loading (TOML or JSON), environment overrides, and
//! validation.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::module::loader::package::{PackageFormat, DEFAULT_DESCRIPTOR_ENTRY};
use crate::utils::env_opt;

/// Environment variable overriding `modules.modules_dir`
pub const MODULES_DIR_ENV: &str = "MODHOST_MODULES_DIR";

/// Module system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Directory containing module packages
    #[serde(default = "default_modules_dir")]
    pub modules_dir: String,

    /// Name of the descriptor entry inside each package
    #[serde(default = "default_descriptor_entry")]
    pub descriptor_entry: String,

    /// Loader chain, in precedence order
    #[serde(default = "default_loaders")]
    pub loaders: Vec<PackageFormat>,
}

fn default_modules_dir() -> String {
    "modules".to_string()
}

fn default_descriptor_entry() -> String {
    DEFAULT_DESCRIPTOR_ENTRY.to_string()
}

fn default_loaders() -> Vec<PackageFormat> {
    vec![PackageFormat::Archive, PackageFormat::Directory]
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            modules_dir: default_modules_dir(),
            descriptor_entry: default_descriptor_entry(),
            loaders: default_loaders(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter (e.g. "info", "modhost::module=debug"); RUST_LOG wins
    #[serde(default)]
    pub filter: Option<String>,

    /// Emit JSON lines (requires the `json-logging` feature)
    #[serde(default)]
    pub json_format: bool,
}

/// Host configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub modules: ModuleConfig,

    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

impl HostConfig {
    /// Load configuration from TOML file
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: HostConfig = toml::from_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: HostConfig = serde_json::from_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Pick the parser from the file extension (`.json`, otherwise TOML)
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// Save configuration to TOML file
    pub fn to_toml_file(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(dir) = env_opt(MODULES_DIR_ENV).filter(|dir| !dir.trim().is_empty()) {
            self.modules.modules_dir = dir;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let modules = &self.modules;
        anyhow::ensure!(
            !modules.descriptor_entry.trim().is_empty(),
            "modules.descriptor_entry must not be empty"
        );
        anyhow::ensure!(
            !modules.loaders.is_empty(),
            "modules.loaders must name at least one package format"
        );
        for (index, format) in modules.loaders.iter().enumerate() {
            if modules.loaders[..index].contains(format) {
                anyhow::bail!("modules.loaders lists `{}` more than once", format.as_str());
            }
        }
        Ok(())
    }
}
