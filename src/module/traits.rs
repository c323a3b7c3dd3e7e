//! Module system traits and interfaces
//!
//! Defines the capability every module implements, the lifecycle state
//! machine, and the error taxonomy shared by loaders and the manager.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::module::loader::context::LoadingContext;

/// Module lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleState {
    /// Instantiated and `on_load` has run
    Loaded,
    /// `on_enable` completed successfully
    Enabled,
    /// `on_disable` has run and the loading context is torn down
    Disabled,
}

impl ModuleState {
    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// Transitions outside this table are treated as no-ops by loaders.
    pub fn can_transition_to(self, next: ModuleState) -> bool {
        matches!(
            (self, next),
            (ModuleState::Loaded, ModuleState::Enabled)
                | (ModuleState::Disabled, ModuleState::Enabled)
                | (ModuleState::Enabled, ModuleState::Disabled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModuleState::Loaded => "loaded",
            ModuleState::Enabled => "enabled",
            ModuleState::Disabled => "disabled",
        }
    }
}

impl std::fmt::Display for ModuleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Module trait that all modules must implement
///
/// Hooks run synchronously on the caller's thread. The loading context
/// passed to every hook is the module's own namespace: it exposes the
/// module's descriptor, lets the module define symbols for other modules,
/// and resolves symbols those modules defined.
pub trait Module: Send {
    /// Called once after instantiation, before the module becomes visible to
    /// other modules' symbol lookups.
    fn on_load(&mut self, _context: &LoadingContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called on every `Loaded`/`Disabled` → `Enabled` transition.
    fn on_enable(&mut self, _context: &LoadingContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called on every `Enabled` → `Disabled` transition, before teardown.
    fn on_disable(&mut self, _context: &LoadingContext) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Lifecycle hook names, used in error reports and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleHook {
    Load,
    Enable,
    Disable,
}

impl std::fmt::Display for LifecycleHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LifecycleHook::Load => "on_load",
            LifecycleHook::Enable => "on_enable",
            LifecycleHook::Disable => "on_disable",
        })
    }
}

/// Descriptor parsing errors
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("descriptor source is unreadable: {0}")]
    Unreadable(String),

    #[error("descriptor is missing required field `{0}`")]
    MissingField(&'static str),
}

impl From<std::io::Error> for DescriptorError {
    fn from(e: std::io::Error) -> Self {
        DescriptorError::Unreadable(e.to_string())
    }
}

/// Module system errors
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("invalid module descriptor: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("invalid module package {path:?}: {reason}")]
    Validation { path: PathBuf, reason: String },

    #[error("cannot instantiate entry point `{entry_point}` of module {module}: {reason}")]
    Instantiation {
        module: String,
        entry_point: String,
        reason: String,
    },

    #[error("unresolved symbol: {0}")]
    SymbolResolution(String),

    #[error("{hook} failed for module {module}: {reason}")]
    Hook {
        module: String,
        hook: LifecycleHook,
        reason: String,
    },

    #[error("module {0} is already registered")]
    DuplicateModule(String),

    #[error("module not found: {0}")]
    NotFound(String),

    #[error("module {module} is owned by loader `{owner}`, not `{loader}`")]
    ForeignModule {
        module: String,
        owner: String,
        loader: String,
    },
}

impl ModuleError {
    pub(crate) fn validation(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ModuleError::Validation {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn hook(module: &str, hook: LifecycleHook, error: anyhow::Error) -> Self {
        ModuleError::Hook {
            module: module.to_string(),
            hook,
            reason: format!("{:#}", error),
        }
    }
}
