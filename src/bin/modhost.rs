//! Command-line harness for inspecting and test-loading module directories.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use modhost::config::HostConfig;
use modhost::module::{EntryPoints, LoaderFactory, ModuleDescriptor, ModuleManager, PackageDiscovery};
use modhost::utils::init_logging_from_config;
use serde::Serialize;
use tracing::info;

/// Inspect and load module packages.
#[derive(Parser, Debug)]
#[command(name = "modhost")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML, or JSON with a `.json` extension).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every entry of a modules directory with its loader and descriptor.
    Inspect {
        /// Directory to scan (defaults to the configured modules directory).
        dir: Option<PathBuf>,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Load, enable and clear every package, reporting each failure.
    Load {
        /// Directory to scan (defaults to the configured modules directory).
        dir: Option<PathBuf>,
    },
}

/// One line of the `inspect` report
#[derive(Debug, Serialize)]
struct PackageReport {
    path: PathBuf,
    loader: Option<String>,
    descriptor: Option<ModuleDescriptor>,
    error: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => HostConfig::from_file(path)?,
        None => {
            let mut config = HostConfig::default();
            config.apply_env_overrides();
            config
        }
    };
    init_logging_from_config(config.logging.as_ref());

    match args.command {
        Command::Inspect { dir, json } => {
            let dir = dir.unwrap_or_else(|| PathBuf::from(&config.modules.modules_dir));
            inspect(&config, &dir, json)
        }
        Command::Load { dir } => {
            let dir = dir.unwrap_or_else(|| PathBuf::from(&config.modules.modules_dir));
            load(&config, &dir)
        }
    }
}

fn inspect(config: &HostConfig, dir: &Path, json: bool) -> Result<()> {
    let factory = LoaderFactory::with_defaults(Arc::new(EntryPoints::new()), &config.modules);
    let reports: Vec<PackageReport> = PackageDiscovery::new(dir)
        .discover()?
        .into_iter()
        .map(|path| match factory.validate(&path) {
            None => PackageReport {
                path,
                loader: None,
                descriptor: None,
                error: Some("no loader accepts this entry".to_string()),
            },
            Some(loader) => {
                let (descriptor, error) = match loader.describe(&path) {
                    Ok(descriptor) => (Some(descriptor), None),
                    Err(e) => (None, Some(e.to_string())),
                };
                PackageReport {
                    path,
                    loader: Some(loader.name().to_string()),
                    descriptor,
                    error,
                }
            }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    for report in &reports {
        let loader = report.loader.as_deref().unwrap_or("-");
        match (&report.descriptor, &report.error) {
            (Some(descriptor), _) => {
                println!(
                    "{}  [{}]  {}  main={}",
                    report.path.display(),
                    loader,
                    descriptor.full_name(),
                    descriptor.entry_point()
                );
                if !descriptor.authors().is_empty() {
                    println!("    authors: {}", descriptor.authors().join(", "));
                }
            }
            (None, Some(error)) => println!("{}  [{}]  error: {}", report.path.display(), loader, error),
            (None, None) => println!("{}  [{}]", report.path.display(), loader),
        }
    }
    Ok(())
}

fn load(config: &HostConfig, dir: &Path) -> Result<()> {
    let manager = ModuleManager::from_config(config, EntryPoints::new())
        .with_error_handler(|e| eprintln!("error: {}", e));

    let loaded = manager.load_modules(dir)?;
    info!("Loaded {} modules from {:?}", loaded.len(), dir);
    manager.enable_modules();
    for module in manager.modules() {
        println!("{}  {}", module.descriptor().full_name(), module.state());
    }
    manager.clear_modules();
    Ok(())
}
