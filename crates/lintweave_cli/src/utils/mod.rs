//! CLI utility functions

use std::path::{Path, PathBuf};

use miette::{IntoDiagnostic, Result};
use tokio::runtime::Runtime;
use tracing::info;

use lintweave_core::{EngineRegistry, LintweaveConfig};

use crate::cli::Cli;

pub fn create_tokio_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .into_diagnostic()
}

/// Resolves `dir` to an absolute folder.
pub fn resolve_dir(dir: &Path) -> Result<PathBuf> {
    let dir = dir.canonicalize().into_diagnostic()?;
    if !dir.is_dir() {
        return Err(miette::miette!("{} is not a directory", dir.display()));
    }
    Ok(dir)
}

/// Loads `--config` if given, otherwise the config discovered in `dir`.
pub fn load_config(cli: &Cli, dir: &Path) -> Result<LintweaveConfig> {
    if let Some(path) = &cli.config {
        info!("Using config: {}", path.display());
        return LintweaveConfig::from_file(path).into_diagnostic();
    }

    match LintweaveConfig::discover(dir) {
        Some(path) => {
            info!("Using config: {}", path.display());
            LintweaveConfig::from_file(&path).into_diagnostic()
        }
        None => {
            info!("No config file found, using defaults");
            LintweaveConfig::load(dir).into_diagnostic()
        }
    }
}

/// Engines from `config`, narrowed to `only` when non-empty.
pub fn build_registry(config: &LintweaveConfig, only: &[String]) -> Result<EngineRegistry> {
    let registry = EngineRegistry::from_config(config).into_diagnostic()?;
    if only.is_empty() {
        return Ok(registry);
    }
    registry.select(only).into_diagnostic()
}
