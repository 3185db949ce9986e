//! Lint command implementation

use std::path::Path;

use miette::{IntoDiagnostic, Result};
use tracing::info;

use lintweave_core::{LintweaveError, TracingReporter, lint_folder};

use crate::cli::Cli;
use crate::utils::{build_registry, create_tokio_runtime, load_config, resolve_dir};

/// Returns true when anything was found or an engine failed.
pub fn run_lint(cli: &Cli, dir: &Path, engines: &[String]) -> Result<bool> {
    let dir = resolve_dir(dir)?;
    let config = load_config(cli, &dir)?;
    let registry = build_registry(&config, engines)?;

    if registry.is_empty() {
        info!("No engines configured, nothing to do");
        return Ok(false);
    }

    let outcome = create_tokio_runtime()?
        .block_on(lint_folder(&dir, &registry, &config))
        .into_diagnostic()?;

    match outcome.report(&TracingReporter) {
        Ok(()) => {
            info!("No problems found");
            Ok(false)
        }
        Err(LintweaveError::LintingFailed) => Ok(true),
        Err(e) => Err(e).into_diagnostic(),
    }
}
