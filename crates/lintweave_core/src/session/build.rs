//! One-shot build sessions.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use lintweave_engine::{FileKey, LintEngine, Mode};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::SessionSettings;
use crate::config::{InclusionMode, LintweaveConfig};
use crate::debounce::PendingBatch;
use crate::error::LintweaveError;
use crate::output::{BuildOutcome, HostReporter, TracingReporter, format_records};
use crate::registry::EngineRegistry;
use crate::scanner::Scanner;
use crate::worker::{Batch, PoolOptions, WorkerEvent, WorkerPool};

/// Collects the files of a build, then lints them once at finalization.
pub struct BuildSession {
    engines: Vec<Arc<dyn LintEngine>>,
    settings: SessionSettings,
    reporter: Arc<dyn HostReporter>,
    touched: PendingBatch<FileKey>,
}

impl BuildSession {
    pub fn new(
        registry: &EngineRegistry,
        settings: SessionSettings,
        reporter: Arc<dyn HostReporter>,
    ) -> Self {
        Self {
            engines: registry.engines().to_vec(),
            settings,
            reporter,
            touched: PendingBatch::default(),
        }
    }

    /// Host notification that `path` went through the build pipeline.
    ///
    /// Only recorded in ProcessedOnly mode, and only when in scope.
    pub fn touched(&mut self, path: &Path) {
        if !self.settings.enabled || self.settings.include_mode != InclusionMode::ProcessedOnly {
            return;
        }
        let key = FileKey::normalize(path, &self.settings.root);
        if self.settings.filter.matches(&key) {
            self.touched.push(key);
        }
    }

    /// Files the build will lint, in the order they will be sent.
    pub fn files(&self) -> Vec<FileKey> {
        match self.settings.include_mode {
            InclusionMode::ProcessedOnly => self.touched.items().to_vec(),
            InclusionMode::WholeFolder => Scanner::new(&self.settings.root)
                .scan_root(|key| self.settings.filter.matches(key)),
        }
    }

    /// Build finalization: lints, then reports every output as a warning and
    /// ends with one error if anything was found.
    ///
    /// Returns `LintweaveError::LintingFailed` in that case. A disabled build
    /// does nothing.
    pub async fn finish(self) -> Result<(), LintweaveError> {
        if !self.settings.enabled {
            debug!("Build linting disabled");
            return Ok(());
        }

        let reporter = Arc::clone(&self.reporter);
        let outcome = self.run().await?;
        outcome.report(reporter.as_ref())
    }

    /// Lints without reporting.
    pub async fn run(mut self) -> Result<BuildOutcome, LintweaveError> {
        let files: Batch = match self.settings.include_mode {
            InclusionMode::ProcessedOnly => self.touched.drain().into(),
            InclusionMode::WholeFolder => self.files().into(),
        };
        info!(files = files.len(), engines = self.engines.len(), "Linting build");

        let options = PoolOptions::new(Mode::Build, self.settings.root.clone())
            .with_envelope(self.settings.envelope);
        run_build_pass(&self.engines, files, options, self.reporter.as_ref()).await
    }
}

/// Runs every engine once over `files` on its own worker and collects the
/// formatted, non-empty outputs in registration order.
pub async fn run_build_pass(
    engines: &[Arc<dyn LintEngine>],
    files: Batch,
    options: PoolOptions,
    reporter: &dyn HostReporter,
) -> Result<BuildOutcome, LintweaveError> {
    if engines.is_empty() {
        return Ok(BuildOutcome::default());
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let spawn_engines = engines.to_vec();
    let pool = tokio::task::spawn_blocking(move || WorkerPool::spawn(&spawn_engines, options, tx))
        .await
        .map_err(|e| LintweaveError::internal(format!("worker pool startup panicked: {}", e)))??;

    pool.dispatch(files);

    let mut records: HashMap<String, Vec<Value>> = HashMap::new();
    let mut failures: HashMap<String, String> = HashMap::new();
    let mut remaining = pool.len();
    while remaining > 0 {
        match rx.recv().await {
            Some(WorkerEvent::Built { engine, records: r }) => {
                records.insert(engine, r);
                remaining -= 1;
            }
            Some(WorkerEvent::Failed { engine, message }) => {
                failures.insert(engine, message);
                remaining -= 1;
            }
            Some(WorkerEvent::Reported { engine, .. }) => {
                warn!(engine = %engine, "Ignoring incremental report during build");
            }
            None => break,
        }
    }

    // build workers exit after their one answer
    tokio::task::spawn_blocking(move || pool.join())
        .await
        .map_err(|e| LintweaveError::internal(format!("worker shutdown panicked: {}", e)))?;

    let mut outcome = BuildOutcome::default();
    for engine in engines {
        let name = engine.name();
        if let Some(message) = failures.remove(name) {
            outcome.failures.push((name.to_string(), message));
            continue;
        }
        let Some(records) = records.remove(name) else {
            outcome
                .failures
                .push((name.to_string(), "worker exited without a result".to_string()));
            continue;
        };

        let output = format_records(engine.as_ref(), &records, reporter);
        if !output.is_empty() {
            outcome.outputs.push((name.to_string(), output));
        }
    }

    Ok(outcome)
}

/// Lints every in-scope file under `folder` once, outside any host build.
///
/// Returns the outputs instead of reporting them.
pub async fn lint_folder(
    folder: &Path,
    registry: &EngineRegistry,
    config: &LintweaveConfig,
) -> Result<BuildOutcome, LintweaveError> {
    let settings = SessionSettings::from_config(config, folder, Mode::Build)?
        .with_include_mode(InclusionMode::WholeFolder);
    let files: Batch = Scanner::new(folder)
        .scan_root(|key| settings.filter.matches(key))
        .into();
    info!(folder = %folder.display(), files = files.len(), "Linting folder");

    let options =
        PoolOptions::new(Mode::Build, folder.to_path_buf()).with_envelope(settings.envelope);
    run_build_pass(registry.engines(), files, options, &TracingReporter).await
}
