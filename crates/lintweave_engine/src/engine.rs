//! The lint engine contract.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::error::EngineError;
use crate::file_key::FileKey;
use crate::payload::Payload;

/// Per-file results reported by an engine, keyed by file path.
///
/// A file in the analysed batch that is missing from the report is clean.
pub type Report = BTreeMap<String, Payload>;

/// Operating mode of an orchestration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One-shot build: one request/response per engine.
    Build,
    /// Live development loop: engines report incrementally.
    Serve,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Build => f.write_str("build"),
            Mode::Serve => f.write_str("serve"),
        }
    }
}

/// What a worker hands to its engine at startup.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub mode: Mode,
    pub engine: String,
    pub working_directory: PathBuf,
}

/// Callback an engine uses to report serve-mode results.
///
/// Cloneable and `Send`, so an engine may keep it and report from its own
/// analysis loop long after `lint_serve` returned.
#[derive(Clone)]
pub struct ResultSink {
    emit: Arc<dyn Fn(&mut Report) + Send + Sync>,
}

impl ResultSink {
    pub fn new(emit: impl Fn(&mut Report) + Send + Sync + 'static) -> Self {
        Self {
            emit: Arc::new(emit),
        }
    }

    /// Reports a result. `None` means the engine has nothing to say and is ignored.
    ///
    /// The report is borrowed: it may be mutated in transit but is handed back
    /// unchanged.
    pub fn emit(&self, report: Option<&mut Report>) {
        match report {
            Some(report) => (self.emit)(report),
            None => trace!("Engine emitted an empty result"),
        }
    }
}

impl fmt::Debug for ResultSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSink").finish_non_exhaustive()
    }
}

/// A pluggable static-analysis capability.
///
/// Engines run on their own worker thread and are shared with the
/// coordinator for formatting, hence `Send + Sync`. Stateful engines use
/// interior mutability.
pub trait LintEngine: Send + Sync + 'static {
    /// Unique name of the engine.
    fn name(&self) -> &str;

    /// Called once on the worker before any batch is processed.
    ///
    /// An error here aborts the whole session.
    fn prepare(&self, _ctx: &WorkerContext) -> Result<(), EngineError> {
        Ok(())
    }

    /// Formats records for display. Records arrive in stable file order.
    fn format(&self, records: &[Value]) -> Result<String, EngineError>;

    /// Analyses `files` once and returns every finding.
    fn lint_build(&self, files: &[FileKey]) -> Result<Vec<Payload>, EngineError>;

    /// Starts or updates continuous analysis of `files`.
    ///
    /// Results are reported through `sink`, zero or more times, possibly
    /// after this call returns.
    fn lint_serve(&self, files: &[FileKey], sink: ResultSink) -> Result<(), EngineError>;
}
