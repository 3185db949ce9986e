//! Formatting results and routing them to the host and live clients.

use std::collections::HashMap;
use std::sync::Arc;

use lintweave_engine::LintEngine;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use crate::error::LintweaveError;
use crate::store::ResultStore;

/// Event name of live pushes.
pub const CLIENT_EVENT: &str = "lint-warn";

/// Path a client polls for the current outputs.
pub const PULL_PATH: &str = "/lint.json";

/// Message a failed build ends with.
pub const BUILD_FAILED_MESSAGE: &str = "Linting failed, see above output";

/// Script a host can append to a served page.
///
/// Fetches the current outputs once, then prints every live push.
pub const CLIENT_SNIPPET: &str = r#"
  if (import.meta.hot) {
    fetch("/lint.json")
      .then(r => r.json())
      .then(outputs => {
        for (const output of outputs || []) {
          console.warn(output);
        }
      })
      .catch(e => console.error(e));

    import.meta.hot.on("lint-warn", d => console.warn(d));
  }
"#;

const LIVE_CAPACITY: usize = 64;

/// Receives user-facing warnings and errors.
pub trait HostReporter: Send + Sync {
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Reports through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl HostReporter for TracingReporter {
    fn warn(&self, message: &str) {
        warn!("{}", message);
    }

    fn error(&self, message: &str) {
        error!("{}", message);
    }
}

/// A push to live clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientEvent {
    pub event: String,
    pub data: String,
}

impl ClientEvent {
    pub fn lint_warn(data: impl Into<String>) -> Self {
        Self {
            event: CLIENT_EVENT.to_string(),
            data: data.into(),
        }
    }
}

/// Formats each engine's results and routes non-empty output.
pub struct OutputCoordinator {
    engines: Vec<Arc<dyn LintEngine>>,
    reporter: Arc<dyn HostReporter>,
    live: broadcast::Sender<ClientEvent>,
    last_pushed: HashMap<String, String>,
}

impl OutputCoordinator {
    pub fn new(engines: Vec<Arc<dyn LintEngine>>, reporter: Arc<dyn HostReporter>) -> Self {
        let (live, _) = broadcast::channel(LIVE_CAPACITY);
        Self {
            engines,
            reporter,
            live,
            last_pushed: HashMap::new(),
        }
    }

    pub fn reporter(&self) -> &Arc<dyn HostReporter> {
        &self.reporter
    }

    /// New receiver for live pushes.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.live.subscribe()
    }

    /// Sender side of the live channel, for handing out more receivers.
    pub fn sender(&self) -> broadcast::Sender<ClientEvent> {
        self.live.clone()
    }

    /// Formats `engine`'s current results. Empty results format to `""`.
    ///
    /// A formatter error is reported to the host and treated as no output.
    pub fn refresh(&self, engine: &str, store: &ResultStore) -> Result<String, LintweaveError> {
        let handle = self.engine(engine)?;
        let records = store.records(engine)?;
        Ok(format_records(handle.as_ref(), &records, self.reporter.as_ref()))
    }

    /// Serve mode: pushes `engine`'s output if it is non-empty and differs
    /// from the last push. Returns the pushed event.
    pub fn publish(
        &mut self,
        engine: &str,
        store: &ResultStore,
    ) -> Result<Option<ClientEvent>, LintweaveError> {
        let output = self.refresh(engine, store)?;
        if output.is_empty() {
            self.last_pushed.remove(engine);
            return Ok(None);
        }
        if self.last_pushed.get(engine) == Some(&output) {
            debug!(engine, "Output unchanged, not pushing");
            return Ok(None);
        }

        self.reporter.warn(&output);
        let event = ClientEvent::lint_warn(output.clone());
        // no subscribers is fine; the pull endpoint still has the output
        let _ = self.live.send(event.clone());
        self.last_pushed.insert(engine.to_string(), output);
        Ok(Some(event))
    }

    /// Every engine's current non-empty output, in registration order.
    pub fn pull(&self, store: &ResultStore) -> Vec<String> {
        self.engines
            .iter()
            .filter_map(|engine| {
                let records = store.records(engine.name()).ok()?;
                let output = format_records(engine.as_ref(), &records, self.reporter.as_ref());
                (!output.is_empty()).then_some(output)
            })
            .collect()
    }

    /// [`pull`](Self::pull) rendered as a JSON array of strings.
    pub fn pull_json(&self, store: &ResultStore) -> String {
        render_pull(&self.pull(store))
    }

    fn engine(&self, name: &str) -> Result<&Arc<dyn LintEngine>, LintweaveError> {
        self.engines
            .iter()
            .find(|e| e.name() == name)
            .ok_or_else(|| LintweaveError::UnknownEngine(name.to_string()))
    }
}

/// Formats `records` with `engine`, reporting formatter errors to the host.
pub(crate) fn format_records(
    engine: &dyn LintEngine,
    records: &[serde_json::Value],
    reporter: &dyn HostReporter,
) -> String {
    if records.is_empty() {
        return String::new();
    }
    match engine.format(records) {
        Ok(output) => output,
        Err(e) => {
            reporter.error(&format!("[{}] {}", engine.name(), e));
            String::new()
        }
    }
}

pub(crate) fn render_pull(outputs: &[String]) -> String {
    serde_json::to_string(outputs).unwrap_or_else(|_| "[]".to_string())
}

/// Result of one build pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutcome {
    /// Non-empty outputs as `(engine, output)`, in registration order.
    pub outputs: Vec<(String, String)>,
    /// Engines that failed as `(engine, message)`, in registration order.
    pub failures: Vec<(String, String)>,
}

impl BuildOutcome {
    pub fn is_clean(&self) -> bool {
        self.outputs.is_empty() && self.failures.is_empty()
    }

    /// Reports every output as a warning and every failure as an error,
    /// then one final error if anything was reported.
    pub fn report(&self, reporter: &dyn HostReporter) -> Result<(), LintweaveError> {
        for (_, output) in &self.outputs {
            reporter.warn(output);
        }
        for (engine, message) in &self.failures {
            reporter.error(&format!("[{}] {}", engine, message));
        }

        if self.is_clean() {
            return Ok(());
        }
        reporter.error(BUILD_FAILED_MESSAGE);
        Err(LintweaveError::LintingFailed)
    }
}
