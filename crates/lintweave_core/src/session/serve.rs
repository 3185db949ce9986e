//! Long-lived serve sessions.
//!
//! All mutable state (candidates, result store, last pushes) lives in one
//! actor task. Host notifications, settled watcher batches and worker events
//! are all turned into messages for it, so nothing is shared between
//! threads and every update to the store happens in arrival order.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant as StdInstant;

use lintweave_engine::{FileKey, Mode};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::SessionSettings;
use crate::config::InclusionMode;
use crate::debounce::Debouncer;
use crate::error::LintweaveError;
use crate::output::{ClientEvent, HostReporter, OutputCoordinator, render_pull};
use crate::reconcile::{CandidateSet, Reconciler};
use crate::registry::EngineRegistry;
use crate::store::ResultStore;
use crate::watch::ChangeSource;
use crate::worker::{PoolOptions, WorkerEvent, WorkerPool, report_keys};

enum Command {
    Touched(Vec<PathBuf>),
    Settled(Vec<PathBuf>),
    Pull(oneshot::Sender<Vec<String>>),
    FlushTouched(oneshot::Sender<usize>),
    Shutdown(oneshot::Sender<()>),
}

/// The serve-mode coordinator.
pub struct ServeSession {
    root: PathBuf,
    reconciler: Reconciler,
    candidates: CandidateSet,
    store: ResultStore,
    output: OutputCoordinator,
    touches: Debouncer<FileKey>,
    pool: Option<WorkerPool>,
    events: mpsc::UnboundedReceiver<WorkerEvent>,
    cancel: CancellationToken,
}

impl ServeSession {
    /// Prepares every engine, then starts the session task.
    ///
    /// In WholeFolder mode the initial scan is dispatched right away. Fails
    /// with `EngineInit` if any engine cannot be prepared.
    pub async fn start(
        registry: &EngineRegistry,
        settings: SessionSettings,
        reporter: Arc<dyn HostReporter>,
    ) -> Result<ServeHandle, LintweaveError> {
        let engines = if settings.enabled {
            registry.engines().to_vec()
        } else {
            debug!("Serve linting disabled");
            Vec::new()
        };

        let (event_tx, events) = mpsc::unbounded_channel();
        let pool = if engines.is_empty() {
            None
        } else {
            let options = PoolOptions::new(Mode::Serve, settings.root.clone())
                .with_envelope(settings.envelope);
            let spawn_engines = engines.clone();
            let pool = tokio::task::spawn_blocking(move || {
                WorkerPool::spawn(&spawn_engines, options, event_tx)
            })
            .await
            .map_err(|e| LintweaveError::internal(format!("worker pool startup panicked: {}", e)))??;
            Some(pool)
        };

        let reconciler = Reconciler::new(
            settings.root.clone(),
            Arc::clone(&settings.filter),
            settings.include_mode,
        );
        let candidates = match settings.include_mode {
            InclusionMode::WholeFolder => reconciler.initial_candidates(),
            InclusionMode::ProcessedOnly => CandidateSet::new(),
        };

        let store = ResultStore::new(engines.iter().map(|e| e.name().to_string()));
        let output = OutputCoordinator::new(engines, reporter);
        let live = output.sender();
        let cancel = CancellationToken::new();

        let session = Self {
            root: settings.root,
            reconciler,
            candidates,
            store,
            output,
            touches: Debouncer::new(settings.touch_debounce),
            pool,
            events,
            cancel: cancel.clone(),
        };

        info!(
            root = %session.root.display(),
            mode = ?session.reconciler.mode(),
            candidates = session.candidates.len(),
            "Serve session started"
        );

        let (commands, rx) = mpsc::unbounded_channel();
        tokio::spawn(session.run(rx));

        Ok(ServeHandle {
            commands,
            live,
            cancel,
        })
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        if self.reconciler.mode() == InclusionMode::WholeFolder {
            self.dispatch_candidates();
        }

        loop {
            let deadline = self.touches.deadline();
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                command = commands.recv() => match command {
                    Some(Command::Shutdown(reply)) => {
                        self.stop();
                        let _ = reply.send(());
                        return;
                    }
                    Some(command) => self.handle(command),
                    None => break,
                },

                Some(event) = self.events.recv() => self.on_event(event),

                _ = settle(deadline) => {
                    if let Some(files) = self.touches.poll(Instant::now().into_std()) {
                        self.dispatch(files);
                    }
                }
            }
        }

        self.stop();
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Touched(paths) => self.on_touched(paths),
            Command::Settled(paths) => self.on_settled(paths),
            Command::Pull(reply) => {
                let _ = reply.send(self.output.pull(&self.store));
            }
            Command::FlushTouched(reply) => {
                let files = self.touches.take();
                let count = files.len();
                self.dispatch(files);
                let _ = reply.send(count);
            }
            Command::Shutdown(_) => {}
        }
    }

    /// Host "touched" notifications. Only ProcessedOnly lints what the host
    /// processed; WholeFolder is driven by the watcher alone.
    fn on_touched(&mut self, paths: Vec<PathBuf>) {
        if self.reconciler.mode() != InclusionMode::ProcessedOnly {
            return;
        }
        let now = Instant::now().into_std();
        for key in self
            .reconciler
            .touched(paths.iter().map(PathBuf::as_path))
        {
            self.touches.push(key, now);
        }
    }

    fn on_settled(&mut self, paths: Vec<PathBuf>) {
        let outcome = self
            .reconciler
            .reconcile(&paths, &mut self.candidates, &mut self.store);

        for engine in &outcome.evicted {
            self.publish(engine);
        }
        if outcome.dispatch {
            self.dispatch_candidates();
        }
    }

    fn on_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Reported {
                engine,
                batch,
                report,
            } => {
                let results = report_keys(report, &self.root);
                match self.store.apply(&engine, &batch, results) {
                    Ok(true) => self.publish(&engine),
                    Ok(false) => trace!(engine = %engine, "Report changed nothing"),
                    Err(e) => warn!(engine = %engine, "Dropping report: {}", e),
                }
            }
            WorkerEvent::Failed { engine, message } => {
                self.output
                    .reporter()
                    .error(&format!("[{}] {}", engine, message));
            }
            WorkerEvent::Built { engine, .. } => {
                warn!(engine = %engine, "Ignoring build result in serve mode");
            }
        }
    }

    fn publish(&mut self, engine: &str) {
        match self.output.publish(engine, &self.store) {
            Ok(Some(_)) => debug!(engine, "Pushed new output"),
            Ok(None) => {}
            Err(e) => warn!(engine, "Failed to publish output: {}", e),
        }
    }

    fn dispatch_candidates(&self) {
        if self.candidates.is_empty() {
            return;
        }
        if let Some(pool) = &self.pool {
            pool.dispatch(self.candidates.to_batch());
        }
    }

    fn dispatch(&self, files: Vec<FileKey>) {
        if files.is_empty() {
            return;
        }
        if let Some(pool) = &self.pool {
            pool.dispatch(files.into());
        }
    }

    fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(mut pool) = self.pool.take() {
            pool.shutdown();
        }
        debug!("Serve session stopped");
    }
}

async fn settle(deadline: Option<StdInstant>) {
    match deadline {
        Some(deadline) => sleep_until(Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

/// Cheap, cloneable handle to a running serve session.
#[derive(Clone)]
pub struct ServeHandle {
    commands: mpsc::UnboundedSender<Command>,
    live: broadcast::Sender<ClientEvent>,
    cancel: CancellationToken,
}

impl ServeHandle {
    /// Host notification that `paths` went through the pipeline.
    ///
    /// Debounced with the touch quiet window before being linted.
    pub fn touched<I>(&self, paths: I) -> Result<(), LintweaveError>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.send(Command::Touched(paths.into_iter().collect()))
    }

    /// A settled batch of filesystem changes.
    pub fn settled(&self, paths: Vec<PathBuf>) -> Result<(), LintweaveError> {
        self.send(Command::Settled(paths))
    }

    /// Dispatches pending touches now instead of after the quiet window.
    /// Returns how many files were dispatched.
    pub async fn flush_touched(&self) -> Result<usize, LintweaveError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::FlushTouched(tx))?;
        rx.await.map_err(|_| stopped())
    }

    /// Every engine's current non-empty output.
    pub async fn pull(&self) -> Result<Vec<String>, LintweaveError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Pull(tx))?;
        rx.await.map_err(|_| stopped())
    }

    /// Body of the pull endpoint: a JSON array of strings.
    pub async fn pull_json(&self) -> Result<String, LintweaveError> {
        Ok(render_pull(&self.pull().await?))
    }

    /// Receives every live push from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.live.subscribe()
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.commands.is_closed()
    }

    /// Feeds settled batches from `source` into the session until either ends.
    pub fn watch<S>(&self, mut source: S) -> JoinHandle<()>
    where
        S: ChangeSource + 'static,
    {
        let handle = self.clone();
        tokio::spawn(async move {
            loop {
                let batch = tokio::select! {
                    _ = handle.cancel.cancelled() => break,
                    batch = source.next_batch() => batch,
                };
                let Some(batch) = batch else {
                    debug!("Change source exhausted");
                    break;
                };
                trace!(paths = batch.len(), "Settled change batch");
                if handle.settled(batch).is_err() {
                    break;
                }
            }
        })
    }

    /// Stops the session and its workers. Stopping twice is fine.
    pub async fn shutdown(&self) -> Result<(), LintweaveError> {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown(tx)).is_err() {
            return Ok(());
        }
        let _ = rx.await;
        Ok(())
    }

    fn send(&self, command: Command) -> Result<(), LintweaveError> {
        self.commands.send(command).map_err(|_| stopped())
    }
}

fn stopped() -> LintweaveError {
    LintweaveError::internal("serve session has stopped")
}
