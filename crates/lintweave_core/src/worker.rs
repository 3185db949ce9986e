//! One isolated worker thread per engine.
//!
//! Batches go in over a per-worker FIFO channel; results come back as
//! [`WorkerEvent`]s carrying plain `serde_json::Value`s only. Every payload is
//! passed through an [`Envelope`] before it leaves the worker, so callables the
//! engine embedded in its results never cross the boundary, and the engine's
//! own objects are handed back untouched.
//!
//! # Lifecycle
//!
//! 1. [`WorkerPool::spawn`] starts every worker and waits for each engine's
//!    `prepare`. The first failure tears down the rest and aborts.
//! 2. [`WorkerPool::dispatch`] posts a batch to every worker without blocking.
//! 3. [`WorkerPool::shutdown`] cancels the shared token, closes the inboxes and
//!    joins workers that are idle.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use lintweave_engine::{
    Envelope, FileKey, LintEngine, Mode, Payload, Report, ResultSink, WorkerContext,
};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::LintweaveError;

/// A batch shared by every worker.
pub type Batch = Arc<[FileKey]>;

/// Messages from workers to the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// Build mode: the engine's complete answer for a batch.
    Built { engine: String, records: Vec<Value> },
    /// Serve mode: one incremental report for `batch`.
    Reported {
        engine: String,
        batch: Batch,
        report: Map<String, Value>,
    },
    /// The engine failed or panicked while processing a batch.
    Failed { engine: String, message: String },
}

impl WorkerEvent {
    pub fn engine(&self) -> &str {
        match self {
            Self::Built { engine, .. }
            | Self::Reported { engine, .. }
            | Self::Failed { engine, .. } => engine,
        }
    }
}

/// Pool settings.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub mode: Mode,
    pub working_directory: PathBuf,
    pub envelope: Envelope,
}

impl PoolOptions {
    pub fn new(mode: Mode, working_directory: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            working_directory: working_directory.into(),
            envelope: Envelope::default(),
        }
    }

    pub fn with_envelope(mut self, envelope: Envelope) -> Self {
        self.envelope = envelope;
        self
    }
}

struct Worker {
    engine: String,
    inbox: Option<Sender<Batch>>,
    thread: Option<JoinHandle<()>>,
}

/// Owns the worker threads of one session.
pub struct WorkerPool {
    workers: Vec<Worker>,
    cancel: CancellationToken,
    mode: Mode,
}

impl WorkerPool {
    /// Starts one worker per engine and waits until every engine is prepared.
    ///
    /// Blocks while engines prepare; call it off the async runtime.
    pub fn spawn(
        engines: &[Arc<dyn LintEngine>],
        options: PoolOptions,
        events: mpsc::UnboundedSender<WorkerEvent>,
    ) -> Result<Self, LintweaveError> {
        let cancel = CancellationToken::new();
        let mut pool = Self {
            workers: Vec::with_capacity(engines.len()),
            cancel: cancel.clone(),
            mode: options.mode,
        };

        let mut readiness = Vec::with_capacity(engines.len());
        for engine in engines {
            let name = engine.name().to_string();
            let (inbox_tx, inbox_rx) = crossbeam_channel::unbounded::<Batch>();
            let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);

            let worker = WorkerLoop {
                engine: Arc::clone(engine),
                ctx: WorkerContext {
                    mode: options.mode,
                    engine: name.clone(),
                    working_directory: options.working_directory.clone(),
                },
                envelope: options.envelope,
                inbox: inbox_rx,
                events: events.clone(),
                cancel: cancel.clone(),
            };

            let spawned = thread::Builder::new()
                .name(format!("lintweave-{}", name))
                .spawn(move || worker.run(ready_tx));

            let thread = match spawned {
                Ok(thread) => thread,
                Err(e) => {
                    pool.shutdown();
                    return Err(LintweaveError::EngineInit {
                        engine: name,
                        message: format!("failed to spawn worker thread: {}", e),
                    });
                }
            };

            pool.workers.push(Worker {
                engine: name.clone(),
                inbox: Some(inbox_tx),
                thread: Some(thread),
            });
            readiness.push((name, ready_rx));
        }

        for (engine, ready) in readiness {
            let outcome = ready
                .recv()
                .unwrap_or_else(|_| Err("worker exited before reporting readiness".to_string()));
            if let Err(message) = outcome {
                error!(engine = %engine, "Engine failed to start: {}", message);
                pool.shutdown();
                return Err(LintweaveError::EngineInit { engine, message });
            }
        }

        info!(
            mode = %options.mode,
            workers = pool.workers.len(),
            "Worker pool ready"
        );
        Ok(pool)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Engine names in registration order.
    pub fn engines(&self) -> impl Iterator<Item = &str> {
        self.workers.iter().map(|w| w.engine.as_str())
    }

    /// Posts `batch` to every worker. Never blocks.
    pub fn dispatch(&self, batch: Batch) {
        if self.cancel.is_cancelled() {
            debug!("Pool is shut down, dropping batch");
            return;
        }

        debug!(files = batch.len(), workers = self.workers.len(), "Dispatching batch");
        for worker in &self.workers {
            let Some(inbox) = &worker.inbox else {
                continue;
            };
            if inbox.send(Arc::clone(&batch)).is_err() {
                trace!(engine = %worker.engine, "Worker has exited, batch dropped");
            }
        }
    }

    /// Stops every worker.
    ///
    /// Workers still inside an engine call are not waited for; they see the
    /// cancelled token and exit once the engine returns, and anything they
    /// emit in the meantime is dropped.
    pub fn shutdown(&mut self) {
        self.cancel.cancel();
        for worker in &mut self.workers {
            worker.inbox.take();
        }

        for worker in &mut self.workers {
            let Some(thread) = worker.thread.take() else {
                continue;
            };
            if thread.is_finished() {
                if thread.join().is_err() {
                    warn!(engine = %worker.engine, "Worker thread panicked");
                }
            } else {
                debug!(engine = %worker.engine, "Worker busy, detaching");
            }
        }
    }

    /// Blocks until every worker has exited.
    pub fn join(mut self) {
        self.cancel.cancel();
        for worker in &mut self.workers {
            worker.inbox.take();
        }
        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take()
                && thread.join().is_err()
            {
                warn!(engine = %worker.engine, "Worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.cancel.cancel();
        for worker in &mut self.workers {
            worker.inbox.take();
        }
    }
}

struct WorkerLoop {
    engine: Arc<dyn LintEngine>,
    ctx: WorkerContext,
    envelope: Envelope,
    inbox: Receiver<Batch>,
    events: mpsc::UnboundedSender<WorkerEvent>,
    cancel: CancellationToken,
}

impl WorkerLoop {
    fn run(self, ready: Sender<Result<(), String>>) {
        let prepared = catch_unwind(AssertUnwindSafe(|| self.engine.prepare(&self.ctx)))
            .map_err(panic_message)
            .and_then(|result| result.map_err(|e| e.to_string()));
        let failed = prepared.is_err();
        let _ = ready.send(prepared);
        if failed {
            return;
        }

        debug!(engine = %self.ctx.engine, "Worker started");
        while let Ok(batch) = self.inbox.recv() {
            if self.cancel.is_cancelled() {
                break;
            }

            trace!(engine = %self.ctx.engine, files = batch.len(), "Worker received batch");
            let outcome = catch_unwind(AssertUnwindSafe(|| self.process(&batch)))
                .map_err(panic_message)
                .and_then(|result| result.map_err(|e| e.to_string()));

            if let Err(message) = outcome {
                warn!(engine = %self.ctx.engine, "Engine failed: {}", message);
                self.send(WorkerEvent::Failed {
                    engine: self.ctx.engine.clone(),
                    message,
                });
            }

            // build workers answer exactly one batch
            if self.ctx.mode == Mode::Build {
                break;
            }
        }
        debug!(engine = %self.ctx.engine, "Worker stopped");
    }

    fn process(&self, batch: &Batch) -> Result<(), lintweave_engine::EngineError> {
        match self.ctx.mode {
            Mode::Build => {
                let records = self.engine.lint_build(batch)?;
                let mut payload = Payload::Array(records);
                self.envelope.transmit(&mut payload, |wire| {
                    let records = match wire {
                        Value::Array(records) => records,
                        other => vec![other],
                    };
                    self.send(WorkerEvent::Built {
                        engine: self.ctx.engine.clone(),
                        records,
                    });
                });
                Ok(())
            }
            Mode::Serve => self.engine.lint_serve(batch, self.sink(batch)),
        }
    }

    /// Sink handed to a serve-mode engine for one batch.
    fn sink(&self, batch: &Batch) -> ResultSink {
        let engine = self.ctx.engine.clone();
        let batch = Arc::clone(batch);
        let envelope = self.envelope;
        let events = self.events.clone();
        let cancel = self.cancel.clone();

        ResultSink::new(move |report: &mut Report| {
            if cancel.is_cancelled() {
                trace!(engine = %engine, "Dropping result after shutdown");
                return;
            }

            let mut payload = Payload::Object(std::mem::take(report));
            envelope.transmit(&mut payload, |wire| {
                let report = match wire {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                let _ = events.send(WorkerEvent::Reported {
                    engine: engine.clone(),
                    batch: Arc::clone(&batch),
                    report,
                });
            });
            if let Payload::Object(map) = payload {
                *report = map;
            }
        })
    }

    fn send(&self, event: WorkerEvent) {
        if self.cancel.is_cancelled() {
            return;
        }
        if self.events.send(event).is_err() {
            trace!(engine = %self.ctx.engine, "Coordinator gone, event dropped");
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("engine panicked: {}", detail)
}

/// Converts a serve report to `FileKey`s, re-normalizing against `root`.
pub fn report_keys(report: Map<String, Value>, root: &Path) -> BTreeMap<FileKey, Value> {
    report
        .into_iter()
        .map(|(file, record)| (FileKey::normalize(&file, root), record))
        .collect()
}
