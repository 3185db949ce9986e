//! Change sources: where settled batches of changed paths come from.
//!
//! A [`ChangeSource`] yields "the next settled batch of affected paths". The
//! filesystem backend (native notifications or polling) lives behind it, so
//! debouncing and reconciliation never care which one is running.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use notify::{
    Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher,
};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, trace, warn};

use crate::debounce::Debouncer;
use crate::error::LintweaveError;

/// Produces settled batches of changed paths.
#[async_trait]
pub trait ChangeSource: Send {
    /// Waits for the next settled batch. `None` when the source is exhausted.
    async fn next_batch(&mut self) -> Option<Vec<PathBuf>>;
}

/// Debounces a raw stream of changed paths.
pub struct DebouncedSource {
    raw: mpsc::UnboundedReceiver<PathBuf>,
    debouncer: Debouncer<PathBuf>,
    closed: bool,
}

impl DebouncedSource {
    pub fn new(raw: mpsc::UnboundedReceiver<PathBuf>, quiet: Duration) -> Self {
        Self {
            raw,
            debouncer: Debouncer::new(quiet),
            closed: false,
        }
    }

    /// A source fed through the returned sender.
    pub fn channel(quiet: Duration) -> (mpsc::UnboundedSender<PathBuf>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(rx, quiet))
    }

    fn record(&mut self, path: PathBuf) {
        trace!(path = %path.display(), "Raw change");
        self.debouncer.push(path, Instant::now().into_std());
    }
}

#[async_trait]
impl ChangeSource for DebouncedSource {
    async fn next_batch(&mut self) -> Option<Vec<PathBuf>> {
        loop {
            if self.closed {
                // hand out what was still pending, then end
                let rest = self.debouncer.take();
                return (!rest.is_empty()).then_some(rest);
            }

            match self.debouncer.deadline() {
                None => match self.raw.recv().await {
                    Some(path) => self.record(path),
                    None => self.closed = true,
                },
                Some(deadline) => {
                    tokio::select! {
                        biased;

                        path = self.raw.recv() => match path {
                            Some(path) => self.record(path),
                            None => self.closed = true,
                        },

                        _ = sleep_until(Instant::from_std(deadline)) => {
                            if let Some(batch) = self.debouncer.poll(Instant::now().into_std()) {
                                return Some(batch);
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Which notify backend is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Native,
    Poll,
}

/// Filesystem watcher settings.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub debounce: Duration,
    /// Skip native notifications and poll.
    pub poll: bool,
    pub poll_interval: Duration,
}

/// Watches a directory tree recursively.
///
/// Uses native notifications when the platform supports them and falls back
/// to polling otherwise.
pub struct FsWatcher {
    _watcher: Box<dyn Watcher + Send>,
    backend: Backend,
    source: DebouncedSource,
}

impl FsWatcher {
    pub fn new(root: &Path, options: &WatchOptions) -> Result<Self, LintweaveError> {
        let (tx, source) = DebouncedSource::channel(options.debounce);

        let (watcher, backend) = if options.poll {
            (poll_watcher(root, options.poll_interval, tx)?, Backend::Poll)
        } else {
            match native_watcher(root, tx.clone()) {
                Ok(watcher) => (watcher, Backend::Native),
                Err(e) => {
                    warn!(
                        root = %root.display(),
                        "Native file watching unavailable ({}), falling back to polling", e
                    );
                    (poll_watcher(root, options.poll_interval, tx)?, Backend::Poll)
                }
            }
        };

        info!(root = %root.display(), backend = ?backend, "Watching for changes");
        Ok(Self {
            _watcher: watcher,
            backend,
            source,
        })
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }
}

#[async_trait]
impl ChangeSource for FsWatcher {
    async fn next_batch(&mut self) -> Option<Vec<PathBuf>> {
        self.source.next_batch().await
    }
}

fn forwarder(tx: mpsc::UnboundedSender<PathBuf>) -> impl FnMut(notify::Result<Event>) + Send {
    move |res| match res {
        Ok(event) => {
            if matches!(event.kind, EventKind::Access(_)) {
                return;
            }
            for path in event.paths {
                let _ = tx.send(path);
            }
        }
        Err(e) => debug!("Watch error: {}", e),
    }
}

fn native_watcher(
    root: &Path,
    tx: mpsc::UnboundedSender<PathBuf>,
) -> Result<Box<dyn Watcher + Send>, notify::Error> {
    let mut watcher = RecommendedWatcher::new(forwarder(tx), Config::default())?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    Ok(Box::new(watcher))
}

fn poll_watcher(
    root: &Path,
    interval: Duration,
    tx: mpsc::UnboundedSender<PathBuf>,
) -> Result<Box<dyn Watcher + Send>, LintweaveError> {
    // mtime alone has whole-second resolution on some platforms
    let config = Config::default()
        .with_poll_interval(interval)
        .with_compare_contents(true);
    let mut watcher = PollWatcher::new(forwarder(tx), config)?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    Ok(Box::new(watcher))
}
