//! Serve command implementation

use std::path::Path;
use std::sync::Arc;

use miette::{IntoDiagnostic, Result};
use tracing::{debug, info, warn};

use lintweave_core::watch::{ChangeSource, FsWatcher};
use lintweave_core::{Mode, ServeSession, SessionSettings, TracingReporter};

use crate::cli::Cli;
use crate::utils::{build_registry, create_tokio_runtime, load_config, resolve_dir};

pub fn run_serve(cli: &Cli, dir: &Path, poll: bool) -> Result<()> {
    let dir = resolve_dir(dir)?;
    let config = load_config(cli, &dir)?;
    let registry = build_registry(&config, &[])?;

    let mut settings = SessionSettings::from_config(&config, &dir, Mode::Serve).into_diagnostic()?;
    settings.watch.poll |= poll;

    create_tokio_runtime()?.block_on(async move {
        let mut watcher = FsWatcher::new(&dir, &settings.watch).into_diagnostic()?;
        let handle = ServeSession::start(&registry, settings, Arc::new(TracingReporter))
            .await
            .into_diagnostic()?;
        info!("Serving {} (Ctrl-C to stop)", dir.display());

        let interrupted = tokio::signal::ctrl_c();
        tokio::pin!(interrupted);

        // this process is the host: every settled change counts as processed
        loop {
            tokio::select! {
                _ = &mut interrupted => {
                    debug!("Interrupted");
                    break;
                }
                batch = watcher.next_batch() => {
                    let Some(batch) = batch else {
                        warn!("File watcher stopped");
                        break;
                    };
                    handle.touched(batch.iter().cloned()).into_diagnostic()?;
                    handle.settled(batch).into_diagnostic()?;
                }
            }
        }

        handle.shutdown().await.into_diagnostic()
    })
}
