//! Build and serve sessions.
//!
//! A session ties the pieces together for one phase: it resolves which files
//! make up a batch (per [`InclusionMode`]), runs the worker pool and routes the
//! formatted output.

mod build;
mod serve;

pub use build::{BuildSession, lint_folder, run_build_pass};
pub use serve::{ServeHandle, ServeSession};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use lintweave_engine::{Envelope, Mode};

use crate::config::{InclusionMode, LintweaveConfig};
use crate::debounce::DEFAULT_TOUCH_DEBOUNCE_MS;
use crate::error::LintweaveError;
use crate::filter::PathFilter;
use crate::watch::WatchOptions;

/// Resolved settings for one session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Working directory; every `FileKey` is relative to it.
    pub root: PathBuf,
    pub filter: Arc<PathFilter>,
    pub include_mode: InclusionMode,
    pub enabled: bool,
    /// Quiet window for host "touched" notifications.
    pub touch_debounce: Duration,
    pub envelope: Envelope,
    pub watch: WatchOptions,
}

impl SessionSettings {
    /// Defaults: every file outside the default excludes, ProcessedOnly.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let defaults = LintweaveConfig::new();
        Self {
            filter: Arc::new(PathFilter::permissive(root.clone())),
            root,
            include_mode: InclusionMode::default(),
            enabled: true,
            touch_debounce: Duration::from_millis(DEFAULT_TOUCH_DEBOUNCE_MS),
            envelope: Envelope::default(),
            watch: watch_options(&defaults),
        }
    }

    /// Settings for `mode` from a loaded configuration.
    pub fn from_config(
        config: &LintweaveConfig,
        root: impl Into<PathBuf>,
        mode: Mode,
    ) -> Result<Self, LintweaveError> {
        let root = root.into();
        let phase = config.phase(mode);
        Ok(Self {
            filter: Arc::new(PathFilter::new(
                root.clone(),
                &config.include,
                &config.exclude,
            )?),
            root,
            include_mode: phase.include_mode,
            enabled: phase.enabled,
            touch_debounce: config.touch_debounce(),
            envelope: Envelope::new(config.max_sanitize_depth),
            watch: watch_options(config),
        })
    }

    pub fn with_include_mode(mut self, mode: InclusionMode) -> Self {
        self.include_mode = mode;
        self
    }

    pub fn with_filter(mut self, filter: PathFilter) -> Self {
        self.filter = Arc::new(filter);
        self
    }

    pub fn with_touch_debounce(mut self, quiet: Duration) -> Self {
        self.touch_debounce = quiet;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn watch_options(config: &LintweaveConfig) -> WatchOptions {
    WatchOptions {
        debounce: config.debounce(),
        poll: config.watch.poll,
        poll_interval: config.poll_interval(),
    }
}
