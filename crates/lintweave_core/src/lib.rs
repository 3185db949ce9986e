//! # lintweave_core
//!
//! Orchestration core for lintweave.
//!
//! This crate provides:
//! - Path filtering and directory scanning
//! - Debouncing of host and filesystem change notifications
//! - One isolated worker per engine
//! - The per-engine result store and output routing
//! - Build and serve sessions tying it all together
//!
//! ## Example
//!
//! ```rust,ignore
//! use lintweave_core::{EngineRegistry, LintweaveConfig, lint_folder};
//!
//! let config = LintweaveConfig::load(&root)?;
//! let registry = EngineRegistry::from_config(&config)?;
//!
//! let outcome = lint_folder(&root, &registry, &config).await?;
//! for (engine, output) in &outcome.outputs {
//!     println!("[{}]\n{}", engine, output);
//! }
//! ```

mod config;
pub mod debounce;
mod error;
pub mod filter;
pub mod output;
pub mod reconcile;
mod registry;
pub mod scanner;
pub mod session;
pub mod store;
pub mod watch;
pub mod worker;

pub use config::{EngineConfig, InclusionMode, LintweaveConfig, PhaseConfig, WatchConfig};
pub use error::LintweaveError;
pub use filter::PathFilter;
pub use output::{
    BuildOutcome, CLIENT_EVENT, CLIENT_SNIPPET, ClientEvent, HostReporter, OutputCoordinator,
    PULL_PATH, TracingReporter,
};
pub use registry::EngineRegistry;
pub use session::{
    BuildSession, ServeHandle, ServeSession, SessionSettings, lint_folder, run_build_pass,
};
pub use store::ResultStore;
pub use watch::{ChangeSource, DebouncedSource, FsWatcher};

#[cfg(test)]
pub mod test_utils;

pub use lintweave_engine::{FileKey, LintEngine, Mode};
