//! # lintweave_engine
//!
//! Engine-side contract for lintweave.
//!
//! This crate provides:
//! - The `LintEngine` trait every analysis engine implements
//! - `Payload`, the engine-side record tree (may carry live callables)
//! - `Envelope`, which strips callables before a payload crosses a worker
//!   boundary and restores them afterwards
//! - `CommandEngine`, an adapter that runs an external command per batch
//!
//! ## Example
//!
//! ```rust,ignore
//! use lintweave_engine::{CommandEngine, CommandEngineConfig, LintEngine};
//!
//! let engine = CommandEngine::new(CommandEngineConfig::new("eslint", "npx").arg("eslint"));
//! let records = engine.lint_build(&files)?;
//! ```

mod command;
mod engine;
pub mod envelope;
mod error;
mod file_key;
mod payload;

pub use command::{CommandEngine, CommandEngineConfig};
pub use engine::{LintEngine, Mode, Report, ResultSink, WorkerContext};
pub use envelope::{DEFAULT_MAX_DEPTH, Envelope, Stripped};
pub use error::EngineError;
pub use file_key::FileKey;
pub use payload::{Callable, Payload};
