//! Orchestration error types.

use lintweave_engine::EngineError;
use thiserror::Error;

/// Errors that can occur while orchestrating lint engines.
#[derive(Debug, Error)]
pub enum LintweaveError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An engine name that was never registered.
    #[error("Unknown engine: {0}")]
    UnknownEngine(String),

    /// Two engines share a name.
    #[error("Engine '{0}' is registered more than once")]
    DuplicateEngine(String),

    /// An engine failed to start on its worker.
    #[error("Engine '{engine}' failed to start: {message}")]
    EngineInit { engine: String, message: String },

    /// Build produced findings or engine failures.
    #[error("Linting failed, see above output")]
    LintingFailed,

    /// Engine error outside a worker.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// File watcher error.
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LintweaveError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true for errors that come from configuration rather than runtime.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::UnknownEngine(_)
                | Self::DuplicateEngine(_)
                | Self::EngineInit { .. }
        )
    }
}
