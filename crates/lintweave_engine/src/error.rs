//! Engine error types.

use thiserror::Error;

/// Errors an engine can raise while preparing, analysing or formatting.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not set itself up inside its worker.
    #[error("Failed to prepare engine: {0}")]
    Prepare(String),

    /// A batch analysis failed.
    #[error("Analysis failed: {0}")]
    Analysis(String),

    /// Formatting results failed.
    #[error("Format failed: {0}")]
    Format(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Creates a prepare error.
    pub fn prepare(message: impl Into<String>) -> Self {
        Self::Prepare(message.into())
    }

    /// Creates an analysis error.
    pub fn analysis(message: impl Into<String>) -> Self {
        Self::Analysis(message.into())
    }

    /// Creates a format error.
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }
}
