//! Error types for the core crate.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Parse or edit failure in the document layer.
    #[error(transparent)]
    Document(#[from] keyloom_document::DocumentError),

    /// History subsystem failure surfaced by an explicit history operation.
    #[error(transparent)]
    History(#[from] keyloom_history::HistoryError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// No registered parser handles the file.
    #[error("no parser for {0}")]
    NoParser(String),
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid JSON/JSONC syntax.
    #[error("invalid config at {path}: {message}")]
    InvalidJson { path: String, message: String },

    /// A section has the wrong shape.
    #[error("config validation failed: {message}")]
    Validation { message: String },
}

impl ConfigError {
    pub fn invalid_json(path: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidJson {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
