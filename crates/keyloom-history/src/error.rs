//! History error types.

use crate::template::TemplateError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Errors that can occur while recording or reading history.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing or pruning a backup failed.
    #[error("Backup failed for {}: {source}", path.display())]
    Backup {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Snapshot not found.
    #[error("Snapshot not found: {0}")]
    NotFound(String),

    /// History is turned off or excluded for the file.
    #[error("History is disabled for {}", .0.display())]
    Disabled(PathBuf),

    /// The storage path template could not be resolved.
    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl HistoryError {
    /// Create a backup error for `path`.
    pub fn backup(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Backup {
            path: path.into(),
            source,
        }
    }

    /// Create a not found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }
}
