//! Document error types.

use thiserror::Error;

/// Result type for document operations.
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Errors that can occur while parsing or editing a document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Malformed source text.
    #[error("parse error at byte {offset}: {message}")]
    Parse { message: String, offset: usize },

    /// A write targets a location whose shape does not allow a scalar.
    #[error("path conflict at '{keypath}': {reason}")]
    PathConflict { keypath: String, reason: String },

    /// Empty key path or empty segment.
    #[error("invalid key path: '{0}'")]
    InvalidKeyPath(String),

    /// The parser does not implement an optional capability.
    #[error("{parser} parser does not support {operation}")]
    Unsupported {
        parser: String,
        operation: &'static str,
    },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DocumentError {
    /// Create a parse error at the given byte offset.
    pub fn parse(message: impl Into<String>, offset: usize) -> Self {
        Self::Parse {
            message: message.into(),
            offset,
        }
    }

    /// Create a path conflict error.
    pub fn path_conflict(keypath: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PathConflict {
            keypath: keypath.into(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported-capability error.
    pub fn unsupported(parser: impl Into<String>, operation: &'static str) -> Self {
        Self::Unsupported {
            parser: parser.into(),
            operation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_reports_offset() {
        let err = DocumentError::parse("expected ':'", 12);
        assert_eq!(err.to_string(), "parse error at byte 12: expected ':'");
    }

    #[test]
    fn test_path_conflict_formats_keypath() {
        let err = DocumentError::path_conflict("a.b", "'a' holds a scalar");
        assert_eq!(err.to_string(), "path conflict at 'a.b': 'a' holds a scalar");
    }

    #[test]
    fn test_unsupported_names_parser_and_operation() {
        let err = DocumentError::unsupported("yaml", "incremental edits");
        assert_eq!(err.to_string(), "yaml parser does not support incremental edits");
    }
}
