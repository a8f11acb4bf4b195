//! RAII-based timing for document edits and history maintenance.
//!
//! ```rust,ignore
//! use keyloom_util::timing::TimingGuard;
//!
//! async fn apply(file: &Path) {
//!     let _timing = TimingGuard::edit(file.display().to_string());
//!     // ... read, snapshot, write ...
//!     // Duration is logged when _timing is dropped
//! }
//! ```

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Measures an operation and logs its duration when dropped.
pub struct TimingGuard {
    operation_type: &'static str,
    operation_name: String,
    start: Instant,
    info_threshold_ms: u64,
    warn_threshold_ms: u64,
}

impl TimingGuard {
    /// Create a new timing guard.
    pub fn new(operation_type: &'static str, operation_name: impl Into<String>) -> Self {
        let operation_name = operation_name.into();
        debug!(
            operation_type = operation_type,
            operation_name = %operation_name,
            "Starting operation"
        );
        Self {
            operation_type,
            operation_name,
            start: Instant::now(),
            info_threshold_ms: 250,
            warn_threshold_ms: 5000,
        }
    }

    /// Timing guard for a document edit batch.
    pub fn edit(name: impl Into<String>) -> Self {
        Self::new("edit", name)
    }

    /// Timing guard for a retention sweep.
    pub fn prune(name: impl Into<String>) -> Self {
        Self::new("prune", name)
    }

    /// Set the threshold for info-level logging (in milliseconds).
    pub fn with_info_threshold(mut self, ms: u64) -> Self {
        self.info_threshold_ms = ms;
        self
    }

    /// Set the threshold for warn-level logging (in milliseconds).
    pub fn with_warn_threshold(mut self, ms: u64) -> Self {
        self.warn_threshold_ms = ms;
        self
    }

    /// Get the elapsed time so far.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let duration_ms = self.start.elapsed().as_millis() as u64;

        if duration_ms >= self.warn_threshold_ms {
            warn!(
                operation_type = self.operation_type,
                operation_name = %self.operation_name,
                duration_ms,
                "Slow operation completed"
            );
        } else if duration_ms >= self.info_threshold_ms {
            info!(
                operation_type = self.operation_type,
                operation_name = %self.operation_name,
                duration_ms,
                "Operation completed"
            );
        } else {
            debug!(
                operation_type = self.operation_type,
                operation_name = %self.operation_name,
                duration_ms,
                "Operation completed"
            );
        }
    }
}
