//! Shared utilities for keyloom.
//!
//! This crate provides common utilities used across the keyloom workspace:
//! - Logging setup with tracing
//! - Lexical path helpers (containment, relative paths, separators)
//! - Atomic file replacement
//! - RAII-based timing for operation measurement

pub mod fs;
pub mod log;
pub mod path;
pub mod timing;

pub use fs::write_atomic;
pub use timing::TimingGuard;
