//! Core coordination for keyloom.
//!
//! This crate ties the document and history layers together:
//! - Configuration management (multi-source, JSONC support)
//! - The edit engine: read, snapshot, edit, atomic write, audit
//! - Detached retention sweeps with their own failure channel

pub mod config;
pub mod engine;
pub mod error;
pub mod maintenance;

pub use config::{Config, EditorConfig, TabStyle};
pub use engine::{ApplyOptions, ApplyOutcome, EditEngine, EditStrategy};
pub use error::{ConfigError, CoreError, CoreResult};
pub use maintenance::{PruneFailure, PruneQueue, PruneRequest};
