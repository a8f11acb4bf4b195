//! Local history for keyloom.
//!
//! This crate decides where the history of a document lives and keeps it:
//! - Storage path templates (`${workspaceFolder}`, `~`, `%VAR%`)
//! - Typed `localHistory` configuration with recoverable warnings
//! - Per-root cached settings: enabled, storage layout, retention, excludes
//! - Backup snapshots before every destructive write, pruned by age then count
//! - Listing, diffing, restoring and purging snapshots
//! - An append-only audit log of committed writes
//!
//! # Example
//!
//! ```no_run
//! use keyloom_history::{BackupStore, SettingsResolver, WorkspaceRoot};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let roots = vec![WorkspaceRoot::from_path(0, "/project")];
//! let resolver = Arc::new(SettingsResolver::new(roots, serde_json::Value::Null));
//! let store = BackupStore::new(resolver.clone());
//!
//! let file = Path::new("/project/locales/en.json");
//! if let Some(entry) = store.snapshot(file, "{}\n").await? {
//!     let settings = resolver.get(file).await;
//!     if let Some(dir) = entry.path.parent() {
//!         store.prune(dir, &settings.retention).await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod audit;
mod config;
mod error;
mod settings;
mod snapshot;
mod store;
pub mod template;

pub use audit::AuditLog;
pub use config::{ConfigWarning, HistoryConfig, HistoryEnabled, RetentionPolicy, DEFAULT_EXCLUDE};
pub use error::{HistoryError, HistoryResult};
pub use settings::{EffectiveSettings, SettingsResolver};
pub use snapshot::{parse_snapshot_name, snapshot_name, BackupEntry, SNAPSHOT_EXTENSION};
pub use store::{list_dir, BackupStore, PruneReport, IGNORE_MARKER};
pub use template::{TemplateContext, TemplateError, WorkspaceRoot};
