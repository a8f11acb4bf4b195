//! Backup snapshot naming.
//!
//! Snapshots are plain copies named after the UTC time they were taken, e.g.
//! `2024-05-01T09-30-00-125Z.bak`. The format sorts chronologically by name
//! and avoids characters that are illegal in file names. Same-millisecond
//! collisions get a `_001`, `_002`, ... suffix.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// File extension of snapshot files.
pub const SNAPSHOT_EXTENSION: &str = "bak";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S-%3fZ";

/// One snapshot file in a backup directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupEntry {
    /// Snapshot file name, used as its id.
    pub id: String,
    pub path: PathBuf,
    pub timestamp: DateTime<Utc>,
}

impl BackupEntry {
    /// Recognize a snapshot file. Other files yield `None`.
    pub fn from_path(path: &Path) -> Option<Self> {
        let id = path.file_name()?.to_str()?.to_string();
        let timestamp = parse_snapshot_name(&id)?;
        Some(Self {
            id,
            path: path.to_path_buf(),
            timestamp,
        })
    }
}

/// File name for a snapshot taken at `timestamp`; `attempt` > 0 adds a
/// collision suffix.
pub fn snapshot_name(timestamp: DateTime<Utc>, attempt: usize) -> String {
    let stamp = timestamp.format(TIMESTAMP_FORMAT);
    if attempt == 0 {
        format!("{stamp}.{SNAPSHOT_EXTENSION}")
    } else {
        format!("{stamp}_{attempt:03}.{SNAPSHOT_EXTENSION}")
    }
}

/// Timestamp encoded in a snapshot file name.
pub fn parse_snapshot_name(name: &str) -> Option<DateTime<Utc>> {
    let stem = name.strip_suffix(SNAPSHOT_EXTENSION)?.strip_suffix('.')?;
    let stamp = match stem.split_once('_') {
        Some((stamp, suffix)) if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) => stamp,
        Some(_) => return None,
        None => stem,
    };
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
