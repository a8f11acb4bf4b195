//! Backup storage with age and count retention.

use crate::config::RetentionPolicy;
use crate::settings::{EffectiveSettings, SettingsResolver};
use crate::snapshot::{snapshot_name, BackupEntry};
use crate::{HistoryError, HistoryResult};
use chrono::{DateTime, Duration, Utc};
use keyloom_util::{write_atomic, TimingGuard};
use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Name of the marker that keeps backup directories out of version control.
pub const IGNORE_MARKER: &str = ".gitignore";

const MAX_NAME_ATTEMPTS: usize = 1000;

/// Outcome of a retention sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    /// Snapshots found before the sweep.
    pub scanned: usize,
    /// Deleted for exceeding the age limit.
    pub expired: usize,
    /// Deleted for exceeding the count limit.
    pub overflow: usize,
}

impl PruneReport {
    pub fn removed(&self) -> usize {
        self.expired + self.overflow
    }
}

/// Snapshots of file content taken before destructive writes.
///
/// Each file has its own backup directory (see
/// [`EffectiveSettings::history_dir`]):
/// ```text
/// <storage root>/
///   locales%2Fen.json/
///     .gitignore
///     2024-05-01T09-30-00-125Z.bak
///     2024-05-01T09-41-12-003Z.bak
/// ```
pub struct BackupStore {
    settings: Arc<SettingsResolver>,
}

impl BackupStore {
    pub fn new(settings: Arc<SettingsResolver>) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Arc<SettingsResolver> {
        &self.settings
    }

    /// Snapshot `content` as the current state of `file`.
    ///
    /// Returns `None` when history is disabled or the file is excluded.
    pub async fn snapshot(&self, file: &Path, content: &str) -> HistoryResult<Option<BackupEntry>> {
        let settings = self.settings.get(file).await;
        self.snapshot_with(&settings, file, content).await
    }

    /// Like [`snapshot`](Self::snapshot) with already resolved settings.
    pub async fn snapshot_with(
        &self,
        settings: &EffectiveSettings,
        file: &Path,
        content: &str,
    ) -> HistoryResult<Option<BackupEntry>> {
        if settings.is_excluded(file) {
            debug!(path = %file.display(), "File excluded from history");
            return Ok(None);
        }
        let Some(dir) = settings.history_dir(file) else {
            return Ok(None);
        };

        fs::create_dir_all(&dir)
            .await
            .map_err(|e| HistoryError::backup(&dir, e))?;
        ensure_ignore_marker(&dir).await?;

        let entry = write_unique(&dir, Utc::now(), content).await?;
        debug!(path = %file.display(), snapshot = %entry.path.display(), "Snapshot taken");
        Ok(Some(entry))
    }

    /// Apply `policy` to one backup directory.
    pub async fn prune(&self, dir: &Path, policy: &RetentionPolicy) -> HistoryResult<PruneReport> {
        self.prune_at(dir, policy, Utc::now()).await
    }

    /// Apply `policy` as of `now`.
    ///
    /// Snapshots older than the age limit go first; of the rest only the
    /// newest `max_count` are kept.
    pub async fn prune_at(
        &self,
        dir: &Path,
        policy: &RetentionPolicy,
        now: DateTime<Utc>,
    ) -> HistoryResult<PruneReport> {
        let _timing = TimingGuard::prune(dir.display().to_string());
        let entries = list_dir(dir).await?;
        let cutoff = now - policy.max_age();
        let mut report = PruneReport {
            scanned: entries.len(),
            ..PruneReport::default()
        };

        let mut survivors = Vec::new();
        for entry in entries {
            if entry.timestamp < cutoff {
                if remove_entry(&entry).await {
                    report.expired += 1;
                }
            } else {
                survivors.push(entry);
            }
        }
        for entry in survivors.iter().skip(policy.max_count) {
            if remove_entry(entry).await {
                report.overflow += 1;
            }
        }

        if report.removed() > 0 {
            info!(
                dir = %dir.display(),
                expired = report.expired,
                overflow = report.overflow,
                "Pruned backups"
            );
        }
        Ok(report)
    }

    /// Snapshots of `file`, newest first, at most `limit` of them.
    pub async fn list(&self, file: &Path, limit: Option<usize>) -> HistoryResult<Vec<BackupEntry>> {
        let settings = self.settings.get(file).await;
        let Some(dir) = settings.history_dir(file) else {
            return Ok(Vec::new());
        };
        let mut entries = list_dir(&dir).await?;
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    /// Snapshots shown in history views, capped by `maxDisplay`.
    pub async fn recent(&self, file: &Path) -> HistoryResult<Vec<BackupEntry>> {
        let max = self.settings.get(file).await.max_display;
        self.list(file, Some(max)).await
    }

    /// Look up one snapshot of `file` by id.
    pub async fn find(&self, file: &Path, id: &str) -> HistoryResult<BackupEntry> {
        self.list(file, None)
            .await?
            .into_iter()
            .find(|entry| entry.id == id)
            .ok_or_else(|| HistoryError::not_found(id))
    }

    pub async fn read(&self, entry: &BackupEntry) -> HistoryResult<String> {
        Ok(fs::read_to_string(&entry.path).await?)
    }

    /// Put a snapshot's content back into `file`.
    ///
    /// The content being replaced is snapshotted first, so a restore can be
    /// undone, and the directory is pruned right after. Returns that snapshot.
    pub async fn restore(&self, file: &Path, id: &str) -> HistoryResult<Option<BackupEntry>> {
        let entry = self.find(file, id).await?;
        let content = self.read(&entry).await?;
        let settings = self.settings.get(file).await;

        let previous = match fs::read_to_string(file).await {
            Ok(current) => match self.snapshot_with(&settings, file, &current).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(path = %file.display(), error = %e, "Pre-restore snapshot failed");
                    None
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        write_atomic(file, &content).await?;
        info!(path = %file.display(), snapshot = %entry.id, "Restored snapshot");

        if let Some(dir) = previous.as_ref().and_then(|p| p.path.parent()) {
            if let Err(e) = self.prune(dir, &settings.retention).await {
                warn!(dir = %dir.display(), error = %e, "Prune after restore failed");
            }
        }
        Ok(previous)
    }

    /// Unified diff from a snapshot to the current content of `file`.
    pub async fn diff(&self, file: &Path, id: &str) -> HistoryResult<String> {
        let entry = self.find(file, id).await?;
        let old_content = self.read(&entry).await?;
        let new_content = match fs::read_to_string(file).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(generate_diff(&old_content, &new_content, &entry.id, file))
    }

    /// Delete every snapshot of `file` older than `daysLimit`.
    pub async fn purge(&self, file: &Path) -> HistoryResult<usize> {
        let settings = self.settings.get(file).await;
        let days = i64::try_from(settings.days_limit).unwrap_or(i64::MAX);
        let cutoff = Utc::now() - Duration::try_days(days).unwrap_or_else(|| Duration::days(36_500));
        let mut removed = 0;
        for entry in self.list(file, None).await? {
            if entry.timestamp < cutoff && remove_entry(&entry).await {
                removed += 1;
            }
        }
        if removed > 0 {
            info!(path = %file.display(), removed, "Purged old snapshots");
        }
        Ok(removed)
    }

    /// Delete one snapshot.
    pub async fn delete(&self, file: &Path, id: &str) -> HistoryResult<()> {
        let entry = self.find(file, id).await?;
        fs::remove_file(&entry.path).await?;
        info!(snapshot = %entry.path.display(), "Deleted snapshot");
        Ok(())
    }
}

/// Snapshot files in `dir`, newest first. A missing directory is empty.
pub async fn list_dir(dir: &Path) -> HistoryResult<Vec<BackupEntry>> {
    let mut entries = Vec::new();
    let mut read_dir = match fs::read_dir(dir).await {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(entries),
        Err(e) => return Err(HistoryError::backup(dir, e)),
    };
    while let Some(item) = read_dir.next_entry().await? {
        if let Some(entry) = BackupEntry::from_path(&item.path()) {
            entries.push(entry);
        }
    }
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
    Ok(entries)
}

async fn remove_entry(entry: &BackupEntry) -> bool {
    match fs::remove_file(&entry.path).await {
        Ok(()) => true,
        Err(e) => {
            warn!(snapshot = %entry.path.display(), error = %e, "Failed to delete snapshot");
            false
        }
    }
}

async fn ensure_ignore_marker(dir: &Path) -> HistoryResult<()> {
    let marker = dir.join(IGNORE_MARKER);
    match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&marker)
        .await
    {
        Ok(mut file) => file
            .write_all(b"*")
            .await
            .map_err(|e| HistoryError::backup(&marker, e)),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(HistoryError::backup(&marker, e)),
    }
}

async fn write_unique(dir: &Path, timestamp: DateTime<Utc>, content: &str) -> HistoryResult<BackupEntry> {
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let id = snapshot_name(timestamp, attempt);
        let path: PathBuf = dir.join(&id);
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(mut file) => {
                file.write_all(content.as_bytes())
                    .await
                    .map_err(|e| HistoryError::backup(&path, e))?;
                file.flush().await.map_err(|e| HistoryError::backup(&path, e))?;
                return Ok(BackupEntry {
                    id,
                    path,
                    timestamp,
                });
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(HistoryError::backup(&path, e)),
        }
    }
    Err(HistoryError::backup(
        dir,
        std::io::Error::new(ErrorKind::AlreadyExists, "no free snapshot name"),
    ))
}

/// Generate a unified diff between two strings.
fn generate_diff(old: &str, new: &str, snapshot: &str, path: &Path) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut output = String::new();

    output.push_str(&format!("--- {}@{}\n", path.display(), snapshot));
    output.push_str(&format!("+++ {}\n", path.display()));

    for (idx, group) in diff.grouped_ops(3).iter().enumerate() {
        if idx > 0 {
            output.push_str("...\n");
        }

        for op in group {
            for change in diff.iter_changes(op) {
                let sign = match change.tag() {
                    ChangeTag::Delete => "-",
                    ChangeTag::Insert => "+",
                    ChangeTag::Equal => " ",
                };

                output.push_str(sign);
                output.push_str(change.value());
                if !change.value().ends_with('\n') {
                    output.push('\n');
                }
            }
        }
    }

    output
}
