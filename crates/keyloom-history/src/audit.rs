//! Append-only log of committed writes.
//!
//! Every batch appends one `"<keypath>" : <json value>,` line per write to
//! `<root>/.keyloom/history/<file stem>.history`.

use crate::HistoryResult;
use keyloom_document::PendingWrite;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

const AUDIT_DIR: &str = ".keyloom";

/// Writes the per-document audit trail.
#[derive(Debug, Clone, Default)]
pub struct AuditLog;

impl AuditLog {
    pub fn new() -> Self {
        Self
    }

    /// Log file for `file`. Without a root the document's own directory is
    /// used as the base.
    pub fn log_path(&self, file: &Path, root: Option<&Path>) -> PathBuf {
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.base(file, root)
            .join(AUDIT_DIR)
            .join("history")
            .join(format!("{stem}.history"))
    }

    /// Append `writes`. An empty batch appends nothing and returns `None`.
    pub async fn append(
        &self,
        file: &Path,
        root: Option<&Path>,
        writes: &[PendingWrite],
    ) -> HistoryResult<Option<PathBuf>> {
        if writes.is_empty() {
            return Ok(None);
        }
        let log = self.log_path(file, root);
        if let Some(parent) = log.parent() {
            fs::create_dir_all(parent).await?;
        }

        let lines: String = writes
            .iter()
            .map(|w| format!("\"{}\" : {},\n", w.keypath, w.value.to_json()))
            .collect();
        let mut handle = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log)
            .await?;
        handle.write_all(lines.as_bytes()).await?;
        handle.flush().await?;

        let marker = self.base(file, root).join(AUDIT_DIR).join(".gitignore");
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&marker)
            .await
        {
            Ok(mut handle) => handle.write_all(b"*").await?,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }

        debug!(log = %log.display(), writes = writes.len(), "Appended audit lines");
        Ok(Some(log))
    }

    fn base(&self, file: &Path, root: Option<&Path>) -> PathBuf {
        match root {
            Some(root) => root.to_path_buf(),
            None => file
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyloom_document::{KeyPath, KeyStyle};
    use tempfile::tempdir;

    fn write(path: &str, value: impl Into<keyloom_document::Scalar>) -> PendingWrite {
        PendingWrite::new(KeyPath::parse(path, KeyStyle::Nested).unwrap(), value)
    }

    #[tokio::test]
    async fn test_append_creates_and_appends() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("locales/en.json");
        let audit = AuditLog::new();

        let log = audit
            .append(&file, Some(dir.path()), &[write("a.b", 2), write("title", "Hi \"you\"")])
            .await
            .unwrap()
            .unwrap();
        audit
            .append(&file, Some(dir.path()), &[write("c", true)])
            .await
            .unwrap();

        assert_eq!(log, dir.path().join(".keyloom/history/en.history"));
        assert_eq!(
            fs::read_to_string(&log).await.unwrap(),
            "\"a.b\" : 2,\n\"title\" : \"Hi \\\"you\\\"\",\n\"c\" : true,\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join(".keyloom/.gitignore")).await.unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn test_empty_batch_writes_nothing() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("en.json");
        let result = AuditLog::new().append(&file, None, &[]).await.unwrap();
        assert!(result.is_none());
        assert!(!dir.path().join(AUDIT_DIR).exists());
    }

    #[test]
    fn test_log_path_without_root() {
        let path = AuditLog::new().log_path(Path::new("/docs/i18n/fr.jsonc"), None);
        assert_eq!(path, PathBuf::from("/docs/i18n/.keyloom/history/fr.history"));
    }
}
