//! Applying key-path writes to documents on disk.
//!
//! Each [`EditEngine::apply`] call:
//! 1. reads the current file (the on-disk text is the source of truth),
//! 2. computes the new text, incrementally when the parser supports it and
//!    by a full `dump` otherwise,
//! 3. snapshots the old content,
//! 4. replaces the file atomically,
//! 5. appends the writes to the audit log and queues a retention sweep.
//!
//! Steps 3 and 5 are best effort. Their failures are logged and never fail
//! the edit. Writes to the same file must be serialized by the caller.

use crate::error::{CoreError, CoreResult};
use crate::maintenance::{PruneFailure, PruneQueue, PruneRequest};
use keyloom_document::{
    merge_writes, BoxedParser, KeyComparator, KeyLocation, KeyStyle, ParserRegistry, PendingWrite,
    Tree,
};
use keyloom_history::{AuditLog, BackupEntry, BackupStore, SettingsResolver};
use keyloom_util::{write_atomic, TimingGuard};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Options for one [`EditEngine::apply`] call.
#[derive(Clone, Default)]
pub struct ApplyOptions {
    /// Sort keys when the document is rewritten in full.
    pub sort_keys: bool,
    /// Key order used with `sort_keys`; lexicographic when absent.
    pub comparator: Option<Arc<KeyComparator>>,
}

/// How the new text was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EditStrategy {
    /// Only the targeted values changed.
    Incremental,
    /// The merged tree was serialized again.
    FullRewrite,
    /// Empty batch, nothing touched.
    NoOp,
}

/// Result of a committed batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOutcome {
    pub strategy: EditStrategy,
    pub writes: usize,
    /// Snapshot of the pre-write content, if one was taken.
    pub backup: Option<BackupEntry>,
    /// Audit log the batch was appended to.
    pub audit_log: Option<PathBuf>,
}

impl ApplyOutcome {
    fn noop() -> Self {
        Self {
            strategy: EditStrategy::NoOp,
            writes: 0,
            backup: None,
            audit_log: None,
        }
    }
}

/// Reads, edits and writes documents, keeping their history.
pub struct EditEngine {
    registry: ParserRegistry,
    store: Arc<BackupStore>,
    audit: AuditLog,
    prune: PruneQueue,
    prune_failures: Mutex<Option<mpsc::Receiver<PruneFailure>>>,
}

impl EditEngine {
    /// Create an engine. Must be called from within a tokio runtime.
    pub fn new(registry: ParserRegistry, settings: Arc<SettingsResolver>) -> Self {
        let store = Arc::new(BackupStore::new(settings));
        let (prune, failures) = PruneQueue::start(Arc::clone(&store));
        Self {
            registry,
            store,
            audit: AuditLog::new(),
            prune,
            prune_failures: Mutex::new(Some(failures)),
        }
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<BackupStore> {
        &self.store
    }

    pub fn settings(&self) -> &Arc<SettingsResolver> {
        self.store.settings()
    }

    /// Take the receiver of failed retention sweeps. Only the first call
    /// gets it.
    pub async fn take_prune_failures(&self) -> Option<mpsc::Receiver<PruneFailure>> {
        self.prune_failures.lock().await.take()
    }

    /// Wait for queued retention sweeps.
    pub async fn flush(&self) {
        self.prune.flush().await;
    }

    /// The parser registered for `file`'s extension.
    pub fn parser_for(&self, file: &Path) -> CoreResult<&BoxedParser> {
        self.registry
            .for_path(file)
            .ok_or_else(|| CoreError::NoParser(file.display().to_string()))
    }

    /// Current text of `file`; a missing file reads as empty.
    pub async fn read_text(&self, file: &Path) -> CoreResult<String> {
        Ok(read_existing(file).await?.unwrap_or_default())
    }

    /// Parse `file` into a tree.
    pub async fn load(&self, file: &Path) -> CoreResult<Tree> {
        let parser = self.parser_for(file)?;
        let text = self.read_text(file).await?;
        Ok(parser.parse(&text)?)
    }

    /// Span of every leaf in `file`.
    pub async fn source_map(&self, file: &Path) -> CoreResult<Vec<KeyLocation>> {
        let parser = self.parser_for(file)?;
        let text = self.read_text(file).await?;
        Ok(parser.parse_ast(&text)?)
    }

    /// Span of one key in `file`.
    pub async fn locate(
        &self,
        file: &Path,
        keypath: &str,
        style: KeyStyle,
    ) -> CoreResult<Option<KeyLocation>> {
        let parser = self.parser_for(file)?;
        let text = self.read_text(file).await?;
        Ok(parser.navigate_to_key(&text, keypath, style)?)
    }

    /// Commit `writes` to `file` and replace `tree` with the written document.
    /// A stale `tree` is never merged into; the on-disk text wins.
    ///
    /// The batch is all-or-nothing: on a parse or path error the file is left
    /// untouched and no snapshot is taken.
    pub async fn apply(
        &self,
        file: &Path,
        tree: &mut Tree,
        writes: Vec<PendingWrite>,
        options: &ApplyOptions,
    ) -> CoreResult<ApplyOutcome> {
        if writes.is_empty() {
            return Ok(ApplyOutcome::noop());
        }
        let _timing = TimingGuard::edit(file.display().to_string());
        let parser = Arc::clone(self.parser_for(file)?);

        let current = read_existing(file).await?;
        let old_text = current.as_deref().unwrap_or("");

        let (new_text, updated, strategy) = if parser.supports_incremental_edit() {
            let new_text = parser.apply_edits(old_text, &writes)?;
            let updated = parser.parse(&new_text)?;
            (new_text, updated, EditStrategy::Incremental)
        } else {
            let merged = merge_writes(&parser.parse(old_text)?, &writes)?;
            let new_text = parser.dump(&merged, options.sort_keys, options.comparator.as_deref())?;
            (new_text, merged, EditStrategy::FullRewrite)
        };

        let settings = self.settings().get(file).await;
        let backup = match current.as_deref() {
            Some(content) => match self.store.snapshot_with(&settings, file, content).await {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(path = %file.display(), error = %e, "Backup failed, continuing with write");
                    None
                }
            },
            None => None,
        };

        write_atomic(file, &new_text).await?;

        let audit_log = match self
            .audit
            .append(file, settings.project_root.as_deref(), &writes)
            .await
        {
            Ok(path) => path,
            Err(e) => {
                warn!(path = %file.display(), error = %e, "Audit log append failed");
                None
            }
        };

        if let Some(dir) = backup.as_ref().and_then(|entry| entry.path.parent()) {
            self.prune.enqueue(PruneRequest {
                dir: dir.to_path_buf(),
                policy: settings.retention,
                delay: Duration::from_secs(settings.save_delay),
            });
        }

        *tree = updated;
        debug!(
            path = %file.display(),
            writes = writes.len(),
            strategy = ?strategy,
            "Applied writes"
        );
        Ok(ApplyOutcome {
            strategy,
            writes: writes.len(),
            backup,
            audit_log,
        })
    }
}

impl Drop for EditEngine {
    fn drop(&mut self) {
        self.prune.abort();
    }
}

async fn read_existing(file: &Path) -> CoreResult<Option<String>> {
    match tokio::fs::read_to_string(file).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyloom_document::{
        DocumentResult, JsonParser, KeyPath, ParserOptions, Scalar, StructuredParser,
    };
    use keyloom_history::{list_dir, WorkspaceRoot};
    use serde_json::{json, Value};
    use std::cmp::Ordering;
    use tempfile::TempDir;

    /// JSON without incremental edits, to drive the full rewrite path.
    struct RewriteOnly(JsonParser);

    impl StructuredParser for RewriteOnly {
        fn id(&self) -> &str {
            "rewrite-only"
        }

        fn extensions(&self) -> &[&'static str] {
            &["rjson"]
        }

        fn parse(&self, text: &str) -> DocumentResult<Tree> {
            self.0.parse(text)
        }

        fn dump(
            &self,
            tree: &Tree,
            sort: bool,
            comparator: Option<&KeyComparator>,
        ) -> DocumentResult<String> {
            self.0.dump(tree, sort, comparator)
        }
    }

    fn engine(dir: &TempDir) -> EditEngine {
        let mut registry = ParserRegistry::with_builtins(ParserOptions::default());
        registry.register(Arc::new(RewriteOnly(JsonParser::default())));
        let resolver = SettingsResolver::new(vec![WorkspaceRoot::from_path(0, dir.path())], Value::Null);
        EditEngine::new(registry, Arc::new(resolver))
    }

    fn write(path: &str, value: impl Into<Scalar>) -> PendingWrite {
        PendingWrite::new(KeyPath::parse(path, KeyStyle::Nested).unwrap(), value)
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("en.json");
        tokio::fs::write(&file, "{\"a\": 1}\n").await.unwrap();

        let engine = engine(&dir);
        let mut tree = engine.load(&file).await.unwrap();
        let outcome = engine
            .apply(&file, &mut tree, Vec::new(), &ApplyOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.strategy, EditStrategy::NoOp);
        assert!(outcome.backup.is_none());
        assert!(!dir.path().join(".history").exists());
    }

    #[tokio::test]
    async fn test_incremental_apply_snapshots_old_content() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("en.json");
        let original = "{\n  // not json, but tolerated\n  \"a\": {\"b\": 1}\n}\n";
        tokio::fs::write(&file, original).await.unwrap();

        let engine = engine(&dir);
        let mut tree = engine.load(&file).await.unwrap();
        let outcome = engine
            .apply(&file, &mut tree, vec![write("a.b", 2)], &ApplyOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.strategy, EditStrategy::Incremental);
        assert_eq!(
            tokio::fs::read_to_string(&file).await.unwrap(),
            original.replace("\"b\": 1", "\"b\": 2")
        );
        let backup = outcome.backup.unwrap();
        assert_eq!(tokio::fs::read_to_string(&backup.path).await.unwrap(), original);
        assert_eq!(Value::Object(tree), json!({"a": {"b": 2}}));
        assert_eq!(
            outcome.audit_log,
            Some(dir.path().join(".keyloom/history/en.history"))
        );
    }

    #[tokio::test]
    async fn test_stale_tree_replaced_by_disk_state() {
        let dir = tempfile::tempdir().unwrap();
        let json_file = dir.path().join("en.json");
        let rewrite_file = dir.path().join("en.rjson");
        tokio::fs::write(&json_file, "{\"a\": 1, \"b\": 2}").await.unwrap();
        tokio::fs::write(&rewrite_file, "{\"a\": 1, \"b\": 2}").await.unwrap();

        let engine = engine(&dir);
        let mut incremental = Tree::new();
        let mut rewritten = Tree::new();
        let first = engine
            .apply(&json_file, &mut incremental, vec![write("b", 3)], &ApplyOptions::default())
            .await
            .unwrap();
        let second = engine
            .apply(&rewrite_file, &mut rewritten, vec![write("b", 3)], &ApplyOptions::default())
            .await
            .unwrap();

        assert_eq!(first.strategy, EditStrategy::Incremental);
        assert_eq!(second.strategy, EditStrategy::FullRewrite);
        assert_eq!(Value::Object(incremental.clone()), json!({"a": 1, "b": 3}));
        assert_eq!(incremental, rewritten);
    }

    #[tokio::test]
    async fn test_full_rewrite_fallback_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("en.rjson");
        tokio::fs::write(&file, "{\"z\": 1, \"a\": 2}").await.unwrap();

        let engine = engine(&dir);
        let mut tree = Tree::new();
        let options = ApplyOptions {
            sort_keys: true,
            comparator: None,
        };
        let outcome = engine
            .apply(&file, &mut tree, vec![write("m.n", "x")], &options)
            .await
            .unwrap();

        assert_eq!(outcome.strategy, EditStrategy::FullRewrite);
        assert_eq!(
            tokio::fs::read_to_string(&file).await.unwrap(),
            "{\n  \"a\": 2,\n  \"m\": {\n    \"n\": \"x\"\n  },\n  \"z\": 1\n}\n"
        );
        assert_eq!(Value::Object(tree), json!({"z": 1, "a": 2, "m": {"n": "x"}}));
    }

    #[tokio::test]
    async fn test_full_rewrite_custom_comparator() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("en.rjson");
        tokio::fs::write(&file, "{\"a\": 1, \"b\": 2}").await.unwrap();

        let engine = engine(&dir);
        let reverse: Arc<KeyComparator> = Arc::new(|a: &str, b: &str| -> Ordering { b.cmp(a) });
        let options = ApplyOptions {
            sort_keys: true,
            comparator: Some(reverse),
        };
        engine
            .apply(&file, &mut Tree::new(), vec![write("c", 3)], &options)
            .await
            .unwrap();

        assert_eq!(
            tokio::fs::read_to_string(&file).await.unwrap(),
            "{\n  \"c\": 3,\n  \"b\": 2,\n  \"a\": 1\n}\n"
        );
    }

    #[tokio::test]
    async fn test_new_file_has_no_backup() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("locales/fr.json");

        let engine = engine(&dir);
        let mut tree = Tree::new();
        let outcome = engine
            .apply(&file, &mut tree, vec![write("hello", "bonjour")], &ApplyOptions::default())
            .await
            .unwrap();

        assert!(outcome.backup.is_none());
        assert_eq!(
            engine.load(&file).await.unwrap(),
            json!({"hello": "bonjour"}).as_object().cloned().unwrap()
        );
    }

    #[tokio::test]
    async fn test_conflict_leaves_file_and_history_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("en.json");
        let original = "{\"a\": \"leaf\", \"b\": 1}";
        tokio::fs::write(&file, original).await.unwrap();

        let engine = engine(&dir);
        let mut tree = engine.load(&file).await.unwrap();
        let err = engine
            .apply(
                &file,
                &mut tree,
                vec![write("b", 2), write("a.x", 1)],
                &ApplyOptions::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CoreError::Document(keyloom_document::DocumentError::PathConflict { .. })
        ));
        assert_eq!(tokio::fs::read_to_string(&file).await.unwrap(), original);
        assert!(!dir.path().join(".history").exists());
        assert_eq!(Value::Object(tree), json!({"a": "leaf", "b": 1}));
    }

    #[tokio::test]
    async fn test_retention_runs_after_writes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("en.json");
        tokio::fs::write(&file, "{\"n\": 0}").await.unwrap();

        let engine = engine(&dir);
        let mut tree = Tree::new();
        for n in 1..=12 {
            engine
                .apply(&file, &mut tree, vec![write("n", n)], &ApplyOptions::default())
                .await
                .unwrap();
        }
        engine.flush().await;

        let backup_dir = dir.path().join(".history/en.json");
        assert_eq!(list_dir(&backup_dir).await.unwrap().len(), 10);
        assert!(backup_dir.join(".gitignore").exists());
    }

    #[tokio::test]
    async fn test_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        let err = engine.load(&dir.path().join("notes.txt")).await.unwrap_err();
        assert!(matches!(err, CoreError::NoParser(_)));
    }

    #[tokio::test]
    async fn test_locate_and_source_map_agree() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("en.json");
        tokio::fs::write(&file, "{\"a\": {\"b\": 1}}").await.unwrap();

        let engine = engine(&dir);
        let located = engine
            .locate(&file, "a.b", KeyStyle::Nested)
            .await
            .unwrap()
            .unwrap();
        let map = engine.source_map(&file).await.unwrap();
        let entry = map.iter().find(|l| l.key == "a.b").unwrap();
        assert_eq!((located.start, located.end), (entry.start, entry.end));
    }
}
