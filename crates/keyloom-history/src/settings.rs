//! Per-file history settings.
//!
//! [`SettingsResolver`] decides, for a target file, whether history is kept
//! and where its backups live:
//!
//! ```text
//! path template, absolute        <resolved>/.history/<encoded absolute path>/
//! path template, inside a root   <resolved>/.history[/<root basename>]/<encoded relative path>/
//! no template, inside a root     <root>/.history/<encoded relative path>/
//! no template, no root           (disabled)
//! ```
//!
//! The root basename segment is dropped when the resolved location is itself
//! inside the root. Results are cached per owning root until the
//! configuration or the set of roots changes.

use crate::config::{ConfigWarning, HistoryConfig, HistoryEnabled, RetentionPolicy};
use crate::template::{self, TemplateContext, WorkspaceRoot};
use globset::{Glob, GlobSet, GlobSetBuilder};
use keyloom_util::path as kpath;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const HISTORY_DIR: &str = ".history";

/// Resolved history settings for the files of one project root.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveSettings {
    pub project_root: Option<PathBuf>,
    pub enabled: bool,
    /// Directory that holds one backup directory per file.
    pub storage_root: Option<PathBuf>,
    pub absolute: bool,
    pub retention: RetentionPolicy,
    pub days_limit: u64,
    pub save_delay: u64,
    pub max_display: usize,
    pub exclude: Vec<String>,
    pub date_locale: Option<String>,
    /// Configuration and template problems found while resolving.
    pub warnings: Vec<String>,
    #[serde(skip)]
    exclude_set: GlobSet,
}

impl EffectiveSettings {
    /// Settings with history turned off.
    pub fn disabled(project_root: Option<PathBuf>) -> Self {
        Self::build(project_root, None, false, &HistoryConfig::default(), Vec::new())
    }

    fn build(
        project_root: Option<PathBuf>,
        storage_root: Option<PathBuf>,
        absolute: bool,
        config: &HistoryConfig,
        mut warnings: Vec<String>,
    ) -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.exclude {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => warnings.push(format!("localHistory.exclude ignores '{pattern}': {e}")),
            }
        }
        let exclude_set = builder.build().unwrap_or_else(|_| GlobSet::empty());

        Self {
            project_root,
            enabled: storage_root.is_some(),
            storage_root,
            absolute,
            retention: config.backup,
            days_limit: config.days_limit,
            save_delay: config.save_delay,
            max_display: config.max_display,
            exclude: config.exclude.clone(),
            date_locale: config.date_locale.clone(),
            warnings,
            exclude_set,
        }
    }

    /// Check the file against the exclude globs, by absolute and by
    /// root-relative path.
    pub fn is_excluded(&self, file: &Path) -> bool {
        let file = kpath::absolute(file);
        if self.exclude_set.is_match(kpath::to_slash(&file)) {
            return true;
        }
        self.project_root
            .as_deref()
            .and_then(|root| kpath::relative_to(&file, root))
            .is_some_and(|relative| self.exclude_set.is_match(kpath::to_slash(&relative)))
    }

    /// Directory holding the backups of `file`, or `None` when disabled.
    ///
    /// The file's path becomes a single directory name with `%`, path
    /// separators and `:` percent-escaped. Files outside the root fall back to
    /// their base name.
    pub fn history_dir(&self, file: &Path) -> Option<PathBuf> {
        let storage = self.storage_root.as_ref()?;
        let file = kpath::absolute(file);
        let relative = self
            .project_root
            .as_deref()
            .and_then(|root| kpath::relative_to(&file, root));
        let name = match relative {
            Some(relative) if !self.absolute => encode_path(&relative),
            _ if self.absolute => encode_path(&file),
            _ => encode_segment(&kpath::basename(&file)),
        };
        if name.is_empty() {
            return None;
        }
        Some(storage.join(name))
    }
}

/// Join the escaped components of `path` with `%2F`. Root and drive
/// separators are dropped; a drive prefix keeps its escaped colon.
fn encode_path(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Prefix(prefix) => Some(encode_segment(&prefix.as_os_str().to_string_lossy())),
            Component::Normal(name) => Some(encode_segment(&name.to_string_lossy())),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("%2F")
}

/// Escape one path component. A backslash inside a component is a literal
/// character on Unix and gets its own escape.
fn encode_segment(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '\\' => out.push_str("%5C"),
            ':' => out.push_str("%3A"),
            c => out.push(c),
        }
    }
    out
}

/// Computes and caches [`EffectiveSettings`] per project root.
pub struct SettingsResolver {
    roots: RwLock<Vec<WorkspaceRoot>>,
    section: RwLock<Value>,
    cache: RwLock<HashMap<Option<PathBuf>, Arc<EffectiveSettings>>>,
    home: Option<PathBuf>,
    env: HashMap<String, String>,
}

impl SettingsResolver {
    /// Create a resolver over the raw `localHistory` section.
    ///
    /// The home directory and environment are captured once here; template
    /// resolution never reads process state.
    pub fn new(roots: Vec<WorkspaceRoot>, section: Value) -> Self {
        Self {
            roots: RwLock::new(roots),
            section: RwLock::new(section),
            cache: RwLock::new(HashMap::new()),
            home: dirs::home_dir(),
            env: std::env::vars().collect(),
        }
    }

    /// Replace the captured home directory and environment.
    pub fn with_environment(mut self, home: Option<PathBuf>, env: HashMap<String, String>) -> Self {
        self.home = home;
        self.env = env;
        self
    }

    /// Settings for `file`, computed on the first request for its root.
    pub async fn get(&self, file: &Path) -> Arc<EffectiveSettings> {
        let file = kpath::absolute(file);
        let root = self.owning_root(&file).await;
        let key = root.as_ref().map(|r| r.path.clone());

        if let Some(cached) = self.cache.read().await.get(&key) {
            return Arc::clone(cached);
        }

        let settings = Arc::new(self.compute(root.as_ref()).await);
        let mut cache = self.cache.write().await;
        Arc::clone(cache.entry(key).or_insert(settings))
    }

    /// Drop every cached entry.
    pub async fn clear(&self) {
        self.cache.write().await.clear();
        debug!("Cleared history settings cache");
    }

    /// Replace the raw configuration section and invalidate the cache.
    pub async fn update_config(&self, section: Value) {
        *self.section.write().await = section;
        self.clear().await;
    }

    /// Replace the open roots and invalidate the cache.
    pub async fn set_roots(&self, roots: Vec<WorkspaceRoot>) {
        *self.roots.write().await = roots;
        self.clear().await;
    }

    pub async fn roots(&self) -> Vec<WorkspaceRoot> {
        self.roots.read().await.clone()
    }

    /// The deepest open root containing `file`.
    pub async fn owning_root(&self, file: &Path) -> Option<WorkspaceRoot> {
        let file = kpath::absolute(file);
        self.roots
            .read()
            .await
            .iter()
            .filter(|root| kpath::is_within_or_equal(&file, &kpath::absolute(&root.path)))
            .max_by_key(|root| root.path.components().count())
            .cloned()
    }

    async fn compute(&self, root: Option<&WorkspaceRoot>) -> EffectiveSettings {
        let (config, config_warnings) = HistoryConfig::from_value(&*self.section.read().await);
        let mut warnings: Vec<String> = config_warnings.iter().map(ConfigWarning::to_string).collect();
        let project_root = root.map(|r| kpath::absolute(&r.path));

        let layout = if config.enabled == HistoryEnabled::Never {
            None
        } else if let Some(template) = &config.path {
            let roots = self.roots.read().await;
            let ctx = TemplateContext {
                current_root: root,
                roots: &roots,
                home: self.home.as_deref(),
                env: &self.env,
            };
            match template::resolve(template, &ctx) {
                Ok(resolved) => {
                    choose_layout(&config, project_root.as_deref(), &kpath::to_native_separators(Path::new(&resolved)))
                }
                Err(e) => {
                    warnings.push(e.to_string());
                    None
                }
            }
        } else {
            project_root.as_ref().map(|root| (root.join(HISTORY_DIR), false))
        };

        if !warnings.is_empty() {
            warn!(
                root = ?project_root,
                "History settings: {}",
                warnings.join("; ")
            );
        }

        let (storage_root, absolute) = match layout {
            Some((storage, absolute)) => (Some(kpath::normalize(&kpath::to_native_separators(&storage))), absolute),
            None => (None, false),
        };
        debug!(root = ?project_root, storage = ?storage_root, absolute, "Resolved history settings");
        EffectiveSettings::build(project_root, storage_root, absolute, &config, warnings)
    }
}

fn choose_layout(config: &HistoryConfig, root: Option<&Path>, resolved: &Path) -> Option<(PathBuf, bool)> {
    let resolved = kpath::absolute(resolved);
    if config.absolute || (root.is_none() && config.enabled == HistoryEnabled::Always) {
        if root.is_none() && config.enabled == HistoryEnabled::Workspace {
            return None;
        }
        return Some((resolved.join(HISTORY_DIR), true));
    }
    let root = root?;
    let base = resolved.join(HISTORY_DIR);
    if kpath::is_within_or_equal(&resolved, root) {
        Some((base, false))
    } else {
        Some((base.join(kpath::basename(root)), false))
    }
}
