//! Configuration management for keyloom.
//!
//! Configuration is loaded from multiple sources and merged:
//! 1. Global config: `<config dir>/keyloom/config.json[c]`
//! 2. Environment variable: `KEYLOOM_CONFIG_CONTENT`
//! 3. Project config: `keyloom.jsonc` or `keyloom.json` in the project directory
//!
//! Files are JSONC: comments and trailing commas are accepted.

use crate::error::{ConfigError, CoreResult};
use keyloom_document::{JsoncParser, KeyStyle, ParserOptions, StructuredParser};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable holding inline configuration.
pub const CONFIG_CONTENT_ENV: &str = "KEYLOOM_CONFIG_CONTENT";

const GLOBAL_FILES: &[&str] = &["config.json", "config.jsonc"];
const PROJECT_FILES: &[&str] = &["keyloom.jsonc", "keyloom.json"];

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// JSON Schema reference.
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Log level for the CLI, e.g. `debug`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// How documents are written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor: Option<EditorConfig>,

    /// Raw `localHistory` section, validated by the history crate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_history: Option<Value>,
}

/// Indentation character for generated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabStyle {
    #[default]
    Space,
    Tab,
}

/// The `editor` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indent: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_style: Option<TabStyle>,
    /// Sort keys when a document has to be rewritten in full.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_keys: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_style: Option<KeyStyle>,
}

impl EditorConfig {
    pub fn merge(mut self, other: Self) -> Self {
        if other.indent.is_some() {
            self.indent = other.indent;
        }
        if other.tab_style.is_some() {
            self.tab_style = other.tab_style;
        }
        if other.sort_keys.is_some() {
            self.sort_keys = other.sort_keys;
        }
        if other.key_style.is_some() {
            self.key_style = other.key_style;
        }
        self
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Returns the merged config and the files it was read from.
    pub async fn load(project_dir: Option<&Path>) -> CoreResult<(Self, Vec<PathBuf>)> {
        let inline = std::env::var(CONFIG_CONTENT_ENV).ok();
        Self::load_from(
            keyloom_util::log::config_dir().as_deref(),
            inline.as_deref(),
            project_dir,
        )
        .await
    }

    /// Load from explicit sources; later sources override earlier ones.
    pub async fn load_from(
        global_dir: Option<&Path>,
        inline: Option<&str>,
        project_dir: Option<&Path>,
    ) -> CoreResult<(Self, Vec<PathBuf>)> {
        let mut config = Config::default();
        let mut sources = Vec::new();

        if let Some(dir) = global_dir {
            if let Some(path) = first_existing(dir, GLOBAL_FILES).await {
                config = config.merge(Self::load_file(&path).await?);
                sources.push(path);
            }
        }

        if let Some(content) = inline {
            config = config.merge(Self::parse_jsonc(content, "<env>")?);
        }

        if let Some(dir) = project_dir {
            if let Some(path) = first_existing(dir, PROJECT_FILES).await {
                config = config.merge(Self::load_file(&path).await?);
                sources.push(path);
            }
        }

        debug!(sources = ?sources, "Loaded configuration");
        Ok((config, sources))
    }

    /// Load configuration from a file.
    pub async fn load_file(path: &Path) -> CoreResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse_jsonc(&content, &path.display().to_string())
    }

    /// Parse JSONC (JSON with comments).
    pub fn parse_jsonc(content: &str, source: &str) -> CoreResult<Self> {
        let tree = JsoncParser::default()
            .parse(content)
            .map_err(|e| ConfigError::invalid_json(source, e))?;
        serde_json::from_value(Value::Object(tree))
            .map_err(|e| ConfigError::invalid_json(source, e).into())
    }

    /// Merge another config into this one (other takes precedence).
    ///
    /// `editor` merges field by field and `localHistory` key by key.
    pub fn merge(mut self, other: Self) -> Self {
        if other.schema.is_some() {
            self.schema = other.schema;
        }
        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }
        self.editor = match (self.editor, other.editor) {
            (Some(base), Some(other)) => Some(base.merge(other)),
            (base, None) => base,
            (None, other) => other,
        };
        self.local_history = match (self.local_history, other.local_history) {
            (Some(Value::Object(mut base)), Some(Value::Object(other))) => {
                base.extend(other);
                Some(Value::Object(base))
            }
            (base, None) => base,
            (_, other) => other,
        };
        self
    }

    /// Indentation for generated text.
    pub fn parser_options(&self) -> ParserOptions {
        let editor = self.editor.clone().unwrap_or_default();
        let defaults = ParserOptions::default();
        ParserOptions {
            indent: editor.indent.unwrap_or(defaults.indent),
            tab: editor.tab_style == Some(TabStyle::Tab),
        }
    }

    pub fn sort_keys(&self) -> bool {
        self.editor
            .as_ref()
            .and_then(|e| e.sort_keys)
            .unwrap_or(false)
    }

    pub fn key_style(&self) -> KeyStyle {
        self.editor
            .as_ref()
            .and_then(|e| e.key_style)
            .unwrap_or_default()
    }

    /// The `localHistory` section, `null` when absent.
    pub fn history_section(&self) -> Value {
        self.local_history.clone().unwrap_or(Value::Null)
    }
}

async fn first_existing(dir: &Path, names: &[&str]) -> Option<PathBuf> {
    for name in names {
        let path = dir.join(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Some(path);
        }
    }
    None
}
