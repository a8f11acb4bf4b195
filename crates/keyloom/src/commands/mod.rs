//! Command handlers for the keyloom CLI.
//!
//! This module contains handlers for the various CLI subcommands,
//! split into logical groups for better organization.

pub mod document;
pub mod history;
pub mod settings;

pub use document::*;
pub use history::*;
pub use settings::*;

use anyhow::{bail, Context};
use keyloom_core::{ApplyOptions, Config, EditEngine};
use keyloom_document::{KeyPath, KeyStyle, ParserRegistry};
use keyloom_history::{SettingsResolver, WorkspaceRoot};
use keyloom_util::path as kpath;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything a command needs: roots, merged config and the engine.
pub struct Workspace {
    pub roots: Vec<WorkspaceRoot>,
    pub config: Config,
    pub sources: Vec<PathBuf>,
    pub engine: EditEngine,
}

impl Workspace {
    /// Open the roots given on the command line, or `cwd` when none are.
    ///
    /// Project configuration is read from the first root.
    pub async fn open(cwd: &Path, specs: &[String]) -> anyhow::Result<Self> {
        let roots = if specs.is_empty() {
            vec![WorkspaceRoot::from_path(0, kpath::normalize(cwd))]
        } else {
            specs
                .iter()
                .enumerate()
                .map(|(index, spec)| parse_root(cwd, index, spec))
                .collect::<anyhow::Result<Vec<_>>>()?
        };

        let project_dir = roots.first().map(|root| root.path.clone());
        let (config, sources) = Config::load(project_dir.as_deref())
            .await
            .context("Failed to load configuration")?;

        let registry = ParserRegistry::with_builtins(config.parser_options());
        let resolver = Arc::new(SettingsResolver::new(roots.clone(), config.history_section()));
        let engine = EditEngine::new(registry, resolver);

        Ok(Self {
            roots,
            config,
            sources,
            engine,
        })
    }

    /// Absolute path for a file argument.
    pub fn file(&self, file: &Path) -> PathBuf {
        kpath::absolute(file)
    }

    /// Key style for a command, `--flat` overriding the configured one.
    pub fn key_style(&self, flat: bool) -> KeyStyle {
        if flat {
            KeyStyle::Flat
        } else {
            self.config.key_style()
        }
    }

    /// Parse a key argument; a leading '/' marks a JSON pointer.
    pub fn key_path(&self, raw: &str, flat: bool) -> anyhow::Result<KeyPath> {
        let path = if raw.starts_with('/') {
            KeyPath::from_pointer(raw)?
        } else {
            KeyPath::parse(raw, self.key_style(flat))?
        };
        Ok(path)
    }

    pub fn apply_options(&self, sort: bool) -> ApplyOptions {
        ApplyOptions {
            sort_keys: sort || self.config.sort_keys(),
            comparator: None,
        }
    }
}

/// `NAME=PATH`, or a bare `PATH` named after its last component.
fn parse_root(cwd: &Path, index: usize, spec: &str) -> anyhow::Result<WorkspaceRoot> {
    let (name, path) = match spec.split_once('=') {
        Some((name, path)) => (Some(name.trim()), path.trim()),
        None => (None, spec.trim()),
    };
    if path.is_empty() {
        bail!("Empty root path in '{spec}'");
    }
    let path = kpath::normalize(&cwd.join(path));
    Ok(match name {
        Some(name) if !name.is_empty() => WorkspaceRoot::new(name, index, path),
        _ => WorkspaceRoot::from_path(index, path),
    })
}
