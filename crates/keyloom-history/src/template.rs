//! Storage path templates.
//!
//! A template may start with `${workspaceFolder}` (the file's own root),
//! `${workspaceFolder:<index>}` or `${workspaceFolder:<name>}`. A leading `~`
//! expands to the home directory and `%VAR%` to the environment value.

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

static WORKSPACE_REGEX: OnceLock<Regex> = OnceLock::new();
static ENV_REGEX: OnceLock<Regex> = OnceLock::new();
static UNKNOWN_REGEX: OnceLock<Regex> = OnceLock::new();

fn workspace_regex() -> &'static Regex {
    WORKSPACE_REGEX.get_or_init(|| {
        Regex::new(r"(?i)\$\{\s*workspaceFolder(?:\s*:\s*([^}]*?))?\s*\}")
            .expect("Invalid regex pattern - this is a compile-time constant")
    })
}

fn env_regex() -> &'static Regex {
    ENV_REGEX.get_or_init(|| {
        Regex::new(r"%([^%]+)%").expect("Invalid regex pattern - this is a compile-time constant")
    })
}

fn unknown_regex() -> &'static Regex {
    UNKNOWN_REGEX.get_or_init(|| {
        Regex::new(r"\$\{[^}]*\}").expect("Invalid regex pattern - this is a compile-time constant")
    })
}

/// An open project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceRoot {
    pub name: String,
    pub index: usize,
    pub path: PathBuf,
}

impl WorkspaceRoot {
    pub fn new(name: impl Into<String>, index: usize, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            index,
            path: path.into(),
        }
    }

    /// A root named after its directory.
    pub fn from_path(index: usize, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: keyloom_util::path::basename(&path),
            index,
            path,
        }
    }
}

/// Everything a template may refer to. Resolution reads nothing else.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    pub current_root: Option<&'a WorkspaceRoot>,
    pub roots: &'a [WorkspaceRoot],
    pub home: Option<&'a Path>,
    pub env: &'a HashMap<String, String>,
}

/// Template resolution failures. Each one disables history for the file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("${{workspaceFolder}} must start the history path: {template}")]
    MisplacedVariable { template: String },

    #[error("workspace folder not found: {selector}")]
    RootNotFound { selector: String },

    #[error("cannot resolve {variable} in history path")]
    UnresolvedVariable { variable: String },
}

/// Resolve `template` to a concrete path string.
pub fn resolve(template: &str, ctx: &TemplateContext<'_>) -> Result<String, TemplateError> {
    let mut occurrences = workspace_regex().captures_iter(template);
    let (prefix, rest) = match occurrences.next() {
        Some(caps) => {
            let whole = caps.get(0).map(|m| (m.start(), m.end(), m.as_str()));
            let Some((start, end, text)) = whole else {
                return Err(TemplateError::UnresolvedVariable {
                    variable: template.to_string(),
                });
            };
            if start != 0 || occurrences.next().is_some() {
                return Err(TemplateError::MisplacedVariable {
                    template: template.to_string(),
                });
            }
            let selector = caps
                .get(1)
                .map(|m| m.as_str().trim())
                .filter(|s| !s.is_empty());
            let root = match selector {
                None => ctx.current_root.ok_or_else(|| TemplateError::UnresolvedVariable {
                    variable: text.to_string(),
                })?,
                Some(selector) => {
                    find_root(ctx.roots, selector).ok_or_else(|| TemplateError::RootNotFound {
                        selector: selector.to_string(),
                    })?
                }
            };
            (Some(root.path.to_string_lossy().into_owned()), &template[end..])
        }
        None => (None, template),
    };

    if let Some(unknown) = unknown_regex().find(rest) {
        return Err(TemplateError::UnresolvedVariable {
            variable: unknown.as_str().to_string(),
        });
    }

    let rest = env_regex().replace_all(rest, |caps: &regex::Captures<'_>| {
        ctx.env.get(&caps[1]).cloned().unwrap_or_default()
    });

    match prefix {
        Some(prefix) => Ok(format!("{prefix}{rest}")),
        None => expand_home(&rest, ctx.home),
    }
}

fn find_root<'a>(roots: &'a [WorkspaceRoot], selector: &str) -> Option<&'a WorkspaceRoot> {
    match selector.parse::<usize>() {
        Ok(index) => roots.iter().find(|root| root.index == index),
        Err(_) => roots.iter().find(|root| root.name == selector),
    }
}

fn expand_home(path: &str, home: Option<&Path>) -> Result<String, TemplateError> {
    let Some(tail) = path.strip_prefix('~') else {
        return Ok(path.to_string());
    };
    if !(tail.is_empty() || tail.starts_with('/') || tail.starts_with('\\')) {
        return Ok(path.to_string());
    }
    let home = home.ok_or_else(|| TemplateError::UnresolvedVariable {
        variable: "~".to_string(),
    })?;
    Ok(format!("{}{}", home.display(), tail))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roots() -> Vec<WorkspaceRoot> {
        vec![
            WorkspaceRoot::new("web", 0, "/work/web"),
            WorkspaceRoot::new("api", 1, "/work/api"),
        ]
    }

    fn resolve_with(template: &str, current: Option<usize>) -> Result<String, TemplateError> {
        let roots = roots();
        let mut env = HashMap::new();
        env.insert("APPDATA".to_string(), "/appdata".to_string());
        let ctx = TemplateContext {
            current_root: current.map(|i| &roots[i]),
            roots: &roots,
            home: Some(Path::new("/home/dev")),
            env: &env,
        };
        resolve(template, &ctx)
    }

    #[test]
    fn test_plain_path_unchanged() {
        assert_eq!(resolve_with("/var/history", None).unwrap(), "/var/history");
    }

    #[test]
    fn test_current_workspace_folder() {
        assert_eq!(
            resolve_with("${workspaceFolder}/backups", Some(1)).unwrap(),
            "/work/api/backups"
        );
        assert_eq!(
            resolve_with("${WorkspaceFolder }", Some(0)).unwrap(),
            "/work/web"
        );
    }

    #[test]
    fn test_workspace_folder_without_current_root() {
        let err = resolve_with("${workspaceFolder}/x", None).unwrap_err();
        assert!(matches!(err, TemplateError::UnresolvedVariable { .. }));
    }

    #[test]
    fn test_selector_by_index_and_name() {
        assert_eq!(resolve_with("${workspaceFolder:1}", None).unwrap(), "/work/api");
        assert_eq!(
            resolve_with("${workspaceFolder: web}/h", None).unwrap(),
            "/work/web/h"
        );
    }

    #[test]
    fn test_selector_not_found() {
        let err = resolve_with("${workspaceFolder:2}", Some(0)).unwrap_err();
        assert_eq!(
            err,
            TemplateError::RootNotFound {
                selector: "2".to_string()
            }
        );
        assert!(resolve_with("${workspaceFolder:docs}", Some(0)).is_err());
    }

    #[test]
    fn test_misplaced_variable() {
        let err = resolve_with("/backups/${workspaceFolder}", Some(0)).unwrap_err();
        assert!(matches!(err, TemplateError::MisplacedVariable { .. }));
        let err = resolve_with("${workspaceFolder}/${workspaceFolder:1}", Some(0)).unwrap_err();
        assert!(matches!(err, TemplateError::MisplacedVariable { .. }));
    }

    #[test]
    fn test_unknown_variable() {
        let err = resolve_with("/x/${userHome}", None).unwrap_err();
        assert_eq!(
            err,
            TemplateError::UnresolvedVariable {
                variable: "${userHome}".to_string()
            }
        );
    }

    #[test]
    fn test_home_and_env_expansion() {
        assert_eq!(resolve_with("~/.history", None).unwrap(), "/home/dev/.history");
        assert_eq!(resolve_with("~other", None).unwrap(), "~other");
        assert_eq!(resolve_with("%APPDATA%/h", None).unwrap(), "/appdata/h");
        assert_eq!(resolve_with("%MISSING%/h", None).unwrap(), "/h");
    }
}
