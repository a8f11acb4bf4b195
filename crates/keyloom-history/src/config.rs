//! Typed `localHistory` configuration.
//!
//! The section arrives as untyped JSON. [`HistoryConfig::from_value`] reads
//! it field by field: a value of the wrong type keeps the default and yields a
//! [`ConfigWarning`] instead of failing.

use chrono::Duration;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Globs excluded from history unless configured otherwise.
pub const DEFAULT_EXCLUDE: &[&str] = &[
    "**/.history/**",
    "**/.vscode/**",
    "**/node_modules/**",
    "**/typings/**",
    "**/out/**",
];

/// When history is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryEnabled {
    Never,
    /// Also for files outside every open root.
    Always,
    /// Only for files inside an open root.
    #[default]
    Workspace,
}

impl HistoryEnabled {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => match n.as_u64()? {
                0 => Some(Self::Never),
                1 => Some(Self::Always),
                2 => Some(Self::Workspace),
                _ => None,
            },
            Value::String(s) => match s.to_lowercase().as_str() {
                "never" => Some(Self::Never),
                "always" => Some(Self::Always),
                "workspace" | "workspaceonly" => Some(Self::Workspace),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Age and count limits for one file's backup directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicy {
    pub max_age_hours: u64,
    pub max_count: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age_hours: 24,
            max_count: 10,
        }
    }
}

impl RetentionPolicy {
    pub fn max_age(&self) -> Duration {
        i64::try_from(self.max_age_hours)
            .ok()
            .and_then(Duration::try_hours)
            .unwrap_or_else(|| Duration::days(36_500))
    }
}

/// A configuration value that was ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
}

impl ConfigWarning {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "localHistory {}", self.message)
        } else {
            write!(f, "localHistory.{} {}", self.field, self.message)
        }
    }
}

/// Validated `localHistory` settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryConfig {
    pub enabled: HistoryEnabled,
    /// Storage location template.
    pub path: Option<String>,
    pub absolute: bool,
    /// Display horizon of the history views, and the cutoff for `purge`.
    pub days_limit: u64,
    /// Seconds to wait before the retention sweep after a snapshot.
    pub save_delay: u64,
    pub max_display: usize,
    pub exclude: Vec<String>,
    pub date_locale: Option<String>,
    pub backup: RetentionPolicy,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: HistoryEnabled::default(),
            path: None,
            absolute: false,
            days_limit: 30,
            save_delay: 0,
            max_display: 10,
            exclude: DEFAULT_EXCLUDE.iter().map(|s| s.to_string()).collect(),
            date_locale: None,
            backup: RetentionPolicy::default(),
        }
    }
}

impl HistoryConfig {
    /// Read the raw section. Absent fields and `null` keep their defaults.
    pub fn from_value(value: &Value) -> (Self, Vec<ConfigWarning>) {
        let mut config = Self::default();
        let mut warnings = Vec::new();

        let section = match value {
            Value::Object(section) => section,
            Value::Null => return (config, warnings),
            _ => {
                warnings.push(ConfigWarning::new("", "must be an object"));
                return (config, warnings);
            }
        };

        if let Some(enabled) = present(section, "enabled") {
            match HistoryEnabled::from_value(enabled) {
                Some(parsed) => config.enabled = parsed,
                None => warnings.push(ConfigWarning::new(
                    "enabled",
                    "must be a number (0 never, 1 always, 2 workspace) or one of \"never\", \"always\", \"workspace\"",
                )),
            }
        }

        if let Some(path) = read_string(section, "", "path", &mut warnings) {
            config.path = Some(path).filter(|p| !p.trim().is_empty());
        }
        if let Some(absolute) = read_bool(section, "", "absolute", &mut warnings) {
            config.absolute = absolute;
        }
        if let Some(days) = read_count(section, "", "daysLimit", &mut warnings).filter(|d| *d > 0) {
            config.days_limit = days;
        }
        if let Some(delay) = read_count(section, "", "saveDelay", &mut warnings) {
            config.save_delay = delay;
        }
        if let Some(max) = read_count(section, "", "maxDisplay", &mut warnings).filter(|m| *m > 0) {
            config.max_display = usize::try_from(max).unwrap_or(usize::MAX);
        }
        if let Some(locale) = read_string(section, "", "dateLocale", &mut warnings) {
            config.date_locale = Some(locale).filter(|l| !l.is_empty());
        }

        if let Some(exclude) = present(section, "exclude") {
            match exclude {
                Value::Array(items) => {
                    let globs: Vec<String> = items
                        .iter()
                        .filter_map(|item| item.as_str().map(str::to_string))
                        .collect();
                    if globs.len() != items.len() {
                        warnings.push(ConfigWarning::new("exclude", "must contain only strings"));
                    }
                    config.exclude = globs;
                }
                _ => warnings.push(ConfigWarning::new("exclude", "must be an array")),
            }
        }

        if let Some(backup) = present(section, "backup") {
            match backup {
                Value::Object(backup) => {
                    if let Some(hours) =
                        read_count(backup, "backup.", "maxAgeHours", &mut warnings).filter(|h| *h > 0)
                    {
                        config.backup.max_age_hours = hours;
                    }
                    if let Some(count) =
                        read_count(backup, "backup.", "maxCount", &mut warnings).filter(|c| *c > 0)
                    {
                        config.backup.max_count = usize::try_from(count).unwrap_or(usize::MAX);
                    }
                }
                _ => warnings.push(ConfigWarning::new("backup", "must be an object")),
            }
        }

        (config, warnings)
    }
}

fn present<'a>(section: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    section.get(field).filter(|v| !v.is_null())
}

fn read_string(
    section: &Map<String, Value>,
    prefix: &str,
    field: &str,
    warnings: &mut Vec<ConfigWarning>,
) -> Option<String> {
    let value = present(section, field)?;
    match value.as_str() {
        Some(s) => Some(s.to_string()),
        None => {
            warnings.push(ConfigWarning::new(format!("{prefix}{field}"), "must be a string"));
            None
        }
    }
}

fn read_bool(
    section: &Map<String, Value>,
    prefix: &str,
    field: &str,
    warnings: &mut Vec<ConfigWarning>,
) -> Option<bool> {
    let value = present(section, field)?;
    match value.as_bool() {
        Some(b) => Some(b),
        None => {
            warnings.push(ConfigWarning::new(format!("{prefix}{field}"), "must be a boolean"));
            None
        }
    }
}

fn read_count(
    section: &Map<String, Value>,
    prefix: &str,
    field: &str,
    warnings: &mut Vec<ConfigWarning>,
) -> Option<u64> {
    let value = present(section, field)?;
    match value.as_u64() {
        Some(n) => Some(n),
        None => {
            warnings.push(ConfigWarning::new(
                format!("{prefix}{field}"),
                "must be a non-negative integer",
            ));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let (config, warnings) = HistoryConfig::from_value(&Value::Null);
        assert!(warnings.is_empty());
        assert_eq!(config.enabled, HistoryEnabled::Workspace);
        assert_eq!(config.days_limit, 30);
        assert_eq!(config.save_delay, 0);
        assert_eq!(config.max_display, 10);
        assert_eq!(config.exclude.len(), DEFAULT_EXCLUDE.len());
        assert_eq!(config.backup, RetentionPolicy { max_age_hours: 24, max_count: 10 });
    }

    #[test]
    fn test_full_section() {
        let (config, warnings) = HistoryConfig::from_value(&json!({
            "enabled": "always",
            "path": "${workspaceFolder}/.cache",
            "absolute": true,
            "daysLimit": 7,
            "saveDelay": 2,
            "maxDisplay": 25,
            "exclude": ["**/dist/**"],
            "dateLocale": "fr-FR",
            "backup": {"maxAgeHours": 48, "maxCount": 3}
        }));
        assert!(warnings.is_empty());
        assert_eq!(config.enabled, HistoryEnabled::Always);
        assert_eq!(config.path.as_deref(), Some("${workspaceFolder}/.cache"));
        assert!(config.absolute);
        assert_eq!(config.days_limit, 7);
        assert_eq!(config.save_delay, 2);
        assert_eq!(config.max_display, 25);
        assert_eq!(config.exclude, vec!["**/dist/**".to_string()]);
        assert_eq!(config.date_locale.as_deref(), Some("fr-FR"));
        assert_eq!(config.backup.max_count, 3);
        assert_eq!(config.backup.max_age(), Duration::hours(48));
    }

    #[test]
    fn test_numeric_enabled() {
        let (config, _) = HistoryConfig::from_value(&json!({"enabled": 0}));
        assert_eq!(config.enabled, HistoryEnabled::Never);
        let (config, _) = HistoryConfig::from_value(&json!({"enabled": 1}));
        assert_eq!(config.enabled, HistoryEnabled::Always);
    }

    #[test]
    fn test_wrong_types_fall_back_with_warnings() {
        let (config, warnings) = HistoryConfig::from_value(&json!({
            "enabled": true,
            "exclude": "**/dist/**",
            "maxDisplay": "many"
        }));
        assert_eq!(config.enabled, HistoryEnabled::Workspace);
        assert_eq!(config.exclude.len(), DEFAULT_EXCLUDE.len());
        assert_eq!(config.max_display, 10);

        let fields: Vec<_> = warnings.iter().map(|w| w.field.as_str()).collect();
        assert_eq!(fields, vec!["enabled", "maxDisplay", "exclude"]);
        assert!(warnings[2].to_string().starts_with("localHistory.exclude"));
    }

    #[test]
    fn test_backup_warnings_are_qualified() {
        let (config, warnings) = HistoryConfig::from_value(&json!({"backup": {"maxCount": -1}}));
        assert_eq!(config.backup.max_count, 10);
        assert_eq!(warnings[0].field, "backup.maxCount");
    }

    #[test]
    fn test_zero_limits_keep_defaults() {
        let (config, warnings) = HistoryConfig::from_value(&json!({"daysLimit": 0, "maxDisplay": 0}));
        assert!(warnings.is_empty());
        assert_eq!(config.days_limit, 30);
        assert_eq!(config.max_display, 10);
    }

    #[test]
    fn test_non_object_section() {
        let (config, warnings) = HistoryConfig::from_value(&json!([1, 2]));
        assert_eq!(config, HistoryConfig::default());
        assert_eq!(warnings.len(), 1);
    }
}
