//! Effective history settings for a file.

use super::Workspace;
use serde_json::json;
use std::path::Path;

/// Print the resolved settings, where backups of `file` go, and whether it is
/// excluded.
pub async fn handle_settings(workspace: &Workspace, file: &Path) -> anyhow::Result<()> {
    let file = workspace.file(file);
    let settings = workspace.engine.settings().get(&file).await;

    let report = json!({
        "file": file,
        "settings": &*settings,
        "historyDir": settings.history_dir(&file),
        "excluded": settings.is_excluded(&file),
        "configSources": workspace.sources,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
