//! Document command handlers.
//!
//! Handles reading values, writing batches, and printing source maps.

use super::Workspace;
use anyhow::{bail, Context};
use keyloom_document::{get_path, KeyLocation, PendingWrite, Scalar};
use serde_json::{json, Value};
use std::path::Path;

/// Print the value at `key`.
pub async fn handle_get(
    workspace: &Workspace,
    file: &Path,
    key: &str,
    flat: bool,
    json: bool,
) -> anyhow::Result<()> {
    let file = workspace.file(file);
    let keypath = workspace.key_path(key, flat)?;
    let tree = workspace.engine.load(&file).await?;

    let Some(value) = get_path(&tree, &keypath) else {
        bail!("Key not found: {key}");
    };
    match value {
        Value::String(s) if !json => println!("{s}"),
        other => println!("{}", serde_json::to_string_pretty(other)?),
    }
    Ok(())
}

/// Apply `KEY=VALUE` assignments as one batch.
pub async fn handle_set(
    workspace: &Workspace,
    file: &Path,
    assignments: &[String],
    flat: bool,
    sort: bool,
    json: bool,
) -> anyhow::Result<()> {
    let file = workspace.file(file);
    let writes = assignments
        .iter()
        .map(|assignment| {
            let (key, raw) = assignment
                .split_once('=')
                .with_context(|| format!("Expected KEY=VALUE, got '{assignment}'"))?;
            Ok(PendingWrite::new(workspace.key_path(key.trim(), flat)?, Scalar::infer(raw)))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut tree = workspace.engine.load(&file).await?;
    let outcome = workspace
        .engine
        .apply(&file, &mut tree, writes, &workspace.apply_options(sort))
        .await
        .with_context(|| format!("Failed to update {}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }
    println!(
        "Updated {} ({} write{}, {:?})",
        file.display(),
        outcome.writes,
        if outcome.writes == 1 { "" } else { "s" },
        outcome.strategy
    );
    if let Some(backup) = &outcome.backup {
        println!("Backup: {}", backup.id);
    }
    Ok(())
}

/// Print every leaf key with its position.
pub async fn handle_keys(workspace: &Workspace, file: &Path, json: bool) -> anyhow::Result<()> {
    let file = workspace.file(file);
    let text = workspace.engine.read_text(&file).await?;
    let locations = workspace.engine.source_map(&file).await?;

    if json {
        let entries: Vec<Value> = locations.iter().map(|l| location_json(&text, l)).collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    for location in &locations {
        let (line, column) = line_column(&text, location.start);
        println!("{}\t{}:{}", location.key, line, column);
    }
    Ok(())
}

/// Print the span of one key's value.
pub async fn handle_locate(
    workspace: &Workspace,
    file: &Path,
    key: &str,
    flat: bool,
    json: bool,
) -> anyhow::Result<()> {
    let file = workspace.file(file);
    let text = workspace.engine.read_text(&file).await?;
    let Some(location) = workspace
        .engine
        .locate(&file, key, workspace.key_style(flat))
        .await?
    else {
        bail!("Key not found: {key}");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&location_json(&text, &location))?);
    } else {
        let (line, column) = line_column(&text, location.start);
        println!(
            "{} bytes {}..{} line {} column {}",
            location.key, location.start, location.end, line, column
        );
    }
    Ok(())
}

/// Print the parsed document serialized again.
pub async fn handle_dump(workspace: &Workspace, file: &Path, sort: bool) -> anyhow::Result<()> {
    let file = workspace.file(file);
    let parser = workspace.engine.parser_for(&file)?;
    let tree = workspace.engine.load(&file).await?;
    print!("{}", parser.dump(&tree, sort || workspace.config.sort_keys(), None)?);
    Ok(())
}

fn location_json(text: &str, location: &KeyLocation) -> Value {
    let (line, column) = line_column(text, location.start);
    json!({
        "key": location.key,
        "start": location.start,
        "end": location.end,
        "quoted": location.quoted,
        "line": line,
        "column": column,
    })
}

/// 1-based line and character column of a byte offset.
fn line_column(text: &str, offset: usize) -> (usize, usize) {
    let before = &text[..offset.min(text.len())];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    (line, before[line_start..].chars().count() + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_column() {
        let text = "{\n  \"a\": \"é1\"\n}";
        assert_eq!(line_column(text, 0), (1, 1));
        assert_eq!(line_column(text, 4), (2, 3));
        assert_eq!(line_column(text, text.len()), (3, 2));
    }
}
