//! History command handlers.
//!
//! Handles listing, showing, diffing, restoring and purging backups.

use super::Workspace;
use chrono::{DateTime, Utc};
use clap::Subcommand;
use std::path::PathBuf;

/// History subcommands.
#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List backups of a file, newest first
    List {
        file: PathBuf,
        /// Ignore the maxDisplay cap
        #[arg(long)]
        all: bool,
    },
    /// Print the content of a backup
    Show {
        file: PathBuf,
        /// Backup ID
        id: String,
    },
    /// Diff a backup against the current file
    Diff { file: PathBuf, id: String },
    /// Replace the file with a backup
    Restore { file: PathBuf, id: String },
    /// Delete one backup
    Delete { file: PathBuf, id: String },
    /// Delete backups older than daysLimit
    Purge { file: PathBuf },
}

/// Handle history commands.
pub async fn handle_history(
    workspace: &Workspace,
    command: HistoryCommands,
    json: bool,
) -> anyhow::Result<()> {
    let store = workspace.engine.store();

    match command {
        HistoryCommands::List { file, all } => {
            let file = workspace.file(&file);
            let entries = if all {
                store.list(&file, None).await?
            } else {
                store.recent(&file).await?
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No backups found.");
            } else {
                let now = Utc::now();
                println!("{:<34} {:<20} {:<12}", "ID", "TAKEN", "AGE");
                println!("{}", "-".repeat(66));
                for entry in entries {
                    println!(
                        "{:<34} {:<20} {:<12}",
                        entry.id,
                        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        format_age(entry.timestamp, now)
                    );
                }
            }
        }
        HistoryCommands::Show { file, id } => {
            let file = workspace.file(&file);
            let entry = store.find(&file, &id).await?;
            print!("{}", store.read(&entry).await?);
        }
        HistoryCommands::Diff { file, id } => {
            let file = workspace.file(&file);
            print!("{}", store.diff(&file, &id).await?);
        }
        HistoryCommands::Restore { file, id } => {
            let file = workspace.file(&file);
            let previous = store.restore(&file, &id).await?;
            println!("Restored {} from {id}", file.display());
            if let Some(previous) = previous {
                println!("Previous content saved as {}", previous.id);
            }
        }
        HistoryCommands::Delete { file, id } => {
            let file = workspace.file(&file);
            store.delete(&file, &id).await?;
            println!("Backup deleted: {id}");
        }
        HistoryCommands::Purge { file } => {
            let file = workspace.file(&file);
            let removed = store.purge(&file).await?;
            println!("Removed {removed} backup(s)");
        }
    }

    Ok(())
}

/// Coarse age, e.g. `5m ago`.
fn format_age(taken: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(taken);
    if age.num_days() > 0 {
        format!("{}d ago", age.num_days())
    } else if age.num_hours() > 0 {
        format!("{}h ago", age.num_hours())
    } else if age.num_minutes() > 0 {
        format!("{}m ago", age.num_minutes())
    } else {
        "just now".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_age() {
        let now = Utc::now();
        assert_eq!(format_age(now, now), "just now");
        assert_eq!(format_age(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(format_age(now - Duration::hours(25), now), "1d ago");
    }
}
