//! Keyloom - key-path editing of JSON-family documents with local history.
//!
//! This is the main entry point for the keyloom CLI.

mod commands;

use clap::{Parser, Subcommand};
use commands::{HistoryCommands, Workspace};
use keyloom_util::log::{LogConfig, LogLevel};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "keyloom")]
#[command(author, version, about = "Key-path editing of JSON documents with local history", long_about = None)]
struct Cli {
    /// Project root as NAME=PATH or PATH (repeatable, defaults to the current directory)
    #[arg(long = "root", value_name = "NAME=PATH", global = true)]
    roots: Vec<String>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the value at a key
    Get {
        file: PathBuf,
        /// Dotted key path, or a JSON pointer starting with '/'
        key: String,
        /// Treat the key as a single segment
        #[arg(long)]
        flat: bool,
    },
    /// Write one or more values
    Set {
        file: PathBuf,
        /// Assignments as KEY=VALUE; VALUE is JSON when it parses as a scalar
        #[arg(required = true, value_name = "KEY=VALUE")]
        assignments: Vec<String>,
        #[arg(long)]
        flat: bool,
        /// Sort keys if the file has to be rewritten in full
        #[arg(long)]
        sort: bool,
    },
    /// List every leaf key with its span
    Keys { file: PathBuf },
    /// Print the span of one key's value
    Locate {
        file: PathBuf,
        key: String,
        #[arg(long)]
        flat: bool,
    },
    /// Print the document re-serialized
    Dump {
        file: PathBuf,
        /// Sort keys
        #[arg(long)]
        sort: bool,
    },
    /// Show the effective history settings for a file
    Settings { file: PathBuf },
    /// Inspect and restore backups
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;
    let workspace = Workspace::open(&cwd, &cli.roots).await?;

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        workspace
            .config
            .log_level
            .as_deref()
            .and_then(LogLevel::parse)
            .unwrap_or(LogLevel::Warn)
    };
    keyloom_util::log::init(LogConfig {
        level,
        ..LogConfig::default()
    });
    tracing::debug!(roots = ?workspace.roots, sources = ?workspace.sources, "Workspace opened");

    let json = cli.json;
    let result = match cli.command {
        Commands::Get { file, key, flat } => commands::handle_get(&workspace, &file, &key, flat, json).await,
        Commands::Set {
            file,
            assignments,
            flat,
            sort,
        } => commands::handle_set(&workspace, &file, &assignments, flat, sort, json).await,
        Commands::Keys { file } => commands::handle_keys(&workspace, &file, json).await,
        Commands::Locate { file, key, flat } => {
            commands::handle_locate(&workspace, &file, &key, flat, json).await
        }
        Commands::Dump { file, sort } => commands::handle_dump(&workspace, &file, sort).await,
        Commands::Settings { file } => commands::handle_settings(&workspace, &file).await,
        Commands::History { command } => commands::handle_history(&workspace, command, json).await,
    };

    workspace.engine.flush().await;
    result
}
