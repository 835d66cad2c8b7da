//! # offline-cli
//!
//! CLI tool for inspecting and flushing an offline-first outbox.
//!
//! Updates are queued into a persisted outbox exactly as an offline app
//! would queue them, and flushed into a local JSON file standing in for
//! the remote store.
//!
//! ## Commands
//!
//! - `status`: Show the queued batch
//! - `queue`: Queue an update while offline
//! - `flush`: Commit the queued batch to the remote file
//! - `clear`: Drop the queued batch
//!
//! ## Example
//!
//! ```bash
//! # Queue two updates
//! offline-cli queue todos/1/title '"Buy milk"'
//! offline-cli queue todos/1/done false
//!
//! # Inspect, then commit
//! offline-cli status
//! offline-cli flush
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod remote;

use commands::{clear, flush, queue, status};
use config::Config;

/// CLI tool for inspecting and flushing an offline-first outbox.
#[derive(Parser, Debug)]
#[command(name = "offline-cli")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: ./offline.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory holding the outbox
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the queued batch
    Status,

    /// Queue an update while offline
    Queue {
        /// Slash-separated path to write
        path: String,

        /// JSON value (plain text is taken as a string); omit to delete
        value: Option<String>,
    },

    /// Commit the queued batch to the remote file
    Flush,

    /// Drop the queued batch without committing it
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::discover(cli.config.as_deref())?;

    // Determine data directory
    let data_dir = match cli.data_dir.or_else(|| config.paths.data_dir.clone()) {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;

    match cli.command {
        Commands::Status => {
            status::run(&data_dir, &config).await?;
        }
        Commands::Queue { path, value } => {
            queue::run(&data_dir, &config, &path, value.as_deref()).await?;
        }
        Commands::Flush => {
            flush::run(&data_dir, &config).await?;
        }
        Commands::Clear => {
            clear::run(&data_dir, &config).await?;
        }
    }

    Ok(())
}

/// Get the default data directory for offline-cli.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("dev", "offline-first", "offline-cli")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn queue_value_is_optional() {
        let cli = Cli::try_parse_from(["offline-cli", "queue", "a/b"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Queue { ref path, value: None } if path == "a/b"
        ));
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli =
            Cli::try_parse_from(["offline-cli", "status", "--data-dir", "/tmp/x"]).unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/x")));
    }
}
