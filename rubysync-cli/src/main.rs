//! rubysync - keeps the supported Ruby version catalog in step with upstream
//!
//! Main entry point: argument parsing, logging setup, and exit codes. All
//! pipeline logic lives in rubysync-core.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use tracing::error;
use tracing_subscriber::EnvFilter;

use rubysync_core::catalog::VersionCatalog;
use rubysync_core::events::TracingSink;
use rubysync_core::git::ProcessGit;
use rubysync_core::github::GitHubClient;
use rubysync_core::mutator;
use rubysync_core::source::{self, UpstreamSource};
use rubysync_core::sync::Synchronizer;

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "rubysync",
    about = "Keeps the supported Ruby version catalog in step with upstream and proposes the change as a single pull request",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Set log level
    #[clap(long, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Working directory holding the catalog and feature files
    #[clap(long, global = true)]
    workdir: Option<PathBuf>,

    /// GitHub token for API access and publishing
    #[clap(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[derive(Parser, Debug)]
enum Command {
    /// Discover new versions, apply them, and open the pull request
    Sync {
        /// Report what would be added without mutating or publishing
        #[clap(long)]
        dry_run: bool,
    },

    /// List upstream versions missing from the catalog
    Check,

    /// Apply a single version to the file set, without fetch or publish
    Add {
        /// Version to add (MAJOR.MINOR.PATCH)
        version: String,
    },
}

/// Initialize tracing from the --log-level flag; logs go to stderr.
fn initialize_tracing(log_level: &LogLevel) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level.to_filter_directive()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    initialize_tracing(&cli.log_level);

    let workdir = match cli.workdir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to resolve the current directory")?,
    };

    match cli.command {
        Command::Sync { dry_run } => sync_command(&workdir, cli.token, dry_run).await,
        Command::Check => check_command(&workdir, cli.token).await,
        Command::Add { version } => add_command(&version, &workdir),
    }
}

async fn sync_command(workdir: &PathBuf, token: Option<String>, dry_run: bool) -> Result<()> {
    let client = match GitHubClient::new(token.clone()) {
        Ok(client) => client,
        Err(err) => {
            error!("{err}");
            std::process::exit(1);
        }
    };

    let feed = UpstreamSource::new(client.clone());
    let git = ProcessGit::new(workdir);
    let sink = TracingSink;
    let synchronizer = Synchronizer::new(&feed, &git, &client, &sink);

    let outcome = match synchronizer.run(workdir, token.as_deref(), dry_run).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("{err}");
            eprintln!("\nError: {err}");
            std::process::exit(1);
        }
    };

    if outcome.new_versions.is_empty() {
        println!("Catalog is up to date; nothing to do.");
        return Ok(());
    }

    if outcome.dry_run {
        println!("Would add:");
        for version in &outcome.new_versions {
            println!("  {version}");
        }
        return Ok(());
    }

    for failure in &outcome.failures {
        println!("Failed to add {}: {}", failure.version, failure.message);
    }
    for version in &outcome.applied {
        println!("Added {version}");
    }
    if let Some(pull) = &outcome.pull_request {
        println!("Opened pull request #{}: {}", pull.number, pull.url);
    }

    Ok(())
}

#[derive(Tabled)]
struct VersionRow {
    #[tabled(rename = "New Version")]
    version: String,
}

async fn check_command(workdir: &PathBuf, token: Option<String>) -> Result<()> {
    let client = match GitHubClient::new(token) {
        Ok(client) => client,
        Err(err) => {
            error!("{err}");
            std::process::exit(1);
        }
    };
    let feed = UpstreamSource::new(client);
    let sink = TracingSink;

    let result = async {
        let catalog = VersionCatalog::load(&workdir.join(mutator::CATALOG_FILE))?;
        let available = source::fetch(&feed, catalog.lowest(), &sink).await?;
        Ok::<_, rubysync_core::SyncError>(catalog.diff(&available))
    }
    .await;

    let new_versions = match result {
        Ok(new_versions) => new_versions,
        Err(err) => {
            error!("{err}");
            eprintln!("\nError: {err}");
            std::process::exit(1);
        }
    };

    if new_versions.is_empty() {
        println!("Catalog is up to date.");
        return Ok(());
    }

    let rows: Vec<VersionRow> = new_versions
        .iter()
        .map(|v| VersionRow {
            version: v.to_string(),
        })
        .collect();

    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));
    println!("{table}");

    Ok(())
}

fn add_command(version: &str, workdir: &PathBuf) -> Result<()> {
    let sink = TracingSink;

    let outcome = match mutator::apply(version, workdir, &sink) {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("{err}");
            eprintln!("\nError: {err}");
            std::process::exit(1);
        }
    };

    println!("Added {version}");
    match (&outcome.new_default, &outcome.feature_version) {
        (Some(default), Some((old, new))) => {
            println!(
                "Default bumped {} -> {default}; feature version {old} -> {new}",
                outcome.previous_default
            );
        }
        _ => {
            println!(
                "Default {} unchanged; catalog-only update",
                outcome.previous_default
            );
        }
    }
    println!("Modified files:");
    for file in &outcome.files_modified {
        println!("  {file}");
    }

    Ok(())
}
