// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! Forsyning CLI - scheduled meter data from Danish utility providers.
//!
//! # Examples
//!
//! ```bash
//! # Create an entry
//! forsyning config init home --connector Aalborg --username me --password secret
//!
//! # Fetch once and print the readings
//! forsyning fetch --entry home
//!
//! # Run every configured entry on its schedule
//! forsyning run
//!
//! # List connectors
//! forsyning connectors --format json
//! ```

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{config, connectors, fetch, run};

// ============================================================================
// CLI Definition
// ============================================================================

/// Forsyning CLI - utility meter data on a schedule.
#[derive(Parser)]
#[command(name = "forsyning")]
#[command(about = "Scheduled meter-data fetching for Danish utility providers")]
#[command(long_about = r"
Forsyning logs in to a utility provider, reads every meter on the account and
keeps today's (and, where published, tomorrow's) readings up to date.

Supported connectors:
  • Aalborg Forsyning (aalborg_forsyning, region: Aalborg)

Examples:
  forsyning config init home --connector Aalborg --username me --password secret
  forsyning fetch --entry home
  forsyning run
")]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Config file (defaults to the user config dir).
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (debug logging).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (no logging).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run every configured entry on its schedule until Ctrl+C.
    #[command(visible_alias = "r")]
    Run(run::RunArgs),

    /// Fetch once and print the readings.
    #[command(visible_alias = "f")]
    Fetch(fetch::FetchArgs),

    /// List available connectors.
    #[command(visible_alias = "c")]
    Connectors,

    /// Manage configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
pub enum ExitCode {
    /// General error.
    Error = 1,
}

impl Cli {
    /// Config store for the selected (or default) config file.
    pub async fn config_store(&self) -> Result<forsyning_store::ConfigStore> {
        let store = match &self.config {
            Some(path) => forsyning_store::ConfigStore::load(path.clone()).await?,
            None => forsyning_store::ConfigStore::load_default().await?,
        };
        Ok(store)
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("forsyning=debug,info")
        } else {
            EnvFilter::new("forsyning=info,warn")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Run(args) => run::run(args, &cli).await,
        Commands::Fetch(args) => fetch::run(args, &cli).await,
        Commands::Connectors => connectors::run(&cli),
        Commands::Config(args) => config::run(args, &cli).await,
    };

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(ExitCode::Error as i32);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use forsyning_store::EntryConfig;
    use tempfile::TempDir;

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::parse_from(["forsyning", "-v", "run", "--no-initial-fetch", "-e", "home"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Run(args) => {
                assert!(args.no_initial_fetch);
                assert_eq!(args.entry, vec!["home".to_string()]);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_fetch_connector_requires_credentials() {
        let result = Cli::try_parse_from(["forsyning", "fetch", "--connector", "Aalborg"]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_config_store_uses_config_flag() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let cli = Cli::parse_from([
            "forsyning",
            "--config",
            path.to_str().unwrap(),
            "--format",
            "json",
            "connectors",
        ]);
        assert_eq!(cli.format, OutputFormat::Json);

        let store = cli.config_store().await.unwrap();
        assert!(store.get().await.entries.is_empty());

        store
            .add_entry(EntryConfig::new("home", "Aalborg", "user", "secret"))
            .await
            .unwrap();
        store.save().await.unwrap();

        let reloaded = cli.config_store().await.unwrap();
        assert_eq!(store.path(), &path);
        assert!(reloaded.get().await.entry("home").is_some());
    }
}
