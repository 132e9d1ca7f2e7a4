//! Config command - manage entries.

use anyhow::Result;
use clap::{Args, Subcommand};
use forsyning_store::{EntryConfig, default_config_dir};
use tracing::info;

use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show configured entries (passwords masked).
    Show,

    /// Show configuration paths.
    Path,

    /// Add an entry.
    Init(InitArgs),

    /// Validate every entry.
    Validate,

    /// Remove an entry.
    Remove {
        /// Entry to remove.
        entry_id: String,
    },
}

/// Arguments for `config init`.
#[derive(Args)]
pub struct InitArgs {
    /// Unique entry id.
    pub entry_id: String,

    /// Connector id, display name or region.
    #[arg(long, default_value = "Aalborg")]
    pub connector: String,

    /// Account username.
    #[arg(long)]
    pub username: String,

    /// Account password.
    #[arg(long)]
    pub password: String,

    /// Display name.
    #[arg(long)]
    pub name: Option<String>,

    /// Cost template, e.g. "{{ value * 1.25 }}".
    #[arg(long)]
    pub cost_template: Option<String>,

    /// IANA time zone.
    #[arg(long)]
    pub time_zone: Option<String>,

    /// Local hour of the daily fetch.
    #[arg(long)]
    pub fetch_hour: Option<u32>,

    /// Also poll at the connector's scan interval.
    #[arg(long)]
    pub interval_poll: bool,
}

impl InitArgs {
    fn to_entry(&self) -> EntryConfig {
        let mut entry = EntryConfig::new(
            self.entry_id.clone(),
            self.connector.clone(),
            self.username.clone(),
            self.password.clone(),
        );
        if let Some(name) = &self.name {
            entry.name.clone_from(name);
        }
        entry.cost_template.clone_from(&self.cost_template);
        if let Some(tz) = &self.time_zone {
            entry.time_zone.clone_from(tz);
        }
        if let Some(hour) = self.fetch_hour {
            entry.fetch_hour = hour;
        }
        entry.interval_poll = self.interval_poll;
        entry
    }
}

/// Runs the config command.
pub async fn run(args: &ConfigArgs, cli: &Cli) -> Result<()> {
    match &args.action {
        ConfigAction::Show => show_config(cli).await,
        ConfigAction::Path => show_paths(cli).await,
        ConfigAction::Init(init) => init_entry(init, cli).await,
        ConfigAction::Validate => validate_config(cli).await,
        ConfigAction::Remove { entry_id } => remove_entry(entry_id, cli).await,
    }
}

async fn show_config(cli: &Cli) -> Result<()> {
    let store = cli.config_store().await?;
    let config = store.get().await;

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("Forsyning Configuration");
            println!("{}", "─".repeat(40));
            if config.entries.is_empty() {
                println!("No entries. Add one with `forsyning config init`.");
            }
            for entry in &config.entries {
                println!();
                println!("{}", formatter.format_entry(entry));
            }
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format_entries(&config.entries)?);
        }
    }

    Ok(())
}

async fn show_paths(cli: &Cli) -> Result<()> {
    let store = cli.config_store().await?;
    let config_dir = default_config_dir();

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration Paths");
            println!("{}", "─".repeat(40));
            println!();
            println!("Config dir:  {}", config_dir.display());
            println!("Config file: {}", store.path().display());
        }
        OutputFormat::Json => {
            let paths = serde_json::json!({
                "config_dir": config_dir.display().to_string(),
                "config_file": store.path().display().to_string(),
            });
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&paths)?);
        }
    }

    Ok(())
}

async fn init_entry(args: &InitArgs, cli: &Cli) -> Result<()> {
    let store = cli.config_store().await?;
    let entry = args.to_entry();

    if let Err(e) = entry.validate() {
        anyhow::bail!("{e} ({})", e.error_key());
    }
    store.add_entry(entry).await?;
    store.save().await?;

    info!(entry = %args.entry_id, "Entry created");
    println!("Created entry: {}", args.entry_id);

    Ok(())
}

async fn validate_config(cli: &Cli) -> Result<()> {
    let store = cli.config_store().await?;
    let config = store.get().await;

    let mut invalid = 0;
    for entry in &config.entries {
        match entry.validate() {
            Ok(()) => println!("✓ {}", entry.entry_id),
            Err(e) => {
                invalid += 1;
                println!("✗ {}: {e} ({})", entry.entry_id, e.error_key());
            }
        }
    }

    if invalid > 0 {
        anyhow::bail!("{invalid} of {} entries are invalid", config.entries.len());
    }
    Ok(())
}

async fn remove_entry(entry_id: &str, cli: &Cli) -> Result<()> {
    let store = cli.config_store().await?;
    store.remove_entry(entry_id).await?;
    store.save().await?;

    println!("Removed entry: {entry_id}");
    Ok(())
}
