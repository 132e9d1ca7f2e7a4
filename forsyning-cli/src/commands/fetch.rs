//! Fetch command - one-shot update without scheduling.

use anyhow::{Context, Result};
use chrono::{Timelike, Utc};
use clap::Args;
use forsyning_connectors::ConnectorRegistry;
use forsyning_fetch::{FetchContext, HttpClient};
use forsyning_store::{DatasetStore, EntryConfig};
use std::sync::Arc;
use tracing::{debug, info};

use crate::output::{DatasetOutput, JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the fetch command.
#[derive(Args)]
pub struct FetchArgs {
    /// Entry to fetch (defaults to the first configured entry).
    #[arg(long, short)]
    pub entry: Option<String>,

    /// Fetch with ad-hoc credentials instead of a configured entry.
    #[arg(long, requires_all = ["username", "password"])]
    pub connector: Option<String>,

    /// Account username (with --connector).
    #[arg(long)]
    pub username: Option<String>,

    /// Account password (with --connector).
    #[arg(long)]
    pub password: Option<String>,

    /// Cost template applied to today's values.
    #[arg(long)]
    pub cost_template: Option<String>,
}

async fn resolve_entry(args: &FetchArgs, cli: &Cli) -> Result<EntryConfig> {
    if let (Some(connector), Some(username), Some(password)) =
        (&args.connector, &args.username, &args.password)
    {
        return Ok(EntryConfig::new("adhoc", connector.clone(), username.clone(), password.clone()));
    }

    let config = cli.config_store().await?.get().await;
    let entry = match &args.entry {
        Some(id) => config.entry(id).cloned().with_context(|| format!("Unknown entry: {id}"))?,
        None => config
            .entries
            .first()
            .cloned()
            .context("No entries configured; run `forsyning config init` or pass --connector")?,
    };
    Ok(entry)
}

/// Runs the fetch command.
pub async fn run(args: &FetchArgs, cli: &Cli) -> Result<()> {
    let mut entry = resolve_entry(args, cli).await?;
    if args.cost_template.is_some() {
        entry.cost_template.clone_from(&args.cost_template);
    }
    if let Err(e) = entry.validate() {
        anyhow::bail!("{e} ({})", e.error_key());
    }

    info!(entry = %entry.entry_id, connector = %entry.connector, "Fetching");

    let tz = entry.tz()?;
    let http = HttpClient::with_timeout(entry.http_timeout())?
        .with_allowed_domains(ConnectorRegistry::allowed_domains(&entry.connector));
    let ctx = FetchContext::builder()
        .http(Arc::new(http))
        .time_zone(tz)
        .build()?;

    let pipeline = ConnectorRegistry::pipeline(&entry.connector, &entry.credentials());
    let outcome = pipeline.execute(&ctx).await;

    for attempt in &outcome.attempts {
        debug!(
            connector = %attempt.connector_id,
            success = attempt.success,
            duration_ms = attempt.duration.as_millis(),
            error = attempt.error.as_deref().unwrap_or(""),
            "Connector attempt"
        );
    }

    let payload = outcome.result?;
    let source = ConnectorRegistry::resolve(&payload.connector_id)
        .map_or_else(|| payload.connector_id.clone(), |d| d.display_name.to_string());

    let dataset = DatasetStore::new();
    let now = Utc::now();
    dataset.apply(payload, &source, now).await;

    let adjusted = match entry.template()? {
        Some(template) => {
            let hour = now.with_timezone(&tz).hour();
            Some(dataset.adjusted_today(&template, hour).await)
        }
        None => None,
    };

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!(
                "{}",
                formatter.format_dataset(&entry.name, &dataset.get().await, adjusted.as_ref())
            );
        }
        OutputFormat::Json => {
            let output = DatasetOutput::new(&entry.entry_id, dataset.get().await).with_adjusted(adjusted);
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&output)?);
        }
    }

    Ok(())
}
