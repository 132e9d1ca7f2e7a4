//! Run command - keep every entry current until Ctrl+C.

use anyhow::Result;
use clap::Args;
use forsyning_store::SignalHub;
use forsyning_sync::{Entry, RefreshCoordinator, SystemClock};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::output::{DatasetOutput, JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Only run these entries.
    #[arg(long, short)]
    pub entry: Vec<String>,

    /// Wait for the first scheduled fetch instead of fetching at startup.
    #[arg(long)]
    pub no_initial_fetch: bool,
}

/// Runs the run command.
pub async fn run(args: &RunArgs, cli: &Cli) -> Result<()> {
    let store = cli.config_store().await?;
    let config = store.get().await;
    let hub = SignalHub::new();

    let mut entries = Vec::new();
    for entry_config in config
        .entries
        .into_iter()
        .filter(|e| args.entry.is_empty() || args.entry.contains(&e.entry_id))
    {
        let entry_id = entry_config.entry_id.clone();
        match Entry::setup(entry_config, &hub, None, Arc::new(SystemClock)) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!(entry = %entry_id, error = %e, "Skipping entry"),
        }
    }
    if entries.is_empty() {
        anyhow::bail!("No runnable entries; check `forsyning config validate`");
    }

    let printers: Vec<JoinHandle<()>> = entries
        .iter()
        .map(|entry| {
            tokio::spawn(print_changes(
                entry.coordinator().clone(),
                entry.config().name.clone(),
                cli.format,
                cli.pretty,
                !cli.no_color,
            ))
        })
        .collect();

    if !args.no_initial_fetch {
        let outcomes = futures::future::join_all(entries.iter().map(Entry::refresh)).await;
        let formatter = TextFormatter::new(false);
        for (entry, outcome) in entries.iter().zip(&outcomes) {
            info!(entry = %entry.entry_id(), "{}", formatter.format_outcome(outcome));
        }
    }

    for entry in &entries {
        info!(
            entry = %entry.entry_id(),
            next = %entry.next_data_refresh().format("%Y-%m-%d %H:%M:%S %Z"),
            "Next data refresh"
        );
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    for printer in printers {
        printer.abort();
    }
    for entry in entries {
        entry.unload(&hub).await;
    }

    Ok(())
}

/// Prints the dataset whenever it changes.
async fn print_changes(
    coordinator: RefreshCoordinator,
    name: String,
    format: OutputFormat,
    pretty: bool,
    use_colors: bool,
) {
    let mut rx = coordinator.signal().subscribe();
    let mut last = coordinator.dataset().get().await;

    while rx.changed().await.is_ok() {
        let dataset = coordinator.dataset().get().await;
        if dataset == last {
            continue;
        }
        last = dataset.clone();

        match format {
            OutputFormat::Text => {
                let formatter = TextFormatter::new(use_colors);
                println!("{}\n", formatter.format_dataset(&name, &dataset, None));
            }
            OutputFormat::Json => {
                let output = DatasetOutput::new(coordinator.entry_id(), dataset)
                    .with_phase(coordinator.phase());
                match JsonFormatter::new(pretty).format(&output) {
                    Ok(json) => println!("{json}"),
                    Err(e) => warn!(error = %e, "Could not format dataset"),
                }
            }
        }
    }
}
