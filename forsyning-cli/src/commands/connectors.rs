//! Connectors command - list available connectors.

use anyhow::Result;
use forsyning_connectors::ConnectorRegistry;
use tracing::info;

use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Runs the connectors command.
pub fn run(cli: &Cli) -> Result<()> {
    info!("Listing connectors");

    let connectors = ConnectorRegistry::list_available();

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);

            println!("{}", formatter.format_connectors_header());
            println!("{}", "─".repeat(72));

            for desc in connectors {
                println!("{}", formatter.format_connector_line(desc));
            }

            println!();
            println!("Total: {} connector(s)", connectors.len());
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format_connectors(connectors)?);
        }
    }

    Ok(())
}
