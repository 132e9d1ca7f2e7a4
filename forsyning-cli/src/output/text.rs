//! Text output formatting with colors.

use chrono::Local;
use forsyning_connectors::ConnectorDescriptor;
use forsyning_core::{CachedDataset, MeterId, MeterReadings};
use forsyning_store::EntryConfig;
use forsyning_sync::{RetryReason, UpdateOutcome};
use std::collections::BTreeMap;

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Header line for the connector list.
    pub fn format_connectors_header(&self) -> String {
        self.bold(&format!(
            "{:<20} {:<20} {:<12} {:<8} {}",
            "ID", "NAME", "REGIONS", "SCAN", "NEXT-DAY"
        ))
    }

    /// One connector row.
    pub fn format_connector_line(&self, desc: &ConnectorDescriptor) -> String {
        let publish = desc
            .publish_time
            .map_or_else(|| self.dim("none"), |t| t.format("%H:%M").to_string());
        let scan = format!("{}h", desc.scan_interval.as_secs() / 3600);
        format!(
            "{:<20} {:<20} {:<12} {:<8} {}",
            desc.id,
            desc.display_name,
            desc.regions.join(","),
            scan,
            publish
        )
    }

    /// Cached dataset of one entry, with optional cost-adjusted values.
    pub fn format_dataset(
        &self,
        entry: &str,
        dataset: &CachedDataset,
        adjusted: Option<&BTreeMap<MeterId, BTreeMap<String, f64>>>,
    ) -> String {
        let mut lines = Vec::new();

        let source = dataset.source.as_deref().unwrap_or("no data");
        lines.push(format!("{} ({})", self.bold(entry), source));

        if let Some(at) = dataset.last_updated {
            lines.push(self.dim(&format!(
                "  Updated {}",
                at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
            )));
        }

        match &dataset.today {
            Some(today) => {
                lines.push("  Today:".to_string());
                lines.extend(self.format_readings(today, adjusted));
            }
            None => lines.push(format!("  Today: {}", self.yellow("none"))),
        }

        let tomorrow = match (&dataset.tomorrow, dataset.tomorrow_valid) {
            (Some(t), true) => format!("{} meter(s)", t.len()),
            (Some(_), false) => self.yellow("stale"),
            (None, _) => self.dim("not published"),
        };
        lines.push(format!("  Tomorrow: {tomorrow}"));

        lines.join("\n")
    }

    fn format_readings(
        &self,
        readings: &MeterReadings,
        adjusted: Option<&BTreeMap<MeterId, BTreeMap<String, f64>>>,
    ) -> Vec<String> {
        let mut lines = Vec::new();
        for (meter, reading) in readings.iter() {
            lines.push(format!("    Meter {}", self.bold(meter.as_str())));
            let meter_adjusted = adjusted.and_then(|a| a.get(meter));
            for (key, value) in reading.fields() {
                let shown = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                match meter_adjusted.and_then(|a| a.get(key)) {
                    Some(cost) => lines.push(format!(
                        "      {key:<24} {shown:<16} {}",
                        self.green(&format!("→ {cost:.2}"))
                    )),
                    None => lines.push(format!("      {key:<24} {shown}")),
                }
            }
        }
        lines
    }

    /// One-line update outcome.
    pub fn format_outcome(&self, outcome: &UpdateOutcome) -> String {
        match outcome {
            UpdateOutcome::Updated {
                tomorrow_valid: true,
            } => self.green("✓ Updated (with next-day data)"),
            UpdateOutcome::Updated {
                tomorrow_valid: false,
            } => self.green("✓ Updated"),
            UpdateOutcome::NotYetPublished => {
                self.green("✓ Updated (next-day data not published yet)")
            }
            UpdateOutcome::RetryScheduled {
                delay,
                retry_count,
                reason,
            } => {
                let why = match reason {
                    RetryReason::Failure { message, .. } => message.clone(),
                    RetryReason::MissingTomorrow => "next-day data missing".to_string(),
                };
                self.red(&format!(
                    "✗ {why} (attempt {retry_count}, retrying in {} min)",
                    delay.as_secs() / 60
                ))
            }
            UpdateOutcome::Coalesced => self.dim("update already pending"),
            UpdateOutcome::TornDown => self.dim("stopped"),
        }
    }

    /// Entry config with the password masked.
    pub fn format_entry(&self, entry: &EntryConfig) -> String {
        let mut lines = vec![
            format!("{} ({})", self.bold(&entry.entry_id), entry.name),
            format!("  Connector:   {}", entry.connector),
            format!("  Username:    {}", entry.username),
            "  Password:    ***".to_string(),
            format!("  Time zone:   {}", entry.time_zone),
            format!("  Fetch hour:  {:02}:xx", entry.fetch_hour),
            format!(
                "  Retry:       {} min, max {} min",
                entry.retry_base_minutes, entry.retry_ceiling_minutes
            ),
            format!("  Interval:    {}", if entry.interval_poll { "on" } else { "off" }),
        ];
        if let Some(template) = &entry.cost_template {
            lines.push(format!("  Template:    {template}"));
        }
        if let Err(e) = entry.validate() {
            lines.push(self.red(&format!("  Invalid:     {e} ({})", e.error_key())));
        }
        lines.join("\n")
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }
}
