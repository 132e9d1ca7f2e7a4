//! JSON output formatting.

use anyhow::Result;
use chrono::{DateTime, Utc};
use forsyning_connectors::ConnectorDescriptor;
use forsyning_core::{CachedDataset, ConfigField, MeterId, MeterReadings};
use forsyning_store::EntryConfig;
use forsyning_sync::Phase;
use serde::Serialize;
use std::collections::BTreeMap;

// ============================================================================
// Output Types
// ============================================================================

/// Connector info output.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorOutput {
    pub id: String,
    pub display_name: String,
    pub regions: Vec<String>,
    pub scan_interval_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_time: Option<String>,
    pub fields: Vec<ConfigField>,
}

impl From<&ConnectorDescriptor> for ConnectorOutput {
    fn from(desc: &ConnectorDescriptor) -> Self {
        Self {
            id: desc.id.to_string(),
            display_name: desc.display_name.to_string(),
            regions: desc.regions.iter().map(|r| (*r).to_string()).collect(),
            scan_interval_secs: desc.scan_interval.as_secs(),
            publish_time: desc.publish_time.map(|t| t.format("%H:%M").to_string()),
            fields: desc.config_fields(),
        }
    }
}

/// Dataset output for one entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetOutput {
    pub entry: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    pub tomorrow_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub today: Option<MeterReadings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tomorrow: Option<MeterReadings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjusted: Option<BTreeMap<MeterId, BTreeMap<String, f64>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

impl DatasetOutput {
    /// Builds the output from a cached dataset.
    pub fn new(entry: &str, dataset: CachedDataset) -> Self {
        Self {
            entry: entry.to_string(),
            source: dataset.source,
            last_updated: dataset.last_updated,
            tomorrow_valid: dataset.tomorrow_valid,
            today: dataset.today,
            tomorrow: dataset.tomorrow,
            adjusted: None,
            phase: None,
        }
    }

    /// Adds cost-adjusted values.
    pub fn with_adjusted(
        mut self,
        adjusted: Option<BTreeMap<MeterId, BTreeMap<String, f64>>>,
    ) -> Self {
        self.adjusted = adjusted;
        self
    }

    /// Adds the coordinator phase.
    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(format!("{phase:?}").to_lowercase());
        self
    }
}

/// Entry config output with the password masked.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryOutput {
    pub entry_id: String,
    pub name: String,
    pub connector: String,
    pub username: String,
    pub password: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_template: Option<String>,
    pub time_zone: String,
    pub fetch_hour: u32,
    pub retry_base_minutes: u64,
    pub retry_ceiling_minutes: u64,
    pub http_timeout_secs: u64,
    pub interval_poll: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&EntryConfig> for EntryOutput {
    fn from(entry: &EntryConfig) -> Self {
        Self {
            entry_id: entry.entry_id.clone(),
            name: entry.name.clone(),
            connector: entry.connector.to_string(),
            username: entry.username.clone(),
            password: "***",
            cost_template: entry.cost_template.clone(),
            time_zone: entry.time_zone.clone(),
            fetch_hour: entry.fetch_hour,
            retry_base_minutes: entry.retry_base_minutes,
            retry_ceiling_minutes: entry.retry_ceiling_minutes,
            http_timeout_secs: entry.http_timeout_secs,
            interval_poll: entry.interval_poll,
            error: entry.validate().err().map(|e| e.error_key().to_string()),
        }
    }
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats the connector list.
    pub fn format_connectors(&self, descriptors: &[ConnectorDescriptor]) -> Result<String> {
        let outputs: Vec<ConnectorOutput> = descriptors.iter().map(ConnectorOutput::from).collect();
        self.format(&outputs)
    }

    /// Formats entry configs; passwords are masked.
    pub fn format_entries(&self, entries: &[EntryConfig]) -> Result<String> {
        let outputs: Vec<EntryOutput> = entries.iter().map(EntryOutput::from).collect();
        self.format(&outputs)
    }
}
