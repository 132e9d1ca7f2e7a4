//! Entry configuration and its persistent store.
//!
//! An entry is one configured account at one provider. The config file holds
//! every entry; the store validates changes before accepting them.

use chrono_tz::Tz;
use forsyning_connectors::{ConnectorRegistry, Credentials};
use forsyning_core::{CostTemplate, ProviderSelector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, StoreError};
use crate::persistence::{default_config_path, load_json, save_json};

// ============================================================================
// Defaults
// ============================================================================

/// Default entry name.
pub const DEFAULT_NAME: &str = "Forsyning";

/// Default IANA time zone.
pub const DEFAULT_TIME_ZONE: &str = "Europe/Copenhagen";

/// Default local hour of the daily fetch.
pub const DEFAULT_FETCH_HOUR: u32 = 13;

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_time_zone() -> String {
    DEFAULT_TIME_ZONE.to_string()
}

fn default_fetch_hour() -> u32 {
    DEFAULT_FETCH_HOUR
}

fn default_retry_base() -> u64 {
    15
}

fn default_retry_ceiling() -> u64 {
    60
}

fn default_http_timeout() -> u64 {
    30
}

// ============================================================================
// Entry Config
// ============================================================================

/// Configuration of one entry.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryConfig {
    /// Unique id; also keys the update signal.
    pub entry_id: String,

    /// Human-readable name.
    #[serde(default = "default_name")]
    pub name: String,

    /// Connector id, display name or region.
    pub connector: ProviderSelector,

    /// Account username.
    #[serde(default)]
    pub username: String,

    /// Account password.
    #[serde(default)]
    pub password: String,

    /// Optional cost-adjustment template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_template: Option<String>,

    /// IANA time zone for all schedule and publish-time calculations.
    #[serde(default = "default_time_zone")]
    pub time_zone: String,

    /// Local hour of the daily fetch.
    #[serde(default = "default_fetch_hour")]
    pub fetch_hour: u32,

    /// Retry delay per consecutive failure, in minutes.
    #[serde(default = "default_retry_base")]
    pub retry_base_minutes: u64,

    /// Maximum retry delay, in minutes.
    #[serde(default = "default_retry_ceiling")]
    pub retry_ceiling_minutes: u64,

    /// HTTP request timeout, in seconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Also poll at the connector's scan interval.
    #[serde(default)]
    pub interval_poll: bool,
}

impl EntryConfig {
    /// Creates an entry with default settings.
    pub fn new(
        entry_id: impl Into<String>,
        connector: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            entry_id: entry_id.into(),
            name: default_name(),
            connector: ProviderSelector::new(connector),
            username: username.into(),
            password: password.into(),
            cost_template: None,
            time_zone: default_time_zone(),
            fetch_hour: DEFAULT_FETCH_HOUR,
            retry_base_minutes: default_retry_base(),
            retry_ceiling_minutes: default_retry_ceiling(),
            http_timeout_secs: default_http_timeout(),
            interval_poll: false,
        }
    }

    /// Checks every field, stopping at the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entry_id.trim().is_empty() {
            return Err(ConfigError::MissingField("entry_id"));
        }
        if self.connector.as_str().trim().is_empty() {
            return Err(ConfigError::MissingField("connector"));
        }
        if ConnectorRegistry::for_selector(&self.connector).is_empty() {
            return Err(ConfigError::UnknownConnector(self.connector.to_string()));
        }
        if self.username.trim().is_empty() {
            return Err(ConfigError::MissingField("username"));
        }
        if self.password.is_empty() {
            return Err(ConfigError::MissingField("password"));
        }
        self.tz()?;
        if self.fetch_hour > 23 {
            return Err(ConfigError::InvalidHour(self.fetch_hour));
        }
        if self.retry_base_minutes == 0 || self.retry_ceiling_minutes < self.retry_base_minutes {
            return Err(ConfigError::InvalidRetry {
                base: self.retry_base_minutes,
                ceiling: self.retry_ceiling_minutes,
            });
        }
        self.template()?;
        Ok(())
    }

    /// Parses the configured time zone.
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.time_zone
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimeZone(self.time_zone.clone()))
    }

    /// Parses and validates the cost template, if any.
    pub fn template(&self) -> Result<Option<CostTemplate>, ConfigError> {
        match self.cost_template.as_deref() {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => Ok(Some(CostTemplate::validate(s)?)),
        }
    }

    /// Account credentials for the connector constructor.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }

    /// HTTP request timeout.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl fmt::Debug for EntryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryConfig")
            .field("entry_id", &self.entry_id)
            .field("name", &self.name)
            .field("connector", &self.connector)
            .field("username", &self.username)
            .field("password", &"***")
            .field("cost_template", &self.cost_template)
            .field("time_zone", &self.time_zone)
            .field("fetch_hour", &self.fetch_hour)
            .field("retry_base_minutes", &self.retry_base_minutes)
            .field("retry_ceiling_minutes", &self.retry_ceiling_minutes)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("interval_poll", &self.interval_poll)
            .finish()
    }
}

// ============================================================================
// Config File
// ============================================================================

/// Contents of the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForsyningConfig {
    /// Configured entries.
    #[serde(default)]
    pub entries: Vec<EntryConfig>,
}

impl ForsyningConfig {
    /// Finds an entry by id.
    pub fn entry(&self, entry_id: &str) -> Option<&EntryConfig> {
        self.entries.iter().find(|e| e.entry_id == entry_id)
    }
}

// ============================================================================
// Config Store
// ============================================================================

/// Persistent config store with change notifications.
pub struct ConfigStore {
    config: Arc<RwLock<ForsyningConfig>>,
    path: PathBuf,
    notify: watch::Sender<u64>,
}

impl ConfigStore {
    /// Creates an empty store backed by `path`.
    pub fn new(path: PathBuf) -> Self {
        let (notify, _) = watch::channel(0);
        Self {
            config: Arc::new(RwLock::new(ForsyningConfig::default())),
            path,
            notify,
        }
    }

    /// Loads the config from the default path.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed.
    pub async fn load_default() -> Result<Self, StoreError> {
        Self::load(default_config_path()).await
    }

    /// Loads the config from `path`; a missing file yields an empty config.
    ///
    /// Invalid entries are kept so they can be shown and fixed, but a warning
    /// is logged for each.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed.
    pub async fn load(path: PathBuf) -> Result<Self, StoreError> {
        let config: ForsyningConfig = if tokio::fs::try_exists(&path).await? {
            info!(path = %path.display(), "Loading config");
            load_json(&path).await?
        } else {
            debug!(path = %path.display(), "Config file not found, starting empty");
            ForsyningConfig::default()
        };

        for entry in &config.entries {
            if let Err(e) = entry.validate() {
                warn!(entry = %entry.entry_id, error = %e, key = e.error_key(), "Invalid entry");
            }
        }

        let (notify, _) = watch::channel(0);
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            path,
            notify,
        })
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Gets a copy of the current config.
    pub async fn get(&self) -> ForsyningConfig {
        self.config.read().await.clone()
    }

    /// Gets a copy of one entry.
    pub async fn entry(&self, entry_id: &str) -> Option<EntryConfig> {
        self.config.read().await.entry(entry_id).cloned()
    }

    /// Adds a new entry after validating it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if validation fails and
    /// [`StoreError::DuplicateEntry`] if the id is taken.
    pub async fn add_entry(&self, entry: EntryConfig) -> Result<(), StoreError> {
        entry.validate()?;
        {
            let mut config = self.config.write().await;
            if config.entry(&entry.entry_id).is_some() {
                return Err(StoreError::DuplicateEntry(entry.entry_id));
            }
            info!(entry = %entry.entry_id, connector = %entry.connector, "Entry added");
            config.entries.push(entry);
        }
        self.notify_change();
        Ok(())
    }

    /// Replaces an existing entry after validating the new version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if validation fails and
    /// [`StoreError::EntryNotFound`] if there is no entry with that id.
    pub async fn update_entry(&self, entry: EntryConfig) -> Result<(), StoreError> {
        entry.validate()?;
        {
            let mut config = self.config.write().await;
            let slot = config
                .entries
                .iter_mut()
                .find(|e| e.entry_id == entry.entry_id)
                .ok_or_else(|| StoreError::EntryNotFound(entry.entry_id.clone()))?;
            *slot = entry;
        }
        self.notify_change();
        Ok(())
    }

    /// Removes an entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EntryNotFound`] if there is no entry with that id.
    pub async fn remove_entry(&self, entry_id: &str) -> Result<EntryConfig, StoreError> {
        let removed = {
            let mut config = self.config.write().await;
            let idx = config
                .entries
                .iter()
                .position(|e| e.entry_id == entry_id)
                .ok_or_else(|| StoreError::EntryNotFound(entry_id.to_string()))?;
            config.entries.remove(idx)
        };
        info!(entry = %entry_id, "Entry removed");
        self.notify_change();
        Ok(removed)
    }

    /// Saves the config to disk.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub async fn save(&self) -> Result<(), StoreError> {
        let config = self.config.read().await;
        save_json(&self.path, &*config).await?;
        info!(path = %self.path.display(), "Config saved");
        Ok(())
    }

    /// Subscribes to config changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.notify.subscribe()
    }

    fn notify_change(&self) {
        self.notify.send_modify(|v| *v += 1);
    }
}

// ============================================================================
// Tests
// ============================================================================
