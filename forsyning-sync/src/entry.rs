//! Entry lifecycle: set up a configured account, run it, unload it.

use chrono::{DateTime, Timelike};
use chrono_tz::Tz;
use forsyning_connectors::ConnectorRegistry;
use forsyning_core::{CostTemplate, MeterId};
use forsyning_fetch::{BackoffPolicy, FetchContext, HttpClient};
use forsyning_store::{EntryConfig, SignalHub};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::clock::Clock;
use crate::coordinator::{RefreshCoordinator, UpdateOutcome};
use crate::error::SyncError;
use crate::scheduler::{ScheduleConfig, Scheduler};

/// One running entry.
#[derive(Debug)]
pub struct Entry {
    config: EntryConfig,
    template: Option<CostTemplate>,
    coordinator: RefreshCoordinator,
    scheduler: Scheduler,
}

impl Entry {
    /// Validates `config`, wires the connector pipeline to a coordinator and
    /// starts the scheduled tasks.
    ///
    /// No fetch happens here; the first update comes from the schedule or
    /// an explicit [`refresh`](Self::refresh). When `http` is `None` a client
    /// restricted to the connectors' hosts is created.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or no connector
    /// serves the entry's selector.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[instrument(skip_all, fields(entry = %config.entry_id))]
    pub fn setup(
        config: EntryConfig,
        hub: &SignalHub,
        http: Option<Arc<HttpClient>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SyncError> {
        info!(version = env!("CARGO_PKG_VERSION"), "Forsyning starting");

        config.validate()?;
        let tz = config.tz()?;
        let template = config.template()?;

        let descriptors = ConnectorRegistry::for_selector(&config.connector);
        if descriptors.is_empty() {
            return Err(SyncError::NoConnectors(config.connector.to_string()));
        }

        let http = match http {
            Some(http) => http,
            None => Arc::new(
                HttpClient::with_timeout(config.http_timeout())?
                    .with_allowed_domains(ConnectorRegistry::allowed_domains(&config.connector)),
            ),
        };
        let ctx = FetchContext::builder()
            .http(http)
            .timeout(config.http_timeout())
            .time_zone(tz)
            .build()?;

        let pipeline = ConnectorRegistry::pipeline(&config.connector, &config.credentials());
        let mut builder = RefreshCoordinator::builder(config.entry_id.clone(), pipeline)
            .context(ctx)
            .policy(BackoffPolicy::from_minutes(
                config.retry_base_minutes,
                config.retry_ceiling_minutes,
            ))
            .signal(hub.signal(&config.entry_id))
            .clock(clock);
        for descriptor in &descriptors {
            builder = builder.profile(
                descriptor.id,
                descriptor.display_name,
                descriptor.publish_time,
            );
        }
        let coordinator = builder.build()?;

        let mut schedule = ScheduleConfig::randomized(config.fetch_hour);
        if let Some(primary) = descriptors.first().filter(|_| config.interval_poll) {
            schedule = schedule.with_interval(primary.scan_interval);
        }
        let scheduler = Scheduler::new(coordinator.clone(), schedule);
        scheduler.start();

        info!(
            connectors = ?descriptors.iter().map(|d| d.id).collect::<Vec<_>>(),
            signal = %coordinator.signal().name(),
            "Entry set up"
        );

        Ok(Self {
            config,
            template,
            coordinator,
            scheduler,
        })
    }

    /// Entry id.
    pub fn entry_id(&self) -> &str {
        &self.config.entry_id
    }

    /// Entry configuration.
    pub fn config(&self) -> &EntryConfig {
        &self.config
    }

    /// The entry's coordinator.
    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// The entry's scheduler.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Next daily fetch in local time.
    pub fn next_data_refresh(&self) -> DateTime<Tz> {
        self.scheduler.next_data_refresh()
    }

    /// Runs an update now.
    pub async fn refresh(&self) -> UpdateOutcome {
        self.coordinator.refresh().await
    }

    /// Today's readings with the cost template applied at the current local
    /// hour. `None` when no template is configured.
    pub async fn adjusted_today(&self) -> Option<BTreeMap<MeterId, BTreeMap<String, f64>>> {
        let template = self.template.as_ref()?;
        let hour = self
            .coordinator
            .clock()
            .now()
            .with_timezone(&self.coordinator.time_zone())
            .hour();
        Some(self.coordinator.dataset().adjusted_today(template, hour).await)
    }

    /// Stops every scheduled task and pending retry and drops the signal.
    #[instrument(skip_all, fields(entry = %self.config.entry_id))]
    pub async fn unload(self, hub: &SignalHub) {
        self.coordinator.teardown().await;
        hub.remove(&self.config.entry_id);
        info!("Entry unloaded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use forsyning_store::ConfigError;

    fn config() -> EntryConfig {
        EntryConfig::new("home", "Aalborg", "user", "secret")
    }

    #[tokio::test]
    async fn test_setup_and_unload() {
        let hub = SignalHub::new();
        let mut config = config();
        config.interval_poll = true;

        let entry = Entry::setup(config, &hub, None, Arc::new(SystemClock)).unwrap();
        assert_eq!(entry.entry_id(), "home");
        assert_eq!(hub.names(), vec!["forsyning_update_home".to_string()]);
        assert_eq!(entry.scheduler().tasks().len(), 4);
        assert_eq!(entry.scheduler().config().fetch_hour, 13);
        assert!(entry.adjusted_today().await.is_none());

        let coordinator = entry.coordinator().clone();
        entry.unload(&hub).await;
        assert!(!coordinator.is_alive());
        assert!(hub.names().is_empty());
    }

    #[tokio::test]
    async fn test_setup_rejects_invalid_config() {
        let hub = SignalHub::new();
        let mut config = config();
        config.time_zone = "Mars/Olympus".into();

        let err = Entry::setup(config, &hub, None, Arc::new(SystemClock)).unwrap_err();
        assert!(matches!(err, SyncError::Config(ConfigError::InvalidTimeZone(_))));
        assert!(hub.names().is_empty());
    }

    #[tokio::test]
    async fn test_setup_rejects_unknown_connector() {
        let hub = SignalHub::new();
        let config = EntryConfig::new("home", "Odense", "user", "secret");

        let err = Entry::setup(config, &hub, None, Arc::new(SystemClock)).unwrap_err();
        assert!(matches!(err, SyncError::Config(ConfigError::UnknownConnector(_))));
    }
}
