//! Shared dataset cache.
//!
//! The refresh coordinator writes; sensors and the CLI read.

use chrono::{DateTime, Utc};
use forsyning_core::{CachedDataset, ConnectorPayload, CostTemplate, MeterId, TemplateVars};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Thread-safe handle to one entry's [`CachedDataset`].
#[derive(Debug, Clone, Default)]
pub struct DatasetStore {
    inner: Arc<RwLock<CachedDataset>>,
}

impl DatasetStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the cached dataset.
    pub async fn get(&self) -> CachedDataset {
        self.inner.read().await.clone()
    }

    /// Applies a successful payload. Returns the new `tomorrow_valid` flag.
    pub async fn apply(&self, payload: ConnectorPayload, source: &str, at: DateTime<Utc>) -> bool {
        let valid = self.inner.write().await.apply(payload, source, at);
        debug!(source, tomorrow_valid = valid, "Dataset updated");
        valid
    }

    /// Clears the `tomorrow_valid` flag after a failure.
    pub async fn invalidate_tomorrow(&self) {
        self.inner.write().await.invalidate_tomorrow();
    }

    /// Shifts tomorrow into today.
    pub async fn rollover(&self) {
        let mut dataset = self.inner.write().await;
        dataset.rollover();
        debug!(has_today = dataset.has_today(), "Dataset rolled over");
    }

    /// Applies `template` to every numeric field of today's readings.
    ///
    /// Fields whose evaluation fails are left out.
    pub async fn adjusted_today(
        &self,
        template: &CostTemplate,
        hour: u32,
    ) -> BTreeMap<MeterId, BTreeMap<String, f64>> {
        let dataset = self.inner.read().await;
        let Some(today) = dataset.today.as_ref() else {
            return BTreeMap::new();
        };

        today
            .iter()
            .map(|(meter, reading)| {
                let values = reading
                    .fields()
                    .filter_map(|(key, _)| {
                        let raw = reading.number(key)?;
                        match template.evaluate(TemplateVars::new(raw, hour)) {
                            Ok(v) => Some((key.clone(), v)),
                            Err(e) => {
                                warn!(meter = %meter, field = %key, error = %e, "Template failed");
                                None
                            }
                        }
                    })
                    .collect();
                (meter.clone(), values)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forsyning_core::{MeterReading, MeterReadings};

    fn payload(energy: f64, with_tomorrow: bool) -> ConnectorPayload {
        let mut reading = MeterReading::new();
        reading.insert("Energy", serde_json::json!(energy));
        reading.insert("MeterNumber", serde_json::json!("111"));
        let today: MeterReadings = std::iter::once((MeterId::from("111"), reading.clone())).collect();
        let payload = ConnectorPayload::today_only("aalborg_forsyning", today.clone());
        if with_tomorrow {
            payload.with_tomorrow(today)
        } else {
            payload
        }
    }

    #[tokio::test]
    async fn test_apply_and_invalidate() {
        let store = DatasetStore::new();
        assert!(store.apply(payload(1.0, true), "Aalborg Forsyning", Utc::now()).await);

        store.invalidate_tomorrow().await;
        let dataset = store.get().await;
        assert!(!dataset.tomorrow_valid);
        assert!(dataset.tomorrow.is_some());
        assert_eq!(dataset.source.as_deref(), Some("Aalborg Forsyning"));
    }

    #[tokio::test]
    async fn test_rollover_twice() {
        let store = DatasetStore::new();
        store.apply(payload(1.0, true), "x", Utc::now()).await;

        store.rollover().await;
        assert!(store.get().await.today.is_some());

        store.rollover().await;
        let dataset = store.get().await;
        assert!(dataset.today.is_none());
        assert!(dataset.tomorrow.is_none());
    }

    #[tokio::test]
    async fn test_adjusted_today() {
        let store = DatasetStore::new();
        let template = CostTemplate::validate("{{ value * 2 + hour }}").unwrap();
        assert!(store.adjusted_today(&template, 3).await.is_empty());

        store.apply(payload(10.0, false), "x", Utc::now()).await;
        let adjusted = store.adjusted_today(&template, 3).await;

        let fields = &adjusted[&MeterId::from("111")];
        assert_eq!(fields["Energy"], 23.0);
        assert_eq!(fields["MeterNumber"], 225.0);
    }
}
