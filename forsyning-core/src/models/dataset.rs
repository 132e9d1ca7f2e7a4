//! The today/tomorrow cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::meter::{ConnectorPayload, MeterReadings};

/// Cached readings owned by a refresh coordinator.
///
/// `today` is authoritative for the current calendar day. `tomorrow` is only
/// flagged valid after a successful update delivered it; failures and
/// rollovers clear the flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedDataset {
    /// Readings for the current day.
    pub today: Option<MeterReadings>,
    /// Readings for the next day.
    pub tomorrow: Option<MeterReadings>,
    /// Whether `tomorrow` came from the latest successful update.
    pub tomorrow_valid: bool,
    /// Display name of the connector behind the latest success.
    pub source: Option<String>,
    /// When the latest successful update completed.
    pub last_updated: Option<DateTime<Utc>>,
}

impl CachedDataset {
    /// Creates an empty dataset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cache with a successful payload.
    ///
    /// Returns the resulting `tomorrow_valid` flag.
    pub fn apply(
        &mut self,
        payload: ConnectorPayload,
        source: impl Into<String>,
        at: DateTime<Utc>,
    ) -> bool {
        let tomorrow = payload.valid_tomorrow().cloned();
        self.tomorrow_valid = tomorrow.is_some();
        self.today = Some(payload.today);
        self.tomorrow = tomorrow;
        self.source = Some(source.into());
        self.last_updated = Some(at);
        self.tomorrow_valid
    }

    /// Marks tomorrow's readings as not trustworthy after a failed update.
    pub fn invalidate_tomorrow(&mut self) {
        self.tomorrow_valid = false;
    }

    /// Shifts tomorrow into today at the day boundary.
    ///
    /// Safe on an empty cache: rolling over twice leaves both days empty.
    pub fn rollover(&mut self) {
        self.today = self.tomorrow.take();
        self.tomorrow_valid = false;
    }

    /// Returns true if readings for today are cached.
    pub fn has_today(&self) -> bool {
        self.today.as_ref().is_some_and(|t| !t.is_empty())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::meter::{MeterId, MeterReading};

    fn readings(id: &str) -> MeterReadings {
        let mut r = MeterReadings::new();
        r.insert(MeterId::from(id), MeterReading::new());
        r
    }

    #[test]
    fn test_apply_with_tomorrow_sets_valid() {
        let mut ds = CachedDataset::new();
        let payload = ConnectorPayload::today_only("c", readings("a")).with_tomorrow(readings("b"));

        assert!(ds.apply(payload, "Source", Utc::now()));
        assert!(ds.tomorrow_valid);
        assert_eq!(ds.source.as_deref(), Some("Source"));
    }

    #[test]
    fn test_apply_without_tomorrow_clears_previous() {
        let mut ds = CachedDataset::new();
        ds.apply(
            ConnectorPayload::today_only("c", readings("a")).with_tomorrow(readings("b")),
            "S",
            Utc::now(),
        );
        ds.apply(ConnectorPayload::today_only("c", readings("a")), "S", Utc::now());

        assert!(!ds.tomorrow_valid);
        assert!(ds.tomorrow.is_none());
    }

    #[test]
    fn test_rollover_twice_empties_cache() {
        let mut ds = CachedDataset::new();
        ds.apply(
            ConnectorPayload::today_only("c", readings("a")).with_tomorrow(readings("b")),
            "S",
            Utc::now(),
        );

        ds.rollover();
        assert_eq!(ds.today, Some(readings("b")));
        assert!(ds.tomorrow.is_none());
        assert!(!ds.tomorrow_valid);

        ds.rollover();
        assert!(ds.today.is_none());
        assert!(ds.tomorrow.is_none());
    }
}
