//! Meter data types.
//!
//! Connectors normalize provider responses into [`MeterReadings`]: one
//! [`MeterReading`] per [`MeterId`]. The reading keeps the provider's own
//! field names since each utility reports a different set of registers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Meter Id
// ============================================================================

/// Provider-assigned meter identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeterId(String);

impl MeterId {
    /// Creates a meter id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MeterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MeterId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// Meter Reading
// ============================================================================

/// Raw reading object returned by a provider for one meter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeterReading(Map<String, Value>);

impl MeterReading {
    /// Creates an empty reading.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a reading from a JSON object.
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Returns a raw field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns a field as a number.
    ///
    /// Numeric strings are accepted since some providers quote values.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().replace(',', ".").parse().ok(),
            _ => None,
        }
    }

    /// Sets a field.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Iterates over all fields.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Returns true if the reading has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// Meter Readings
// ============================================================================

/// Readings keyed by meter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeterReadings(BTreeMap<MeterId, MeterReading>);

impl MeterReadings {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the reading for a meter.
    pub fn insert(&mut self, meter: MeterId, reading: MeterReading) {
        self.0.insert(meter, reading);
    }

    /// Returns the reading for a meter.
    pub fn get(&self, meter: &MeterId) -> Option<&MeterReading> {
        self.0.get(meter)
    }

    /// Iterates over readings in meter order.
    pub fn iter(&self) -> impl Iterator<Item = (&MeterId, &MeterReading)> {
        self.0.iter()
    }

    /// Returns the number of meters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no meter has a reading.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(MeterId, MeterReading)> for MeterReadings {
    fn from_iter<T: IntoIterator<Item = (MeterId, MeterReading)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ============================================================================
// Connector Payload
// ============================================================================

/// Data returned by one successful connector update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorPayload {
    /// Id of the connector that produced the payload.
    pub connector_id: String,
    /// Readings for the current calendar day.
    pub today: MeterReadings,
    /// Readings for the next calendar day, once the provider publishes them.
    pub tomorrow: Option<MeterReadings>,
}

impl ConnectorPayload {
    /// Creates a payload with only today's readings.
    pub fn today_only(connector_id: impl Into<String>, today: MeterReadings) -> Self {
        Self {
            connector_id: connector_id.into(),
            today,
            tomorrow: None,
        }
    }

    /// Attaches tomorrow's readings.
    #[must_use]
    pub fn with_tomorrow(mut self, tomorrow: MeterReadings) -> Self {
        self.tomorrow = Some(tomorrow);
        self
    }

    /// Returns true if the payload carries readings for today.
    pub fn has_today(&self) -> bool {
        !self.today.is_empty()
    }

    /// Returns tomorrow's readings if present and non-empty.
    pub fn valid_tomorrow(&self) -> Option<&MeterReadings> {
        self.tomorrow.as_ref().filter(|t| !t.is_empty())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reading(value: Value) -> MeterReading {
        match value {
            Value::Object(map) => MeterReading::from_map(map),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_number_accepts_quoted_values() {
        let r = reading(json!({"Energy": 12.5, "Volume": "3,25", "Unit": "kWh"}));
        assert_eq!(r.number("Energy"), Some(12.5));
        assert_eq!(r.number("Volume"), Some(3.25));
        assert_eq!(r.number("Unit"), None);
        assert_eq!(r.number("Missing"), None);
    }

    #[test]
    fn test_valid_tomorrow_ignores_empty() {
        let mut today = MeterReadings::new();
        today.insert(MeterId::from("1"), MeterReading::new());

        let payload = ConnectorPayload::today_only("test", today.clone());
        assert!(payload.valid_tomorrow().is_none());

        let payload = payload.with_tomorrow(MeterReadings::new());
        assert!(payload.valid_tomorrow().is_none());

        let payload = ConnectorPayload::today_only("test", today.clone()).with_tomorrow(today);
        assert!(payload.valid_tomorrow().is_some());
    }

    #[test]
    fn test_readings_keep_meter_order() {
        let readings: MeterReadings = [("b", 2), ("a", 1)]
            .into_iter()
            .map(|(id, v)| (MeterId::from(id), reading(json!({"v": v}))))
            .collect();
        let ids: Vec<_> = readings.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
