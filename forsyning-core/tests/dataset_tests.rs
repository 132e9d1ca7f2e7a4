//! Integration tests for the cached dataset.

use chrono::Utc;
use forsyning_core::{
    CachedDataset, ConnectorPayload, CostTemplate, MeterId, MeterReading, MeterReadings,
    TemplateVars,
};
use serde_json::json;

fn readings(energy: f64) -> MeterReadings {
    let mut reading = MeterReading::new();
    reading.insert("Energy", json!(energy));
    let mut r = MeterReadings::new();
    r.insert(MeterId::from("65489412"), reading);
    r
}

#[test]
fn test_dataset_serialization_roundtrip() {
    let mut ds = CachedDataset::new();
    ds.apply(
        ConnectorPayload::today_only("aalborg_forsyning", readings(1.5)),
        "Aalborg Forsyning",
        Utc::now(),
    );

    let json = serde_json::to_string(&ds).unwrap();
    let parsed: CachedDataset = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, ds);
    assert!(parsed.has_today());
}

#[test]
fn test_template_applies_to_reading() {
    let today = readings(100.0);
    let reading = today.get(&MeterId::from("65489412")).unwrap();
    let template = CostTemplate::validate("{{ value * 0.8 + 5 }}").unwrap();

    let cost = template
        .evaluate(TemplateVars::new(reading.number("Energy").unwrap(), 13))
        .unwrap();
    assert!((cost - 85.0).abs() < f64::EPSILON);
}
