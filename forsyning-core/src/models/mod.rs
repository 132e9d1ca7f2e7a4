//! Domain models for Forsyning.
//!
//! ## Submodules
//!
//! - [`selector`] - Provider selection and configuration schema types
//! - [`meter`] - Meter identifiers, readings and connector payloads
//! - [`dataset`] - The today/tomorrow cache with midnight rollover

mod dataset;
mod meter;
mod selector;

pub use dataset::CachedDataset;
pub use meter::{ConnectorPayload, MeterId, MeterReading, MeterReadings};
pub use selector::{ConfigField, FieldKind, ProviderSelector};
