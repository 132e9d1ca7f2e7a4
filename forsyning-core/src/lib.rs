// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Forsyning Core
//!
//! Core types and models shared by all Forsyning crates.
//!
//! ## Key Types
//!
//! ### Selection
//! - [`ProviderSelector`] - Which connector(s) an entry uses
//! - [`ConfigField`] - One field of a connector's configuration form
//!
//! ### Meter Data
//! - [`MeterId`] - Provider-assigned meter identifier
//! - [`MeterReading`] - Raw reading object for one meter
//! - [`MeterReadings`] - Readings keyed by meter
//! - [`ConnectorPayload`] - Result of one connector update
//! - [`CachedDataset`] - Today/tomorrow cache owned by a coordinator
//!
//! ### Cost Adjustment
//! - [`CostTemplate`] - User-supplied arithmetic applied to readings

pub mod error;
pub mod models;
pub mod template;

pub use error::TemplateError;

pub use models::{
    // Selection
    ConfigField,
    FieldKind,
    ProviderSelector,
    // Meter data
    CachedDataset,
    ConnectorPayload,
    MeterId,
    MeterReading,
    MeterReadings,
};

pub use template::{CostTemplate, MAX_DEPTH, MAX_TEMPLATE_LEN, TemplateVars};
