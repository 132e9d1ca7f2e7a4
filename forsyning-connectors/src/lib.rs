// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Forsyning Connectors
//!
//! Provider-specific connectors and the registry that selects them.
//!
//! Each connector module includes:
//!
//! - **Descriptor**: Static configuration (names, regions, scan interval, form fields)
//! - **API**: The [`forsyning_fetch::Connector`] implementation
//! - **Parser**: Response parsing
//!
//! ## Supported Providers
//!
//! | Provider | Region | Scan interval | Next-day data |
//! |----------|--------|---------------|---------------|
//! | Aalborg Forsyning | Aalborg | 9 h | No |
//!
//! ## Usage
//!
//! ```ignore
//! use forsyning_connectors::{ConnectorRegistry, Credentials};
//! use forsyning_core::ProviderSelector;
//!
//! let selector = ProviderSelector::new("Aalborg Forsyning");
//! let pipeline = ConnectorRegistry::pipeline(&selector, &Credentials::new(user, pass));
//! let outcome = pipeline.execute(&ctx).await;
//! ```

pub mod descriptor;
pub mod registry;

pub mod aalborg;

pub use descriptor::{ConnectorDescriptor, Credentials};
pub use registry::ConnectorRegistry;
