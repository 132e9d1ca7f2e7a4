//! Aalborg Forsyning connector.
//!
//! API documentation:
//! <https://aalborgforsyning.dk/erhverv/energioptimering/datadeling-for-fjernaflaeste-varmemalere/api-for-adgang-til-malerdata>

mod api;
mod parser;

pub use api::{AalborgConnector, BASE_URL};

use std::time::Duration;

use crate::descriptor::{ConnectorDescriptor, Credentials, username_password_schema};

/// Connector id used in configuration files.
pub const CONNECTOR_ID: &str = "aalborg_forsyning";

/// Provider allows at most three polls per day.
pub const SCAN_INTERVAL: Duration = Duration::from_secs(9 * 60 * 60);

/// Descriptor for the Aalborg Forsyning connector.
pub fn aalborg_descriptor() -> ConnectorDescriptor {
    ConnectorDescriptor {
        id: CONNECTOR_ID,
        display_name: "Aalborg Forsyning",
        regions: &["Aalborg"],
        config_schema: username_password_schema,
        scan_interval: SCAN_INTERVAL,
        publish_time: None,
        allowed_domains: &["aalborgforsyning.dk"],
        build: build_aalborg,
    }
}

fn build_aalborg(credentials: &Credentials) -> Box<dyn forsyning_fetch::Connector> {
    Box::new(AalborgConnector::new(credentials.clone()))
}

// ============================================================================
// Tests
// ============================================================================
