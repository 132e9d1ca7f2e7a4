//! Connector registry.
//!
//! The registry is an explicit list of descriptors built once on first
//! access. It is read-only afterwards.

use forsyning_core::ProviderSelector;
use forsyning_fetch::ConnectorPipeline;
use std::sync::OnceLock;
use tracing::debug;

use crate::aalborg::aalborg_descriptor;
use crate::descriptor::{ConnectorDescriptor, Credentials};

// ============================================================================
// Static Registry
// ============================================================================

static DESCRIPTORS: OnceLock<Vec<ConnectorDescriptor>> = OnceLock::new();

/// Registered connectors, in selection order.
fn init_descriptors() -> Vec<ConnectorDescriptor> {
    vec![aalborg_descriptor()]
}

// ============================================================================
// Connector Registry
// ============================================================================

/// Global registry of connector descriptors.
pub struct ConnectorRegistry;

impl ConnectorRegistry {
    /// Returns all descriptors in registration order.
    pub fn list_available() -> &'static [ConnectorDescriptor] {
        DESCRIPTORS.get_or_init(|| {
            let descriptors = init_descriptors();
            debug!(count = descriptors.len(), "Connector registry initialised");
            descriptors
        })
    }

    /// Looks up a descriptor by id or display name.
    pub fn resolve(identifier: &str) -> Option<&'static ConnectorDescriptor> {
        let selector = ProviderSelector::new(identifier);
        Self::list_available().iter().find(|d| d.is_named(&selector))
    }

    /// Returns every descriptor serving `selector`, in registration order.
    pub fn for_selector(selector: &ProviderSelector) -> Vec<&'static ConnectorDescriptor> {
        Self::list_available()
            .iter()
            .filter(|d| d.serves(selector))
            .collect()
    }

    /// Builds the connector pipeline for `selector`.
    ///
    /// The pipeline is empty when nothing serves the selector.
    pub fn pipeline(selector: &ProviderSelector, credentials: &Credentials) -> ConnectorPipeline {
        let connectors = Self::for_selector(selector)
            .into_iter()
            .map(|d| d.build_connector(credentials))
            .collect();
        ConnectorPipeline::new(selector.as_str(), connectors)
    }

    /// Union of the hosts the connectors for `selector` talk to.
    pub fn allowed_domains(selector: &ProviderSelector) -> Vec<String> {
        let mut domains: Vec<String> = Self::for_selector(selector)
            .into_iter()
            .flat_map(|d| d.allowed_domains.iter().map(|s| (*s).to_string()))
            .collect();
        domains.sort();
        domains.dedup();
        domains
    }

    /// Returns the number of registered connectors.
    pub fn count() -> usize {
        Self::list_available().len()
    }

    /// Returns all connector ids.
    pub fn ids() -> Vec<&'static str> {
        Self::list_available().iter().map(|d| d.id).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lists_aalborg() {
        assert_eq!(ConnectorRegistry::count(), 1);
        assert_eq!(ConnectorRegistry::ids(), vec!["aalborg_forsyning"]);
    }

    #[test]
    fn test_resolve_by_id_and_display_name() {
        let by_id = ConnectorRegistry::resolve("aalborg_forsyning").unwrap();
        let by_name = ConnectorRegistry::resolve("Aalborg Forsyning").unwrap();
        assert_eq!(by_id.id, by_name.id);
        assert!(ConnectorRegistry::resolve("nowhere").is_none());
    }

    #[test]
    fn test_region_selects_connector() {
        let selector = ProviderSelector::new("Aalborg");
        let found = ConnectorRegistry::for_selector(&selector);
        assert_eq!(found.len(), 1);
        // Regions select but do not resolve.
        assert!(ConnectorRegistry::resolve("Aalborg").is_none());
    }

    #[test]
    fn test_pipeline_for_unknown_selector_is_empty() {
        let creds = Credentials::new("a", "b");
        let pipeline = ConnectorRegistry::pipeline(&ProviderSelector::new("Odense"), &creds);
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.selector(), "Odense");
    }

    #[test]
    fn test_allowed_domains() {
        let domains = ConnectorRegistry::allowed_domains(&ProviderSelector::new("aalborg_forsyning"));
        assert_eq!(domains, vec!["aalborgforsyning.dk".to_string()]);
    }
}
