//! Connector descriptor system.
//!
//! A descriptor contains all the static configuration for a connector:
//! - Metadata (id, display name, regions served)
//! - Configuration form fields
//! - Rate-limit contract (scan interval) and daily publish time
//! - A constructor for the connector itself

use chrono::NaiveTime;
use forsyning_core::ConfigField;
use forsyning_fetch::Connector;
use std::fmt;
use std::time::Duration;

// ============================================================================
// Credentials
// ============================================================================

/// Username/password pair handed to a connector constructor.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account username, usually an e-mail address.
    pub username: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Creates a credentials pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

// ============================================================================
// Connector Descriptor
// ============================================================================

/// Complete static description of a connector.
pub struct ConnectorDescriptor {
    /// Stable identifier, also used in configuration files.
    pub id: &'static str,
    /// Human-readable provider name.
    pub display_name: &'static str,
    /// Regions (municipalities) this connector serves.
    pub regions: &'static [&'static str],
    /// Returns the configuration form fields.
    pub config_schema: fn() -> Vec<ConfigField>,
    /// Minimum polling interval the provider allows.
    pub scan_interval: Duration,
    /// Local time of day after which next-day data is expected, if the
    /// provider publishes next-day data at all.
    pub publish_time: Option<NaiveTime>,
    /// Hosts the connector talks to.
    pub allowed_domains: &'static [&'static str],
    /// Builds a connector for the given account.
    pub build: fn(&Credentials) -> Box<dyn Connector>,
}

impl ConnectorDescriptor {
    /// Returns the configuration form fields.
    pub fn config_fields(&self) -> Vec<ConfigField> {
        (self.config_schema)()
    }

    /// Builds a connector instance.
    pub fn build_connector(&self, credentials: &Credentials) -> Box<dyn Connector> {
        (self.build)(credentials)
    }

    /// Returns true if `selector` names this connector by id or display name.
    pub fn is_named(&self, selector: &forsyning_core::ProviderSelector) -> bool {
        selector.matches(self.id) || selector.matches(self.display_name)
    }

    /// Returns true if `selector` names this connector or one of its regions.
    pub fn serves(&self, selector: &forsyning_core::ProviderSelector) -> bool {
        self.is_named(selector) || self.regions.iter().any(|r| selector.matches(r))
    }
}

impl fmt::Debug for ConnectorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorDescriptor")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("regions", &self.regions)
            .field("scan_interval", &self.scan_interval)
            .field("publish_time", &self.publish_time)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Standard username/password form used by token-based provider APIs.
pub fn username_password_schema() -> Vec<ConfigField> {
    vec![
        ConfigField::text("name", Some("Forsyning".to_string())),
        ConfigField::text("username", None),
        ConfigField::password("password"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("me@example.dk", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("me@example.dk"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_default_schema() {
        let fields = username_password_schema();
        let keys: Vec<_> = fields.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, ["name", "username", "password"]);
        assert!(fields[2].is_secret());
    }
}
