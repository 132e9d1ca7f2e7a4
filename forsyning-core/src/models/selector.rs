//! Provider selection types.
//!
//! - [`ProviderSelector`] - Immutable choice made when an entry is created
//! - [`ConfigField`] - Field description used to build setup forms

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Provider Selector
// ============================================================================

/// Identifies which connector(s) serve an entry.
///
/// The value is matched against a connector's id, its display name, or one of
/// the regions it serves. It is set once at configuration time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderSelector(String);

impl ProviderSelector {
    /// Creates a selector from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw selector value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the selector matches the given candidate.
    ///
    /// Matching ignores ASCII case and surrounding whitespace.
    pub fn matches(&self, candidate: &str) -> bool {
        self.0.trim().eq_ignore_ascii_case(candidate.trim())
    }
}

impl fmt::Display for ProviderSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderSelector {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// Configuration Schema
// ============================================================================

/// The kind of input a configuration field expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text.
    Text,
    /// Text that must be masked when displayed.
    Password,
}

/// One field of a connector's configuration form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigField {
    /// Option key (e.g. `username`).
    pub key: String,
    /// Input kind.
    pub kind: FieldKind,
    /// Whether the field must be filled in.
    pub required: bool,
    /// Value pre-filled in the form.
    pub default: Option<String>,
}

impl ConfigField {
    /// Creates a required text field.
    pub fn text(key: impl Into<String>, default: Option<String>) -> Self {
        Self {
            key: key.into(),
            kind: FieldKind::Text,
            required: true,
            default,
        }
    }

    /// Creates a required password field.
    ///
    /// Password defaults are never pre-filled.
    pub fn password(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: FieldKind::Password,
            required: true,
            default: None,
        }
    }

    /// Returns true if the field value must be masked.
    pub fn is_secret(&self) -> bool {
        self.kind == FieldKind::Password
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_matching() {
        let selector = ProviderSelector::new("Aalborg Forsyning");
        assert!(selector.matches("aalborg forsyning"));
        assert!(selector.matches(" Aalborg Forsyning "));
        assert!(!selector.matches("aalborg"));
    }

    #[test]
    fn test_selector_serializes_as_string() {
        let selector = ProviderSelector::new("aalborg_forsyning");
        let json = serde_json::to_string(&selector).unwrap();
        assert_eq!(json, "\"aalborg_forsyning\"");
    }

    #[test]
    fn test_password_field_is_secret() {
        let field = ConfigField::password("password");
        assert!(field.is_secret());
        assert!(field.default.is_none());
        assert!(!ConfigField::text("username", None).is_secret());
    }
}
