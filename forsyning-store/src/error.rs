//! Store error types.

use forsyning_core::TemplateError;
use thiserror::Error;

/// Errors that can occur in the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entry not found.
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// An entry with the same id already exists.
    #[error("Entry already exists: {0}")]
    DuplicateEntry(String),

    /// Configuration rejected by validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Validation errors for an entry configuration.
///
/// Each variant carries a stable [`error_key`](ConfigError::error_key) that
/// front ends use to pick a localized message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The cost template failed to evaluate to a number.
    #[error("Invalid cost template: {0}")]
    InvalidTemplate(#[from] TemplateError),

    /// No connector matches the selector.
    #[error("Unknown connector: {0}")]
    UnknownConnector(String),

    /// A required field is empty.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// The time zone is not a known IANA name.
    #[error("Invalid time zone: {0}")]
    InvalidTimeZone(String),

    /// The daily fetch hour is outside 0-23.
    #[error("Invalid fetch hour: {0}")]
    InvalidHour(u32),

    /// Retry settings are zero or the ceiling is below the base.
    #[error("Invalid retry settings: base {base} min, ceiling {ceiling} min")]
    InvalidRetry {
        /// Base delay in minutes.
        base: u64,
        /// Ceiling in minutes.
        ceiling: u64,
    },
}

impl ConfigError {
    /// Stable key identifying the error kind.
    pub fn error_key(&self) -> &'static str {
        match self {
            Self::InvalidTemplate(_) => "invalid_template",
            Self::UnknownConnector(_) => "unknown_connector",
            Self::MissingField(_) => "missing_field",
            Self::InvalidTimeZone(_) => "invalid_time_zone",
            Self::InvalidHour(_) => "invalid_hour",
            Self::InvalidRetry { .. } => "invalid_retry",
        }
    }
}
