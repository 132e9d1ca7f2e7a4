//! Sync error types.

use forsyning_fetch::HttpError;
use forsyning_store::ConfigError;
use thiserror::Error;

/// Errors raised while setting up an entry.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The entry configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client could not be created.
    #[error("HTTP client error: {0}")]
    Http(#[from] HttpError),

    /// No registered connector serves the selector.
    #[error("No connector available for '{0}'")]
    NoConnectors(String),
}
