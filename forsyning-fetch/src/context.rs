//! Fetch context providing access to host APIs.
//!
//! The fetch context is passed to every connector call. It carries the shared
//! HTTP client and the installation's time zone.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::error::HttpError;
use crate::host::http::{DEFAULT_TIMEOUT_SECS, HttpClient};

/// Time zone used when none is configured.
pub const DEFAULT_TIME_ZONE: Tz = chrono_tz::Europe::Copenhagen;

// ============================================================================
// Fetch Settings
// ============================================================================

/// Settings for fetch operations.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Timeout for each HTTP request.
    pub timeout: Duration,
    /// Local time zone of the installation.
    pub time_zone: Tz,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            time_zone: DEFAULT_TIME_ZONE,
        }
    }
}

// ============================================================================
// Fetch Context
// ============================================================================

/// Context provided to connectors.
pub struct FetchContext {
    /// Shared HTTP client.
    pub http: Arc<HttpClient>,
    /// Fetch settings.
    pub settings: FetchSettings,
}

impl FetchContext {
    /// Creates a context with default settings and a fresh HTTP client.
    pub fn new() -> Result<Self, HttpError> {
        Self::builder().build()
    }

    /// Creates a builder for customizing the context.
    pub fn builder() -> FetchContextBuilder {
        FetchContextBuilder::new()
    }

    /// Returns the configured time zone.
    pub fn time_zone(&self) -> Tz {
        self.settings.time_zone
    }

    /// Converts an instant to local time.
    pub fn local(&self, at: DateTime<Utc>) -> DateTime<Tz> {
        at.with_timezone(&self.settings.time_zone)
    }
}

impl std::fmt::Debug for FetchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchContext")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Fetch Context Builder
// ============================================================================

/// Builder for constructing a `FetchContext`.
#[derive(Debug, Default)]
pub struct FetchContextBuilder {
    http: Option<Arc<HttpClient>>,
    settings: FetchSettings,
}

impl FetchContextBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an existing (shared) HTTP client.
    pub fn http(mut self, http: Arc<HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    /// Sets the request timeout used when the builder creates the client.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = timeout;
        self
    }

    /// Sets the time zone.
    pub fn time_zone(mut self, tz: Tz) -> Self {
        self.settings.time_zone = tz;
        self
    }

    /// Builds the fetch context.
    pub fn build(self) -> Result<FetchContext, HttpError> {
        let http = match self.http {
            Some(http) => http,
            None => Arc::new(HttpClient::with_timeout(self.settings.timeout)?),
        };

        Ok(FetchContext {
            http,
            settings: self.settings,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
