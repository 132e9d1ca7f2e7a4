//! Fetch error types.

use thiserror::Error;

// ============================================================================
// Main Fetch Error
// ============================================================================

/// Error type for connector operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The provider rejected the credentials or returned no token.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Authentication worked but the account has no meters.
    #[error("No meters registered for this account")]
    NoMeters,

    /// Meters were found but none returned data.
    #[error("No meter returned data")]
    EmptyPayload,

    /// Connection dropped, refused or timed out.
    #[error("Server error: {0}")]
    TransientServer(String),

    /// Non-success HTTP status.
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// Status code.
        status: u16,
        /// Request URL.
        url: String,
    },

    /// Response body did not have the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Domain not allowed by the HTTP client.
    #[error("Domain not allowed: {0}")]
    DomainNotAllowed(String),

    /// No connector serves the selected provider.
    #[error("No connector available for '{0}'")]
    NoConnectors(String),
}

impl FetchError {
    /// Short, stable label used in logs.
    pub fn classification(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed(_) => "authentication_failure",
            Self::NoMeters => "no_meters",
            Self::EmptyPayload => "empty_payload",
            Self::TransientServer(_) => "transient_server_error",
            Self::HttpStatus { .. } => "http_status",
            Self::InvalidResponse(_) | Self::Json(_) => "invalid_response",
            Self::DomainNotAllowed(_) => "domain_not_allowed",
            Self::NoConnectors(_) => "no_connectors",
        }
    }

    /// Returns true for transport-level failures.
    ///
    /// A transient error aborts the current update instead of falling through
    /// to the next meter or connector.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::TransientServer(_) => true,
            Self::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<HttpError> for FetchError {
    fn from(err: HttpError) -> Self {
        match err {
            // Anything but a decode failure means the exchange itself broke.
            HttpError::Request(e) if e.is_decode() => FetchError::InvalidResponse(e.to_string()),
            HttpError::Request(e) => FetchError::TransientServer(e.to_string()),
            HttpError::DomainNotAllowed(host) => FetchError::DomainNotAllowed(host),
            HttpError::InvalidUrl(url) => FetchError::InvalidResponse(format!("Invalid URL: {url}")),
        }
    }
}

// ============================================================================
// HTTP Error
// ============================================================================

/// HTTP-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Request error.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Domain not allowed.
    #[error("Domain not allowed: {0}")]
    DomainNotAllowed(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

// ============================================================================
// Tests
// ============================================================================
